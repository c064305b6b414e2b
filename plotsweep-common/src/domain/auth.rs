// This file is part of plotsweep.
// SPDX-License-Identifier: Apache-2.0
//
// Session token claim shape (spec.md §4.11, SPEC_FULL.md §4.11). Grounded on
// `original_source/common/auth.py`'s `create_session_token`/`decode_token`: the claim set
// is `{cid, aud, iss, iat}` with no `exp` — tokens are valid indefinitely once issued, and
// `/hello` additionally checks `claims.cid == body.cid` before trusting a bearer token for
// a given sweeper.

use serde::{Deserialize, Serialize};

/// The session token's claim set. Deliberately has no `exp`: the original never set one,
/// and nothing in spec.md reintroduces expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub cid: String,
    pub aud: Vec<String>,
    pub iss: String,
    pub iat: i64,
}

impl SessionClaims {
    pub fn new(cid: impl Into<String>, audiences: Vec<String>, issuer: impl Into<String>, iat: i64) -> Self {
        Self {
            cid: cid.into(),
            aud: audiences,
            iss: issuer.into(),
            iat,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let claims = SessionClaims::new("cid-123", vec!["plotsweep".into()], "plotsweep-api", 1_700_000_000);
        let json = serde_json::to_string(&claims).unwrap();
        let back: SessionClaims = serde_json::from_str(&json).unwrap();
        assert_eq!(claims, back);
        assert!(!json.contains("\"exp\""));
    }
}
