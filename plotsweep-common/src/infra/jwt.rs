// This file is part of plotsweep.
// SPDX-License-Identifier: Apache-2.0
//
// HS256 session token sign/verify (spec.md §4.7, SPEC_FULL.md §4.11). Claim shape and
// verification rules (`aud`/`iss`/signature only, no `exp`) ported from
// `original_source/paissadb/auth.py`'s `create_session_token`/`decode_token`. Enrichment
// crate `jsonwebtoken` (grounded on
// `other_examples/manifests/Saleh-E-jirsi-platform/Cargo.toml`).

use crate::domain::auth::SessionClaims;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub secret: SecretString,
    pub issuer: String,
    pub audience: Vec<String>,
}

/// Signs a new session token for `cid` (spec.md §4.7: "`POST /hello` ... issues a
/// signed token carrying `{cid, aud, iss, iat}`").
pub fn issue(config: &Config, cid: &str, iat: i64) -> Result<String, Error> {
    let claims = SessionClaims::new(cid, config.audience.clone(), config.issuer.clone(), iat);
    let key = EncodingKey::from_secret(config.secret.expose_secret().as_bytes());
    encode(&Header::new(Algorithm::HS256), &claims, &key).map_err(Error::Encode)
}

/// Verifies signature, issuer, and audience. No expiry is checked — `auth.py`'s
/// `decode_token` never set one (SPEC_FULL.md §4.11).
pub fn verify(config: &Config, token: &str) -> Result<SessionClaims, Error> {
    let key = DecodingKey::from_secret(config.secret.expose_secret().as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&config.audience);
    validation.set_issuer(&[config.issuer.clone()]);
    validation.required_spec_claims.remove("exp");
    validation.validate_exp = false;

    decode::<SessionClaims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(Error::Decode)
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot sign session token")]
    Encode(#[source] jsonwebtoken::errors::Error),

    #[error("invalid session token")]
    Decode(#[source] jsonwebtoken::errors::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            secret: "test-secret".into(),
            issuer: "PaissaDB".into(),
            audience: vec!["PaissaHouse".into()],
        }
    }

    #[test]
    fn round_trips_and_verifies() {
        let config = config();
        let token = issue(&config, "cid-123", 1_700_000_000).unwrap();
        let claims = verify(&config, &token).unwrap();
        assert_eq!(claims.cid, "cid-123");
    }

    #[test]
    fn rejects_wrong_secret() {
        let config = config();
        let token = issue(&config, "cid-123", 1_700_000_000).unwrap();

        let mut wrong = config;
        wrong.secret = "different-secret".into();
        assert!(verify(&wrong, &token).is_err());
    }

    #[test]
    fn rejects_wrong_audience() {
        let config = config();
        let token = issue(&config, "cid-123", 1_700_000_000).unwrap();

        let mut wrong = config;
        wrong.audience = vec!["SomeoneElse".into()];
        assert!(verify(&wrong, &token).is_err());
    }
}
