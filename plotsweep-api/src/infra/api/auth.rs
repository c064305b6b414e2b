// This file is part of plotsweep.
// SPDX-License-Identifier: Apache-2.0
//
// Shared bearer-token handling for `/ingest`, `/hello` and `/ws` (spec.md §4.1, §4.7,
// §4.11; SPEC_FULL.md §4.11). Grounded on `original_source/paissadb/auth.py`'s
// `maybe()`/`required()` split: `bearer_token` extracts the raw token, `require_bearer`
// is the `required()` half, callers needing the `maybe()` half just match on
// `bearer_token` directly (`hello.rs`, `ws.rs`).

use super::ApiError;
use axum::http::HeaderMap;
use plotsweep_common::{domain::auth::SessionClaims, infra::jwt};

/// Extracts the raw token from `Authorization: Bearer <token>`, if present.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// `/ingest`'s auth requirement (spec.md §6: "bearer"): missing or invalid token is
/// always a failure.
pub fn require_bearer(jwt_config: &jwt::Config, headers: &HeaderMap) -> Result<SessionClaims, ApiError> {
    let token = bearer_token(headers).ok_or(ApiError::AuthFailure)?;
    jwt::verify(jwt_config, token).map_err(|_| ApiError::AuthFailure)
}
