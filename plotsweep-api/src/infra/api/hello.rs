// This file is part of plotsweep.
// SPDX-License-Identifier: Apache-2.0
//
// C7 `POST /hello` (spec.md §4.7, §6; SPEC_FULL.md §4.11). Grounded on
// `original_source/paissadb/main.py`'s `hello` handler and `auth.py`'s
// `create_session_token`.
//
// spec.md §6's HTTP table lists `/hello`'s auth as "none", but SPEC_FULL.md §4.11 notes
// the original handler checks `sweeper.cid == data.cid` before trusting a caller — which
// presupposes a bearer token to check against. Resolved (see DESIGN.md): the bearer is
// optional here. A bootstrapping sweeper with no prior token omits `Authorization`
// entirely; a sweeper renewing its token presents one, and it must name the same `cid`
// it is renewing for.

use super::{AppState, ApiError, auth};
use axum::{Json, extract::State, http::HeaderMap};
use plotsweep_common::domain::{PubSub, Queue, Storage, Sweeper, Timestamp};
use plotsweep_common::infra::jwt;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Deserialize)]
pub struct HelloRequest {
    pub cid: String,
    pub name: String,
    /// Display name of the world the client is currently on; accepted for wire
    /// compatibility (spec.md §6) but not persisted — `Sweeper` tracks `world_id` only.
    #[serde(default)]
    #[allow(dead_code)]
    pub world: Option<String>,
    #[serde(rename = "worldId")]
    pub world_id: i32,
}

#[derive(Debug, Serialize)]
pub struct HelloResponse {
    pub message: &'static str,
    pub server_time: Timestamp,
    pub session_token: String,
}

pub async fn hello<S, Q, P>(
    State(state): State<AppState<S, Q, P>>,
    headers: HeaderMap,
    Json(body): Json<HelloRequest>,
) -> Result<Json<HelloResponse>, ApiError>
where
    S: Storage,
    Q: Queue,
    P: PubSub,
{
    if let Some(token) = auth::bearer_token(&headers) {
        let claims = jwt::verify(&state.jwt_config, token).map_err(|_| ApiError::AuthFailure)?;
        if claims.cid != body.cid {
            return Err(ApiError::InputValidation("session token does not match cid".into()));
        }
    }

    let sweeper_id: i64 = body
        .cid
        .parse()
        .map_err(|_| ApiError::InputValidation("cid must be an integer".into()))?;

    let now_secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;

    let sweeper = Sweeper { sweeper_id, name: body.name, world_id: body.world_id, last_seen: now_secs };

    let mut tx = state.storage.create_tx().await.map_err(ApiError::store_failure)?;
    state
        .storage
        .upsert_sweeper(&sweeper, &mut tx)
        .await
        .map_err(ApiError::store_failure)?;
    tx.commit().await.map_err(ApiError::store_failure)?;

    let session_token =
        jwt::issue(&state.jwt_config, &body.cid, now_secs).map_err(ApiError::store_failure)?;

    Ok(Json(HelloResponse {
        message: "OK",
        server_time: now_secs as Timestamp,
        session_token,
    }))
}
