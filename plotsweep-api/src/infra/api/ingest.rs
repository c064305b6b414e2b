// This file is part of plotsweep.
// SPDX-License-Identifier: Apache-2.0
//
// C2 ingest admitter (spec.md §4.1). Grounded on `original_source/paissadb/crud.py`'s
// `ingest_wardinfo` for the "normalize, then admit" shape and
// `original_source/worker/main.py`'s `PlotStateEntry` wire contract — the worker (C3)
// consumes exactly one `PlotStateEntry` per dequeued key, so normalization into
// per-plot entries happens here, not in the worker.

use super::{AppState, ApiError, auth};
use axum::{Json, extract::State, http::{HeaderMap, StatusCode}};
use fastrace::trace;
use log::warn;
use plotsweep_common::domain::{
    Event, Observation, ObservationKind, PubSub, Queue, Storage, Timestamp, dedup_key,
    entries_from_ward_info, entry_from_lottery_info,
};
use serde::Serialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// spec.md §4.1 step 3: `SET <dedup_key> <payload> NX EX 3600`.
const DEDUP_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub message: &'static str,
    pub accepted: usize,
}

fn wall_clock_now() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[trace]
pub async fn ingest<S, Q, P>(
    State(state): State<AppState<S, Q, P>>,
    headers: HeaderMap,
    Json(observations): Json<Vec<Observation>>,
) -> Result<(StatusCode, Json<IngestResponse>), ApiError>
where
    S: Storage,
    Q: Queue,
    P: PubSub,
{
    let claims = auth::require_bearer(&state.jwt_config, &headers)?;
    let sweeper_id: Option<i64> = claims.cid.parse().ok();

    let now = wall_clock_now();
    let max_skew = state.application_config.max_future_skew_secs as Timestamp;

    let mut tx = state.storage.create_tx().await.map_err(ApiError::store_failure)?;
    let mut accepted = 0usize;

    for observation in &observations {
        // spec.md §4.1 step 1: reject observations more than 10s in the future.
        let client_timestamp = match observation {
            Observation::HousingWardInfo(info) => info.client_timestamp,
            Observation::LotteryInfo(info) => info.client_timestamp,
        };
        if client_timestamp > now + max_skew {
            continue;
        }

        // spec.md §4.1 step 2: drop HOUSING_WARD_INFO with world_id == 0 (known glitch).
        if let Observation::HousingWardInfo(info) = observation {
            if info.land_ident.world_id == 0 {
                continue;
            }
        }

        let (entries, kind, event_type) = match observation {
            Observation::HousingWardInfo(info) => {
                (entries_from_ward_info(info), ObservationKind::WardInfo, "HOUSING_WARD_INFO")
            }
            Observation::LotteryInfo(info) => {
                (vec![entry_from_lottery_info(info)], ObservationKind::LotteryInfo, "LOTTERY_INFO")
            }
        };

        // spec.md §9: the audit row is written for every admitted (post-validation)
        // observation, independent of whether its entries are later deduped.
        // spec.md §3: embedded NULs are stripped before storage, since the column
        // holding `data` can't carry them.
        let data = serde_json::to_string(observation)
            .map_err(|error| ApiError::InputValidation(error.to_string()))?
            .replace('\0', "");
        let event = Event {
            sweeper_id,
            timestamp: client_timestamp,
            event_type: event_type.to_string(),
            data,
        };
        state
            .storage
            .insert_event(&event, &mut tx)
            .await
            .map_err(ApiError::store_failure)?;

        for entry in &entries {
            let key = dedup_key(entry, kind);
            let payload = match serde_json::to_vec(entry) {
                Ok(payload) => payload,
                Err(error) => {
                    warn!(error:%; "failed to serialize plot state entry, dropping");
                    continue;
                }
            };

            match state.queue.admit(&key, &payload, entry.timestamp, DEDUP_TTL).await {
                Ok(true) => accepted += 1,
                Ok(false) => {}
                Err(error) => return Err(ApiError::store_failure(error)),
            }
        }
    }

    tx.commit().await.map_err(ApiError::store_failure)?;

    Ok((StatusCode::ACCEPTED, Json(IngestResponse { message: "OK", accepted })))
}
