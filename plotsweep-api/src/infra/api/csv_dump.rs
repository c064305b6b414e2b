// This file is part of plotsweep.
// SPDX-License-Identifier: Apache-2.0
//
// `GET /csv/dump` (SPEC_FULL.md §4.13). Grounded on the original's `csv_dump_lock`
// mutex key (spec.md §6 Queue keys) and implemented with the `csv` crate's `Writer`,
// not reimplementing any statistics logic.

use super::{AppState, ApiError};
use axum::{extract::State, http::header, response::IntoResponse};
use plotsweep_common::domain::{LottoPhase, PubSub, Queue, Storage};
use std::time::Duration;

fn lotto_phase_label(phase: LottoPhase) -> &'static str {
    match phase {
        LottoPhase::Available => "available",
        LottoPhase::Results => "results",
        LottoPhase::Unavailable => "unavailable",
    }
}

const CSV_DUMP_LOCK_KEY: &str = "csv_dump_lock";

#[derive(serde::Serialize)]
struct PlotStateRow {
    world_id: i32,
    district_id: i32,
    ward_number: i32,
    plot_number: i32,
    first_seen: f64,
    last_seen: f64,
    is_owned: bool,
    owner_name: String,
    last_seen_price: String,
    purchase_system: i32,
    lotto_entries: String,
    lotto_phase: String,
    lotto_phase_until: String,
}

pub async fn dump<S, Q, P>(State(state): State<AppState<S, Q, P>>) -> Result<impl IntoResponse, ApiError>
where
    S: Storage,
    Q: Queue,
    P: PubSub,
{
    let ttl = Duration::from_secs(state.application_config.csv_dump_lock_ttl_secs);
    let locked = state
        .queue
        .try_lock(CSV_DUMP_LOCK_KEY, ttl)
        .await
        .map_err(ApiError::store_failure)?;
    if !locked {
        return Err(ApiError::InputValidation("a dump is already in progress".into()));
    }

    let states = state.storage.all_plot_states().await.map_err(ApiError::store_failure)?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    for state in states {
        writer
            .serialize(PlotStateRow {
                world_id: state.world_id,
                district_id: state.district_id,
                ward_number: state.ward_number,
                plot_number: state.plot_number,
                first_seen: state.first_seen,
                last_seen: state.last_seen,
                is_owned: state.is_owned,
                owner_name: state.owner_name.unwrap_or_default(),
                last_seen_price: state.last_seen_price.map(|p| p.to_string()).unwrap_or_default(),
                purchase_system: state.purchase_system.0,
                lotto_entries: state.lotto_entries.map(|n| n.to_string()).unwrap_or_default(),
                lotto_phase: state
                    .lotto_phase
                    .map(lotto_phase_label)
                    .unwrap_or_default()
                    .to_string(),
                lotto_phase_until: state
                    .lotto_phase_until
                    .map(|t| t.to_string())
                    .unwrap_or_default(),
            })
            .map_err(|error| ApiError::store_failure(anyhow::anyhow!(error)))?;
    }

    let body = writer
        .into_inner()
        .map_err(|error| ApiError::store_failure(anyhow::anyhow!(error)))?;

    Ok(([(header::CONTENT_TYPE, "text/csv")], body))
}
