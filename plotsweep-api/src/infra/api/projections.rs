// This file is part of plotsweep.
// SPDX-License-Identifier: Apache-2.0
//
// C6 read projections (spec.md §4.6; SPEC_FULL.md §4.12). Grounded on
// `original_source/paissadb/crud.py`'s latest-per-plot query and `calc.py`'s
// `open_plot_detail` walk, ported to `estimate::open_plot_detail_from_history`.

use super::{AppState, ApiError};
use axum::{Json, extract::{Path, State}};
use plotsweep_common::domain::{
    District, PubSub, Queue, Storage, Timestamp, World, estimate,
};
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

fn wall_clock_now() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

pub async fn list_worlds<S, Q, P>(State(state): State<AppState<S, Q, P>>) -> Result<Json<Vec<World>>, ApiError>
where
    S: Storage,
    Q: Queue,
    P: PubSub,
{
    let worlds = state.storage.list_worlds().await.map_err(ApiError::store_failure)?;
    Ok(Json(worlds))
}

#[derive(Debug, Serialize)]
pub struct DistrictRollup {
    pub district_id: i32,
    pub name: String,
    pub land_set_id: i32,
    pub num_open_plots: usize,
    pub oldest_open_last_seen: Option<Timestamp>,
}

#[derive(Debug, Serialize)]
pub struct WorldDetail {
    pub world: World,
    pub districts: Vec<DistrictRollup>,
}

/// `GET /worlds/{wid}`: per-district rollup over the latest state of every plot
/// (spec.md §4.6: "for each of the 60 × 5 = 300 plots per district, select the row
/// with the largest `last_seen`, then count non-owned and report `oldest`").
pub async fn get_world<S, Q, P>(
    State(state): State<AppState<S, Q, P>>,
    Path(world_id): Path<i32>,
) -> Result<Json<WorldDetail>, ApiError>
where
    S: Storage,
    Q: Queue,
    P: PubSub,
{
    let world = state
        .storage
        .get_world(world_id)
        .await
        .map_err(ApiError::store_failure)?
        .ok_or(ApiError::NotFound)?;

    let districts = state.storage.list_districts().await.map_err(ApiError::store_failure)?;

    let mut rollups = Vec::with_capacity(districts.len());
    for district in districts {
        rollups.push(district_rollup(&state, world_id, district).await?);
    }

    Ok(Json(WorldDetail { world, districts: rollups }))
}

async fn district_rollup<S, Q, P>(
    state: &AppState<S, Q, P>,
    world_id: i32,
    district: District,
) -> Result<DistrictRollup, ApiError>
where
    S: Storage,
{
    let states = state
        .storage
        .latest_plot_states(world_id, district.district_id)
        .await
        .map_err(ApiError::store_failure)?;

    let mut num_open_plots = 0usize;
    let mut oldest_open_last_seen: Option<Timestamp> = None;
    for plot_state in states.iter().filter(|s| !s.is_owned) {
        num_open_plots += 1;
        oldest_open_last_seen = Some(match oldest_open_last_seen {
            Some(oldest) => oldest.min(plot_state.last_seen),
            None => plot_state.last_seen,
        });
    }

    Ok(DistrictRollup {
        district_id: district.district_id,
        name: district.name,
        land_set_id: district.land_set_id,
        num_open_plots,
        oldest_open_last_seen,
    })
}

#[derive(Debug, Serialize)]
pub struct DistrictDetail {
    pub district_id: i32,
    pub name: String,
    pub land_set_id: i32,
    pub open_plots: Vec<estimate::OpenPlotDetail>,
}

/// `GET /worlds/{wid}/{did}`: same rollup, plus the full list of open plots with
/// deval-aware time bounds (SPEC_FULL.md §4.12).
pub async fn get_district<S, Q, P>(
    State(state): State<AppState<S, Q, P>>,
    Path((world_id, district_id)): Path<(i32, i32)>,
) -> Result<Json<DistrictDetail>, ApiError>
where
    S: Storage,
    Q: Queue,
    P: PubSub,
{
    let district = state
        .storage
        .get_district(district_id)
        .await
        .map_err(ApiError::store_failure)?
        .ok_or(ApiError::NotFound)?;

    let states = state
        .storage
        .latest_plot_states(world_id, district_id)
        .await
        .map_err(ApiError::store_failure)?;

    let now = wall_clock_now();
    let mut open_plots = Vec::new();

    for plot_state in states.into_iter().filter(|s| !s.is_owned) {
        let house_size = state
            .storage
            .get_plot_info(district_id, plot_state.plot_number)
            .await
            .map_err(ApiError::store_failure)?
            .map(|info| info.house_size)
            .unwrap_or(0);

        let history = state
            .storage
            .plot_history(plot_state.location())
            .await
            .map_err(ApiError::store_failure)?;

        open_plots.push(estimate::open_plot_detail_from_history(&plot_state, &history, house_size, now));
    }

    Ok(Json(DistrictDetail {
        district_id: district.district_id,
        name: district.name,
        land_set_id: district.land_set_id,
        open_plots,
    }))
}
