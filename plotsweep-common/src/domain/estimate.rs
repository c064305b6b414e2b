// This file is part of plotsweep.
// SPDX-License-Identifier: Apache-2.0
//
// Time-bound estimator (spec.md §4.4). Pure functions, no I/O.
//
// Two tiers, both grounded on `original_source/paissadb/calc.py`:
// - `transition_*`: the simple pair-based bounds spec.md §4.4 describes verbatim, used by
//   the worker (C3) when emitting a transition broadcast for a freshly appended state.
// - `*_from_history`/`num_missed_devals`/`earliest_possible_open_time`: the fuller,
//   devaluation-aware walk `calc.open_plot_detail` performs over a plot's entire history,
//   used by the read-projection endpoints (C6, SPEC_FULL.md §4.12).

use crate::domain::{LottoPhase, PlotState, PlotStateEntry, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenPlotDetail {
    pub world_id: i32,
    pub district_id: i32,
    pub ward_number: i32,
    pub plot_number: i32,
    pub size: i32,
    pub known_price: Option<i64>,
    pub last_updated_time: Timestamp,
    pub est_time_open_min: Timestamp,
    pub est_time_open_max: Timestamp,
    pub est_num_devals: i32,
    pub lotto_entries: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoldPlotDetail {
    pub world_id: i32,
    pub district_id: i32,
    pub ward_number: i32,
    pub plot_number: i32,
    pub size: i32,
    pub last_updated_time: Timestamp,
    pub est_time_sold_min: Timestamp,
    pub est_time_sold_max: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotUpdateDetail {
    pub world_id: i32,
    pub district_id: i32,
    pub ward_number: i32,
    pub plot_number: i32,
    pub lotto_entries: Option<i32>,
    pub lotto_phase: Option<LottoPhase>,
    pub lotto_phase_until: Option<i64>,
    pub previous_lotto_phase: Option<LottoPhase>,
}

/// spec.md §4.4 `open_plot_detail(latest_open_state, first_open_state, last_sold_state)`.
pub fn transition_open_detail(
    latest_open_state: &PlotState,
    first_open_state: &PlotState,
    last_sold_state: Option<&PlotState>,
    house_size: i32,
) -> OpenPlotDetail {
    let est_time_open_max = first_open_state.first_seen;
    let est_time_open_min = last_sold_state.map(|s| s.last_seen).unwrap_or(0.0);

    let lotto_entries = match latest_open_state.lotto_phase {
        Some(LottoPhase::Unavailable) => Some(0),
        _ => latest_open_state.lotto_entries,
    };

    OpenPlotDetail {
        world_id: latest_open_state.world_id,
        district_id: latest_open_state.district_id,
        ward_number: latest_open_state.ward_number,
        plot_number: latest_open_state.plot_number,
        size: house_size,
        known_price: latest_open_state.last_seen_price,
        last_updated_time: latest_open_state.last_seen,
        est_time_open_min,
        est_time_open_max,
        est_num_devals: 0,
        lotto_entries,
    }
}

/// spec.md §4.4 `sold_plot_detail(first_sold_state, last_open_state)`.
pub fn transition_sold_detail(
    first_sold_state: &PlotState,
    last_open_state: &PlotState,
    house_size: i32,
) -> SoldPlotDetail {
    SoldPlotDetail {
        world_id: first_sold_state.world_id,
        district_id: first_sold_state.district_id,
        ward_number: first_sold_state.ward_number,
        plot_number: first_sold_state.plot_number,
        size: house_size,
        last_updated_time: first_sold_state.last_seen,
        est_time_sold_min: last_open_state.last_seen,
        est_time_sold_max: first_sold_state.first_seen,
    }
}

/// spec.md §4.4 `plot_update(new_observation, previous_state)`.
pub fn plot_update_detail(
    new_observation: &PlotStateEntry,
    previous_state: &PlotState,
) -> PlotUpdateDetail {
    PlotUpdateDetail {
        world_id: new_observation.world_id,
        district_id: new_observation.district_id,
        ward_number: new_observation.ward_num,
        plot_number: new_observation.plot_num,
        lotto_entries: new_observation.lotto_entries,
        lotto_phase: new_observation.lotto_phase,
        lotto_phase_until: new_observation.lotto_phase_until,
        previous_lotto_phase: previous_state.lotto_phase,
    }
}

// ---- devaluation-aware history walk, used by C6 read projections ----

const SECONDS_PER_DAY: i64 = 86_400;
const SECONDS_PER_HOUR: i64 = 3_600;
const HOURS_PER_DEVAL: i64 = 6;
const SECONDS_PER_DEVAL: i64 = HOURS_PER_DEVAL * SECONDS_PER_HOUR;
/// 02:00 JST expressed as seconds-past-UTC-midnight (JST = UTC+9).
const DEVAL_SECONDS_OF_DAY: i64 = 17 * SECONDS_PER_HOUR;

fn day_start(ts: i64) -> i64 {
    ts.div_euclid(SECONDS_PER_DAY) * SECONDS_PER_DAY
}

fn seconds_of_day(ts: i64) -> i64 {
    ts.rem_euclid(SECONDS_PER_DAY)
}

/// The most recent devalue instant at or before `ts`.
fn most_recent_devalue_at_or_before(ts: i64) -> i64 {
    let candidate = day_start(ts) + DEVAL_SECONDS_OF_DAY;
    if ts >= candidate {
        candidate
    } else {
        candidate - SECONDS_PER_DAY
    }
}

/// Given the number of devals at `known_at`, the earliest instant the plot could have
/// opened (`calc.py`'s `earliest_possible_open_time`).
pub fn earliest_possible_open_time(num_devals: i32, known_at: Timestamp) -> Timestamp {
    let known_at = known_at as i64;
    let t0 = known_at - num_devals as i64 * SECONDS_PER_DEVAL;
    most_recent_devalue_at_or_before(t0) as Timestamp
}

/// The next devalue instant strictly after `known_at`, given whether any devals are
/// already known to have occurred (`calc.py`'s inline logic in `num_missed_devals`).
fn next_devalue_after(num_devals: i32, known_at: i64) -> i64 {
    if num_devals == 0 {
        let candidate = day_start(known_at) + DEVAL_SECONDS_OF_DAY;
        if seconds_of_day(known_at) < DEVAL_SECONDS_OF_DAY {
            candidate
        } else {
            candidate + SECONDS_PER_DAY
        }
    } else {
        let hour_of_day = seconds_of_day(known_at) / SECONDS_PER_HOUR;
        let deval_hour_of_day = DEVAL_SECONDS_OF_DAY / SECONDS_PER_HOUR;
        let hours_to_skip = (deval_hour_of_day - hour_of_day).rem_euclid(HOURS_PER_DEVAL);
        let known_hour_start = known_at - known_at.rem_euclid(SECONDS_PER_HOUR);
        let mut next = known_hour_start + hours_to_skip * SECONDS_PER_HOUR;
        if next < known_at {
            next += SECONDS_PER_DEVAL;
        }
        next
    }
}

/// Number of devals that must have happened between `known_at` (when `num_devals` was
/// last confirmed) and `when` (`calc.py`'s `num_missed_devals`).
pub fn num_missed_devals(num_devals: i32, known_at: Timestamp, when: Timestamp) -> i32 {
    let next_deval = next_devalue_after(num_devals, known_at as i64);
    let elapsed = when - next_deval as Timestamp;
    let n = (elapsed / SECONDS_PER_DEVAL as Timestamp).ceil();
    n.max(0.0) as i32
}

/// Walks a plot's history (newest first, as persisted) to bound when it opened, mirroring
/// `calc.py`'s `open_plot_detail`. `history` excludes the current (already-open) state;
/// `current` is that state.
pub fn open_plot_detail_from_history(
    current: &PlotState,
    history: &[PlotState],
    house_size: i32,
    now: Timestamp,
) -> OpenPlotDetail {
    let mut last_known_price = current.last_seen_price;
    let mut last_known_devals = current.lotto_entries;
    let mut last_known_devals_time = current.last_seen;
    let mut est_time_open_max = current.first_seen;
    let mut est_time_open_min = 0.0;
    let mut exhausted = true;

    for ph in history {
        if last_known_price.is_none() {
            last_known_price = ph.last_seen_price;
            last_known_devals = ph.lotto_entries;
            last_known_devals_time = ph.last_seen;
        }

        let price_decreased = matches!((last_known_price, ph.last_seen_price), (Some(l), Some(p)) if p < l);
        let price_did_not_increase = matches!((last_known_price, ph.last_seen_price), (Some(l), Some(p)) if p == l);

        if ph.is_owned || price_decreased || price_did_not_increase {
            est_time_open_min = ph.last_seen;
            exhausted = false;
            break;
        }

        est_time_open_max = ph.first_seen;
    }

    if exhausted {
        est_time_open_min = 0.0;
    }

    let est_num_devals = last_known_devals.unwrap_or(0)
        + num_missed_devals(last_known_devals.unwrap_or(0), last_known_devals_time, now);

    let early = earliest_possible_open_time(est_num_devals, now);
    let late = early + SECONDS_PER_DAY as Timestamp;
    let est_time_open_min = est_time_open_min.max(early);
    let est_time_open_max = est_time_open_max.min(late);

    let lotto_entries = match current.lotto_phase {
        Some(LottoPhase::Unavailable) => Some(0),
        _ => current.lotto_entries,
    };

    OpenPlotDetail {
        world_id: current.world_id,
        district_id: current.district_id,
        ward_number: current.ward_number,
        plot_number: current.plot_number,
        size: house_size,
        known_price: last_known_price,
        last_updated_time: current.last_seen,
        est_time_open_min,
        est_time_open_max,
        est_num_devals,
        lotto_entries,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PurchaseSystem;

    fn state(world_id: i32, first_seen: Timestamp, last_seen: Timestamp, is_owned: bool) -> PlotState {
        PlotState {
            id: 0,
            world_id,
            district_id: 339,
            ward_number: 0,
            plot_number: 0,
            first_seen,
            last_seen,
            is_owned,
            owner_name: None,
            last_seen_price: Some(1_000_000),
            purchase_system: PurchaseSystem::NONE,
            lotto_entries: None,
            lotto_phase: None,
            lotto_phase_until: None,
        }
    }

    #[test]
    fn scenario_3_sold_after_open() {
        // spec.md §8 scenario 3: open at t=1000, sold at t=2000.
        let sold = state(31415, 2000.0, 2000.0, true);
        let open = state(31415, 1000.0, 1000.0, false);
        let detail = transition_sold_detail(&sold, &open, 0);
        assert_eq!(detail.est_time_sold_min, 1000.0);
        assert_eq!(detail.est_time_sold_max, 2000.0);
    }

    #[test]
    fn scenario_4_open_after_sold() {
        // spec.md §8 scenario 4: sold at t=2000, open again at t=5000.
        let sold = state(31415, 2000.0, 2000.0, true);
        let open = state(31415, 5000.0, 5000.0, false);
        let detail = transition_open_detail(&open, &open, Some(&sold), 0);
        assert_eq!(detail.est_time_open_min, 2000.0);
        assert_eq!(detail.est_time_open_max, 5000.0);
        assert_eq!(detail.known_price, Some(1_000_000));
    }

    #[test]
    fn unavailable_lotto_phase_zeroes_entries() {
        let mut open = state(31415, 5000.0, 5000.0, false);
        open.lotto_phase = Some(LottoPhase::Unavailable);
        open.lotto_entries = Some(7);
        let detail = transition_open_detail(&open, &open, None, 0);
        assert_eq!(detail.lotto_entries, Some(0));
    }

    #[test]
    fn no_prior_sold_state_yields_zero_min() {
        let open = state(31415, 1000.0, 1000.0, false);
        let detail = transition_open_detail(&open, &open, None, 0);
        assert_eq!(detail.est_time_open_min, 0.0);
    }
}
