// This file is part of plotsweep.
// SPDX-License-Identifier: Apache-2.0
//
// Per-plot reconciliation (spec.md §4.3). Pure: takes a PlotLocation's history (already
// fetched, newest-first) and an incoming observation, and decides what should change and
// what (if anything) should be broadcast. The SQL/Redis I/O this implies is applied by the
// caller (plotsweep-worker's application loop); nothing here ever suspends.
//
// Grounded on `original_source/worker/utils.py`'s `should_create_new_state` /
// `update_historical_state_from` / `new_state_from_event`, adjusted to match spec.md's
// gated `last_seen` advance and the worked examples in spec.md §8 (which broadcast
// `plot_update` on the extend path too, not only on append).

use crate::domain::{
    estimate::{plot_update_detail, transition_open_detail, transition_sold_detail},
    LottoPhase, PlotState, PlotStateEntry, Timestamp, WsMessage,
};

/// What happened to the store as a result of reconciling one observation.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// `E.timestamp > S.last_seen` and attributes matched: `S` was extended in place.
    ExtendedExisting {
        state: PlotState,
        /// True if the gated `last_seen` advance did *not* fire (spec.md §9 open question;
        /// exposed as the `plotsweep_last_seen_gate_blocked` metric).
        gate_blocked: bool,
        broadcast: Option<WsMessage>,
    },
    /// `E` fell inside an existing epoch and distinguishing attributes matched: null
    /// fields of `S` were filled from `E`.
    MergedIntermediate { state: PlotState },
    /// `E` fell inside an existing epoch but distinguishing attributes disagreed.
    SkippedInconsistent { state_id: i64 },
    /// A new state was appended, either succeeding `predecessor` or as the plot's very
    /// first observation (`predecessor = None`). `is_newest` is true only when this is the
    /// first row of the walk, the only case a transition broadcast may be computed.
    AppendedNew {
        new_state: PlotState,
        predecessor: Option<PlotState>,
        is_newest: bool,
    },
}

/// spec.md §4.3.1: whether `entry` and `state` disagree on a distinguishing attribute.
pub fn should_create_new_state(entry: &PlotStateEntry, state: &PlotState) -> bool {
    if entry.is_owned != state.is_owned {
        return true;
    }
    if entry.purchase_system != state.purchase_system {
        return true;
    }
    if let (Some(e_owner), Some(s_owner)) = (&entry.owner_name, &state.owner_name) {
        if e_owner != s_owner {
            return true;
        }
    }
    let phase_differs = matches!(
        (entry.lotto_phase, state.lotto_phase),
        (Some(e), Some(s)) if e != s
    );
    if phase_differs {
        return true;
    }
    let in_results_period = matches!(entry.lotto_phase, Some(LottoPhase::Results))
        || matches!(state.lotto_phase, Some(LottoPhase::Results));
    if in_results_period && entry.lotto_phase_until != state.lotto_phase_until {
        return true;
    }
    false
}

/// spec.md §4.3.1 extend bullets. Mutates `state` in place and reports whether the
/// `last_seen` gate blocked the advance, and whether any lottery-visible field actually
/// changed (used to decide a `plot_update` broadcast).
fn extend_state(state: &mut PlotState, entry: &PlotStateEntry) -> (bool, bool) {
    let had_owner = state.owner_name.is_some();
    let old_lotto_phase = state.lotto_phase;
    let old_lotto_entries = state.lotto_entries;
    let old_lotto_phase_until = state.lotto_phase_until;

    if let Some(price) = entry.price {
        state.last_seen_price = Some(price);
    }
    if let Some(e) = entry.lotto_entries {
        state.lotto_entries = Some(state.lotto_entries.map_or(e, |s| s.max(e)));
    }
    if entry.lotto_phase_until.is_some() {
        state.lotto_phase_until = entry.lotto_phase_until;
    }
    state.purchase_system = entry.purchase_system;
    if entry.lotto_phase.is_some() {
        state.lotto_phase = entry.lotto_phase;
    }

    let owner_just_populated = !had_owner && entry.owner_name.is_some();
    if owner_just_populated {
        state.owner_name = entry.owner_name.clone();
    }

    let has_placard_signal =
        entry.lotto_entries.is_some() || entry.lotto_phase.is_some() || entry.lotto_phase_until.is_some();
    let old_phase_elapsed =
        old_lotto_phase_until.is_some_and(|until| (until as Timestamp) < entry.timestamp);

    let should_advance = has_placard_signal || owner_just_populated || old_phase_elapsed;
    if should_advance {
        state.last_seen = entry.timestamp;
    }

    let lottery_changed = old_lotto_phase != state.lotto_phase
        || old_lotto_entries != state.lotto_entries
        || old_lotto_phase_until != state.lotto_phase_until;

    (!should_advance, lottery_changed)
}

/// spec.md §4.3 step 3: fills null fields of `state` from `entry`, leaving populated
/// fields untouched.
fn merge_null_fields(state: &mut PlotState, entry: &PlotStateEntry) {
    if state.owner_name.is_none() {
        state.owner_name = entry.owner_name.clone();
    }
    if state.last_seen_price.is_none() {
        state.last_seen_price = entry.price;
    }
    if state.lotto_entries.is_none() {
        state.lotto_entries = entry.lotto_entries;
    }
    if state.lotto_phase.is_none() {
        state.lotto_phase = entry.lotto_phase;
    }
    if state.lotto_phase_until.is_none() {
        state.lotto_phase_until = entry.lotto_phase_until;
    }
}

/// A brand-new `PlotState` row seeded entirely from `entry`.
pub fn new_state_from_event(entry: &PlotStateEntry) -> PlotState {
    PlotState {
        id: 0,
        world_id: entry.world_id,
        district_id: entry.district_id,
        ward_number: entry.ward_num,
        plot_number: entry.plot_num,
        first_seen: entry.timestamp,
        last_seen: entry.timestamp,
        is_owned: entry.is_owned,
        owner_name: entry.owner_name.clone(),
        last_seen_price: entry.price,
        purchase_system: entry.purchase_system,
        lotto_entries: entry.lotto_entries,
        lotto_phase: entry.lotto_phase,
        lotto_phase_until: entry.lotto_phase_until,
    }
}

/// Walks `history` (descending `last_seen`, as persisted) applying spec.md §4.3's
/// per-plot algorithm.
pub fn reconcile(entry: &PlotStateEntry, history: &[PlotState]) -> ReconcileOutcome {
    for (i, state) in history.iter().enumerate() {
        if entry.timestamp > state.last_seen {
            if should_create_new_state(entry, state) {
                return ReconcileOutcome::AppendedNew {
                    new_state: new_state_from_event(entry),
                    predecessor: Some(state.clone()),
                    is_newest: i == 0,
                };
            }
            let mut updated = state.clone();
            let (gate_blocked, lottery_changed) = extend_state(&mut updated, entry);
            let broadcast = if i == 0 && !updated.is_owned && lottery_changed {
                Some(WsMessage::PlotUpdate(plot_update_detail(entry, state)))
            } else {
                None
            };
            return ReconcileOutcome::ExtendedExisting {
                state: updated,
                gate_blocked,
                broadcast,
            };
        } else if state.first_seen <= entry.timestamp && entry.timestamp <= state.last_seen {
            if should_create_new_state(entry, state) {
                return ReconcileOutcome::SkippedInconsistent { state_id: state.id };
            }
            let mut updated = state.clone();
            merge_null_fields(&mut updated, entry);
            return ReconcileOutcome::MergedIntermediate { state: updated };
        }
        // else: state.first_seen > entry.timestamp, keep walking backward.
    }

    ReconcileOutcome::AppendedNew {
        new_state: new_state_from_event(entry),
        predecessor: None,
        is_newest: true,
    }
}

/// spec.md §4.3.2: the transition-detail broadcast computed when appending `new_state`
/// after `predecessor`. `None` when neither an ownership transition nor a lottery-phase
/// change occurred (shouldn't arise in practice, since `should_create_new_state` already
/// guaranteed a distinguishing difference, but kept total for callers).
pub fn transition_message(
    new_state: &PlotState,
    predecessor: &PlotState,
    entry: &PlotStateEntry,
    house_size: i32,
) -> Option<WsMessage> {
    if new_state.is_owned != predecessor.is_owned {
        if !new_state.is_owned {
            Some(WsMessage::PlotOpen(transition_open_detail(
                new_state,
                new_state,
                Some(predecessor),
                house_size,
            )))
        } else {
            Some(WsMessage::PlotSold(transition_sold_detail(
                new_state,
                predecessor,
                house_size,
            )))
        }
    } else if !new_state.is_owned {
        Some(WsMessage::PlotUpdate(plot_update_detail(entry, predecessor)))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PurchaseSystem;

    fn base_entry(timestamp: Timestamp) -> PlotStateEntry {
        PlotStateEntry {
            world_id: 31415,
            district_id: 339,
            ward_num: 0,
            plot_num: 0,
            timestamp,
            is_owned: false,
            owner_name: None,
            price: None,
            purchase_system: PurchaseSystem::NONE,
            lotto_entries: None,
            lotto_phase: None,
            lotto_phase_until: None,
        }
    }

    fn state_at(timestamp: Timestamp, is_owned: bool) -> PlotState {
        let mut entry = base_entry(timestamp);
        entry.is_owned = is_owned;
        if is_owned {
            entry.owner_name = Some("Alice Smith".into());
            entry.price = Some(1_000_000);
        }
        new_state_from_event(&entry)
    }

    #[test]
    fn scenario_1_first_observation_has_no_predecessor() {
        let entry = base_entry(1000.0);
        let outcome = reconcile(&entry, &[]);
        match outcome {
            ReconcileOutcome::AppendedNew {
                new_state,
                predecessor,
                is_newest,
            } => {
                assert_eq!(new_state.first_seen, 1000.0);
                assert_eq!(new_state.last_seen, 1000.0);
                assert!(!new_state.is_owned);
                assert!(predecessor.is_none());
                assert!(is_newest);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn scenario_3_ownership_change_appends_and_is_newest() {
        let open = state_at(1000.0, false);
        let mut entry = base_entry(2000.0);
        entry.is_owned = true;
        entry.owner_name = Some("Alice Smith".into());
        entry.price = Some(1_000_000);

        let outcome = reconcile(&entry, &[open.clone()]);
        match outcome {
            ReconcileOutcome::AppendedNew {
                new_state,
                predecessor: Some(pred),
                is_newest: true,
            } => {
                assert!(new_state.is_owned);
                let msg = transition_message(&new_state, &pred, &entry, 0).unwrap();
                match msg {
                    WsMessage::PlotSold(detail) => {
                        assert_eq!(detail.est_time_sold_min, 1000.0);
                        assert_eq!(detail.est_time_sold_max, 2000.0);
                    }
                    other => panic!("expected PlotSold, got {other:?}"),
                }
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn scenario_5_extend_with_new_lottery_info_broadcasts_update() {
        let open = state_at(5000.0, false);
        let mut entry = base_entry(5500.0);
        entry.lotto_entries = Some(3);
        entry.lotto_phase = Some(LottoPhase::Available);
        entry.lotto_phase_until = Some(9000);

        let outcome = reconcile(&entry, &[open]);
        match outcome {
            ReconcileOutcome::ExtendedExisting {
                state,
                gate_blocked,
                broadcast: Some(WsMessage::PlotUpdate(detail)),
            } => {
                assert!(!gate_blocked);
                assert_eq!(state.last_seen, 5500.0);
                assert_eq!(state.lotto_entries, Some(3));
                assert_eq!(state.lotto_phase, Some(LottoPhase::Available));
                assert_eq!(detail.previous_lotto_phase, None);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn scenario_6_results_phase_change_appends_new_state() {
        let mut extended = state_at(5000.0, false);
        extended.last_seen = 5500.0;
        extended.lotto_entries = Some(3);
        extended.lotto_phase = Some(LottoPhase::Available);
        extended.lotto_phase_until = Some(9000);

        let mut entry = base_entry(9500.0);
        entry.lotto_entries = Some(3);
        entry.lotto_phase = Some(LottoPhase::Results);
        entry.lotto_phase_until = Some(15000);

        let outcome = reconcile(&entry, &[extended.clone()]);
        match outcome {
            ReconcileOutcome::AppendedNew {
                new_state,
                predecessor: Some(pred),
                is_newest: true,
            } => {
                let msg = transition_message(&new_state, &pred, &entry, 0).unwrap();
                match msg {
                    WsMessage::PlotUpdate(detail) => {
                        assert_eq!(detail.previous_lotto_phase, Some(LottoPhase::Available));
                    }
                    other => panic!("expected PlotUpdate, got {other:?}"),
                }
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn idempotent_merge_within_existing_epoch() {
        let mut state = state_at(1000.0, false);
        state.last_seen = 1000.0;
        let entry = base_entry(1000.0);

        let outcome = reconcile(&entry, &[state.clone()]);
        match outcome {
            ReconcileOutcome::MergedIntermediate { state: merged } => {
                assert_eq!(merged, state);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn inconsistent_intermediate_observation_is_skipped() {
        let state = state_at(1000.0, false);
        let mut entry = base_entry(1000.0);
        entry.is_owned = true;

        let outcome = reconcile(&entry, &[state.clone()]);
        assert_eq!(
            outcome,
            ReconcileOutcome::SkippedInconsistent { state_id: state.id }
        );
    }

    #[test]
    fn shallow_lottery_observation_without_signal_is_gated() {
        let mut state = state_at(1000.0, false);
        state.last_seen = 1000.0;
        let entry = base_entry(1001.0);

        let outcome = reconcile(&entry, &[state]);
        match outcome {
            ReconcileOutcome::ExtendedExisting {
                state, gate_blocked, ..
            } => {
                assert!(gate_blocked);
                assert_eq!(state.last_seen, 1000.0);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
