// This file is part of plotsweep.
// SPDX-License-Identifier: Apache-2.0
// Licensed under the Apache License, Version 2.0 (the "License");
// You may not use this file except in compliance with the License.
// You may obtain a copy of the License at
// http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// C3 reconciliation loop (spec.md §4.3). Grounded on `spo-indexer/src/application.rs`'s
// `run(config, storage, ..., sigterm) -> anyhow::Result<()>` shape with a
// `tokio::select!` shutdown, and on `original_source/worker/main.py`'s `main_loop` /
// `process_plot_from_key` for the per-observation control flow.

use fastrace::trace;
use log::{debug, error, warn};
use plotsweep_common::domain::{
    PlotLocation, PlotStateEntry, PubSub, Queue, SqlxTransaction, Storage, WsMessage,
    WS_MESSAGES_CHANNEL,
};
use plotsweep_common::domain::reconcile::{ReconcileOutcome, reconcile, transition_message};
use serde::Deserialize;
use std::time::Duration;
use tokio::{select, signal::unix::Signal};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// `BZPOPMIN` timeout in seconds; the loop re-checks the shutdown signal whenever
    /// this elapses with nothing popped.
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
}

fn default_poll_timeout_secs() -> u64 {
    5
}

/// spec.md §4.3 operating model: `loop { BZPOPMIN; GETDEL; parse; reconcile }`, observing
/// `sigterm` between iterations (spec.md §5: "Worker ... tasks observe a shutdown signal
/// between iterations").
pub async fn run<S, Q, P>(
    config: Config,
    storage: S,
    queue: Q,
    pub_sub: P,
    mut sigterm: Signal,
) -> anyhow::Result<()>
where
    S: Storage,
    Q: Queue,
    P: PubSub,
{
    let poll_timeout = Duration::from_secs(config.poll_timeout_secs);

    loop {
        select! {
            popped = queue.pop_min(poll_timeout) => {
                match popped {
                    Ok(Some((key, _score))) => {
                        process_key(&key, &storage, &queue, &pub_sub).await;
                    }
                    Ok(None) => {
                        let len = queue.len().await.unwrap_or(0);
                        metrics::gauge!("plotsweep_queue_length").set(len as f64);
                    }
                    Err(error) => {
                        error!(error:? = error; "failed to pop from event queue");
                    }
                }
            }
            _ = sigterm.recv() => {
                warn!("SIGTERM received");
                return Ok(());
            }
        }
    }
}

async fn process_key<S, Q, P>(key: &str, storage: &S, queue: &Q, pub_sub: &P)
where
    S: Storage,
    Q: Queue,
    P: PubSub,
{
    let payload = match queue.get_del(key).await {
        Ok(Some(payload)) => payload,
        Ok(None) => {
            // spec.md §4.2: the dedup-TTL payload already expired; the dequeue is a no-op.
            warn!(key; "queue key had no payload, dedup TTL likely expired");
            return;
        }
        Err(error) => {
            error!(error:? = error, key; "GETDEL failed");
            return;
        }
    };

    // The ingest admitter (C2) already normalizes each observation into one
    // `PlotStateEntry` per plot before admission, so one dequeued payload is always
    // exactly one plot's entry (`original_source/worker/main.py`'s
    // `PlotStateEntry.parse_raw(data)`).
    let entry: PlotStateEntry = match serde_json::from_slice(&payload) {
        Ok(entry) => entry,
        Err(error) => {
            error!(error:%, key; "malformed plot state entry payload");
            return;
        }
    };

    if let Err(error) = reconcile_entry(&entry, storage, pub_sub).await {
        error!(error:?, world_id = entry.world_id, district_id = entry.district_id,
               ward_num = entry.ward_num, plot_num = entry.plot_num; "reconcile failed");
    }
}

/// spec.md §4.3: one SQL transaction per reconciled entry; on failure the transaction is
/// rolled back, the error logged by the caller, and the loop continues.
#[trace]
async fn reconcile_entry<S, P>(entry: &PlotStateEntry, storage: &S, pub_sub: &P) -> anyhow::Result<()>
where
    S: Storage,
    P: PubSub,
{
    let mut tx = storage.create_tx().await.map_err(|e| anyhow::anyhow!("{e}"))?;

    let location = PlotLocation {
        world_id: entry.world_id,
        district_id: entry.district_id,
        ward_number: entry.ward_num,
        plot_number: entry.plot_num,
    };

    let history = storage
        .historical_plot_states(location, &mut tx)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    let outcome = reconcile(entry, &history);
    let broadcast = apply_outcome(entry, outcome, storage, &mut tx).await?;

    tx.commit().await?;

    if let Some(message) = broadcast {
        publish(pub_sub, &message).await;
    }

    Ok(())
}

async fn apply_outcome<S>(
    entry: &PlotStateEntry,
    outcome: ReconcileOutcome,
    storage: &S,
    tx: &mut SqlxTransaction,
) -> anyhow::Result<Option<WsMessage>>
where
    S: Storage,
{
    match outcome {
        ReconcileOutcome::ExtendedExisting {
            state,
            gate_blocked,
            broadcast,
        } => {
            if gate_blocked {
                metrics::counter!("plotsweep_last_seen_gate_blocked").increment(1);
            }
            storage
                .update_plot_state(&state, tx)
                .await
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            Ok(broadcast)
        }
        ReconcileOutcome::MergedIntermediate { state } => {
            storage
                .update_plot_state(&state, tx)
                .await
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            Ok(None)
        }
        ReconcileOutcome::SkippedInconsistent { state_id } => {
            debug!(state_id; "observation disagreed with an intermediate epoch, skipping");
            metrics::counter!("plotsweep_history_inconsistency").increment(1);
            Ok(None)
        }
        ReconcileOutcome::AppendedNew {
            mut new_state,
            predecessor,
            is_newest,
        } => {
            let id = storage
                .insert_plot_state(&new_state, tx)
                .await
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            new_state.id = id;

            let broadcast = match (is_newest, &predecessor) {
                (true, Some(predecessor)) => {
                    let house_size = storage
                        .get_plot_info(new_state.district_id, new_state.plot_number)
                        .await
                        .map_err(|e| anyhow::anyhow!("{e}"))?
                        .map(|info| info.house_size)
                        .unwrap_or(0);
                    transition_message(&new_state, predecessor, entry, house_size)
                }
                _ => None,
            };

            if let Some(message) = &broadcast {
                storage
                    .insert_broadcast(message, entry.timestamp, tx)
                    .await
                    .map_err(|e| anyhow::anyhow!("{e}"))?;
            }

            Ok(broadcast)
        }
    }
}

async fn publish<P>(pub_sub: &P, message: &WsMessage)
where
    P: PubSub,
{
    let payload = match message.to_json() {
        Ok(payload) => payload,
        Err(error) => {
            error!(error:%; "failed to serialize broadcast message");
            return;
        }
    };

    if let Err(error) = pub_sub.publish(WS_MESSAGES_CHANNEL, &payload).await {
        error!(error:?; "failed to publish broadcast message");
    }
}
