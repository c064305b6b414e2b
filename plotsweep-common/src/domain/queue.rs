// This file is part of plotsweep.
// SPDX-License-Identifier: Apache-2.0

use std::{error::Error as StdError, time::Duration};

/// Abstraction over the event priority queue, dedup-key store, and mutex primitive
/// (spec.md §4.2, §6 Queue keys). Grounded on
/// `indexer-common/src/domain/ledger_state_storage.rs`'s `trait_variant::make(Send)` shape.
#[trait_variant::make(Send)]
pub trait Queue: Clone + Sync + 'static {
    type Error: StdError + Send + Sync + 'static;

    /// Admits an observation: `SET <key> <payload> NX EX ttl` followed by
    /// `ZADD events_pq <key> <score> NX` when the dedup key was newly set. Returns `true`
    /// if the observation was newly admitted, `false` if it was a dedup hit within `ttl`.
    async fn admit(
        &self,
        key: &str,
        payload: &[u8],
        score: f64,
        ttl: Duration,
    ) -> Result<bool, Self::Error>;

    /// Blocking pop-minimum (`BZPOPMIN`) with the given timeout. `None` on timeout, so
    /// callers can re-check a shutdown signal between attempts.
    async fn pop_min(&self, timeout: Duration) -> Result<Option<(String, f64)>, Self::Error>;

    /// `GETDEL`: retrieve and atomically delete the payload under `key`. `None` if the
    /// key had already expired (spec.md §4.2: "the dequeue is a no-op").
    async fn get_del(&self, key: &str) -> Result<Option<Vec<u8>>, Self::Error>;

    /// Current length of the priority queue, exposed as a scalar metric (spec.md §5).
    async fn len(&self) -> Result<u64, Self::Error>;

    /// `SET <key> 1 NX EX ttl`, used for the `csv_dump_lock` mutex (spec.md §6).
    async fn try_lock(&self, key: &str, ttl: Duration) -> Result<bool, Self::Error>;
}
