// This file is part of plotsweep.
// SPDX-License-Identifier: Apache-2.0
//
// Core error taxonomy (spec.md §7, expanded SPEC_FULL.md §4.10). Grounded on
// `indexer-common/src/infra/ledger_state_storage/nats.rs`'s two-tier `thiserror` enum
// shape: one domain-level enum here (`CoreError`), with infra modules keeping their own
// narrower error enums (`RedisQueueError`, `PostgresStorageError`, `AxumApiError`) that
// convert into it at the boundary.

use thiserror::Error;

/// The error taxonomy from spec.md §7. `StoreFailure` wraps both SQL and Redis failures;
/// callers distinguish by their own infra-level error type before conversion if needed.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("input validation failed: {0}")]
    InputValidation(String),

    #[error("authentication failed")]
    AuthFailure,

    #[error("not found")]
    NotFound,

    #[error("history inconsistency for plot: {0}")]
    HistoryInconsistency(String),

    #[error("store failure")]
    StoreFailure(#[source] anyhow::Error),
}

impl CoreError {
    pub fn store_failure(error: impl Into<anyhow::Error>) -> Self {
        Self::StoreFailure(error.into())
    }
}
