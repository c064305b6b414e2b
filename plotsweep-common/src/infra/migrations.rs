// This file is part of plotsweep.
// SPDX-License-Identifier: Apache-2.0
//
// Grounded on `indexer-common/src/infra/migrations/postgres.rs`'s embedded
// `sqlx::migrate!` idiom.

use crate::infra::pool::PostgresPool;
use thiserror::Error;

/// Runs the embedded Postgres migrations (spec.md §6 Database tables: `worlds`,
/// `districts`, `plotinfo`, `plot_states`, `events`, `sweepers`, plus the
/// `broadcasts` audit table from SPEC_FULL.md §3).
pub async fn run(pool: &PostgresPool) -> Result<(), Error> {
    sqlx::migrate!("migrations/postgres").run(&**pool).await?;
    Ok(())
}

#[derive(Debug, Error)]
#[error("cannot run migrations for postgres")]
pub struct Error(#[from] sqlx::migrate::MigrateError);
