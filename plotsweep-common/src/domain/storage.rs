// This file is part of plotsweep.
// SPDX-License-Identifier: Apache-2.0

use crate::domain::{District, Event, PlotInfo, PlotLocation, PlotState, Sweeper, Timestamp, World, WsMessage};
use std::error::Error as StdError;

/// A Postgres-backed unit of work, threaded explicitly through `Storage` methods that
/// must observe one another's writes within a single reconcile (spec.md §4.3: "each
/// reconcile runs in its own SQL transaction"). Grounded on
/// `spo-indexer/src/domain/storage.rs`'s `SqlxTransaction` alias, simplified to Postgres
/// only per SPEC_FULL.md (the teacher cfg-gates this on `cloud`/`standalone` features;
/// this crate has a single storage backend).
pub type SqlxTransaction = sqlx::Transaction<'static, sqlx::Postgres>;

/// Persistence for worlds/districts/plotinfo (immutable gamedata), plot state history,
/// sweepers, and the audit trail. Grounded on `spo-indexer/src/domain/storage.rs`'s
/// `trait_variant::make(Send)` shape.
#[trait_variant::make(Send)]
pub trait Storage
where
    Self: Clone + Send + Sync + 'static,
{
    type Error: StdError + Send + Sync + 'static;

    async fn create_tx(&self) -> Result<SqlxTransaction, Self::Error>;

    /// `ON CONFLICT DO NOTHING` upserts for the immutable gamedata tables, run once at
    /// startup from CSV (SPEC_FULL.md §4.0).
    async fn upsert_world(&self, world: &World, tx: &mut SqlxTransaction) -> Result<(), Self::Error>;
    async fn upsert_district(&self, district: &District, tx: &mut SqlxTransaction) -> Result<(), Self::Error>;
    async fn upsert_plot_info(&self, info: &PlotInfo, tx: &mut SqlxTransaction) -> Result<(), Self::Error>;

    /// Fetches a `PlotLocation`'s persisted states in descending `last_seen`, the order
    /// spec.md §4.3's reconciliation walk requires.
    async fn historical_plot_states(
        &self,
        location: PlotLocation,
        tx: &mut SqlxTransaction,
    ) -> Result<Vec<PlotState>, Self::Error>;

    /// Inserts a freshly appended `PlotState`, returning its assigned id.
    async fn insert_plot_state(&self, state: &PlotState, tx: &mut SqlxTransaction) -> Result<i64, Self::Error>;

    /// Writes back an extended or null-filled `PlotState` (spec.md §4.3 steps 2/3).
    async fn update_plot_state(&self, state: &PlotState, tx: &mut SqlxTransaction) -> Result<(), Self::Error>;

    /// Appends an audit row for an admitted observation (spec.md §3, §4.1).
    async fn insert_event(&self, event: &Event, tx: &mut SqlxTransaction) -> Result<(), Self::Error>;

    /// Records a broadcast payload for forensic replay (SPEC_FULL.md §3, the `broadcasts`
    /// table, grounded on `crud.record_broadcast_payload`).
    async fn insert_broadcast(
        &self,
        message: &WsMessage,
        timestamp: Timestamp,
        tx: &mut SqlxTransaction,
    ) -> Result<(), Self::Error>;

    /// Upserts a sweeper's `last_seen` and display name (C7 `/hello`).
    async fn upsert_sweeper(&self, sweeper: &Sweeper, tx: &mut SqlxTransaction) -> Result<(), Self::Error>;

    async fn get_sweeper(&self, sweeper_id: i64) -> Result<Option<Sweeper>, Self::Error>;

    async fn list_worlds(&self) -> Result<Vec<World>, Self::Error>;

    async fn get_world(&self, world_id: i32) -> Result<Option<World>, Self::Error>;

    /// Every known district, used to build a world's district rollup (C6's
    /// `GET /worlds/{wid}`, which reports one entry per district regardless of whether
    /// any plot in it has ever been observed).
    async fn list_districts(&self) -> Result<Vec<District>, Self::Error>;

    async fn get_district(&self, district_id: i32) -> Result<Option<District>, Self::Error>;

    async fn get_plot_info(&self, district_id: i32, plot_number: i32) -> Result<Option<PlotInfo>, Self::Error>;

    /// The latest persisted state per plot in `(world_id, district_id)`, used to render
    /// `GET /worlds/{wid}/{did}` (C6).
    async fn latest_plot_states(
        &self,
        world_id: i32,
        district_id: i32,
    ) -> Result<Vec<PlotState>, Self::Error>;

    /// Full history of one plot, descending `last_seen`, excluding the current state —
    /// the input to `estimate::open_plot_detail_from_history` (SPEC_FULL.md §4.12).
    async fn plot_history(&self, location: PlotLocation) -> Result<Vec<PlotState>, Self::Error>;

    /// Every persisted `PlotState`, for the `GET /csv/dump` table scan (SPEC_FULL.md
    /// §4.13).
    async fn all_plot_states(&self) -> Result<Vec<PlotState>, Self::Error>;
}
