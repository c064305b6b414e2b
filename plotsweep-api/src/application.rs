// This file is part of plotsweep.
// SPDX-License-Identifier: Apache-2.0
//
// HTTP process entry point, grounded on `spo-api/src/application.rs`'s
// `run(config, api, subscriber, sigterm) -> anyhow::Result<()>` shape with a
// `task::spawn` + `tokio::select!` shutdown. Dropped the teacher's `Subscriber`
// parameter (no NATS catch-up analog) and `network_id` (no multi-network concept);
// `Config` instead carries the admission-skew and fanout-timing knobs spec.md names
// as constants (§4.1 step 1's "10 seconds", §4.5's "90 seconds"/"24 hours"), since
// nothing else in the binary needs a config struct at this layer.

use crate::domain::Api;
use anyhow::Context as AnyhowContext;
use log::warn;
use serde::Deserialize;
use tokio::{select, signal::unix::Signal, task};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// spec.md §4.1 step 1: observations whose client timestamp is further than this
    /// many seconds in the future of wall clock are rejected.
    #[serde(default = "default_max_future_skew_secs")]
    pub max_future_skew_secs: i64,

    /// spec.md §4.5 step 2: ping cadence sent to every attached viewer.
    #[serde(default = "default_ws_ping_interval_secs")]
    pub ws_ping_interval_secs: u64,

    /// spec.md §4.5 step 4: anonymous (tokenless) viewers are disconnected after this
    /// many seconds.
    #[serde(default = "default_anonymous_viewer_ttl_secs")]
    pub anonymous_viewer_ttl_secs: u64,

    /// spec.md §4.13: TTL of the `csv_dump_lock` mutex key guarding `/csv/dump`.
    #[serde(default = "default_csv_dump_lock_ttl_secs")]
    pub csv_dump_lock_ttl_secs: u64,
}

fn default_max_future_skew_secs() -> i64 {
    10
}

fn default_ws_ping_interval_secs() -> u64 {
    90
}

fn default_anonymous_viewer_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_csv_dump_lock_ttl_secs() -> u64 {
    5 * 60
}

pub async fn run(config: Config, api: impl Api, mut sigterm: Signal) -> anyhow::Result<()> {
    let serve_api_task = task::spawn(async move { api.serve(config).await.context("serving plotsweep API") });

    select! {
        result = serve_api_task => result
            .context("serve_api_task panicked")
            .and_then(|r| r.context("serve_api_task failed")),
        _ = sigterm.recv() => {
            warn!("SIGTERM received");
            Ok(())
        }
    }
}
