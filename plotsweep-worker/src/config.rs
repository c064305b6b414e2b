// This file is part of plotsweep.
// SPDX-License-Identifier: Apache-2.0
//
// Top-level worker config (SPEC_FULL.md §4.8), nested the way `spo_api::config::Config`
// nests `application_config`/`infra_config`/`telemetry_config`.

use plotsweep_common::{infra::pool, infra::redis_queue, telemetry};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub run_migrations: bool,

    #[serde(rename = "application")]
    pub application_config: crate::application::Config,

    #[serde(rename = "storage")]
    pub storage_config: pool::Config,

    #[serde(rename = "queue")]
    pub queue_config: redis_queue::Config,

    #[serde(rename = "telemetry")]
    pub telemetry_config: telemetry::Config,

    pub gamedata_dir: std::path::PathBuf,
}
