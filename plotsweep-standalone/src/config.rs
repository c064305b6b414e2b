// This file is part of plotsweep.
// SPDX-License-Identifier: Apache-2.0
//
// Consolidated binary config. Shares a single `storage`/`queue`/`jwt`/`api` infra
// layer (one Postgres pool, one Redis client) between the API and worker application
// configs, grounded on `spo-api/src/config.rs` + `spo-indexer`'s `Config` shape for
// each half and `indexer-standalone/Cargo.toml`'s consolidated-binary intent.

use plotsweep_common::telemetry;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub run_migrations: bool,

    #[serde(rename = "api")]
    pub api_application_config: plotsweep_api::application::Config,

    #[serde(rename = "worker")]
    pub worker_application_config: plotsweep_worker::application::Config,

    #[serde(rename = "infra")]
    pub infra_config: plotsweep_api::infra::Config,

    #[serde(rename = "telemetry")]
    pub telemetry_config: telemetry::Config,

    pub gamedata_dir: PathBuf,
}
