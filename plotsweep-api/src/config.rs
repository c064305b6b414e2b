// This file is part of plotsweep.
// SPDX-License-Identifier: Apache-2.0
//
// Top-level binary config, grounded on `spo-api/src/config.rs`'s `run_migrations` +
// `application`/`infra`/`telemetry` nesting.

use crate::{application, infra};
use plotsweep_common::telemetry;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub run_migrations: bool,

    #[serde(rename = "application")]
    pub application_config: application::Config,

    #[serde(rename = "infra")]
    pub infra_config: infra::Config,

    #[serde(rename = "telemetry")]
    pub telemetry_config: telemetry::Config,

    pub gamedata_dir: std::path::PathBuf,
}
