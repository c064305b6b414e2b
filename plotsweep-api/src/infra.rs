// This file is part of plotsweep.
// SPDX-License-Identifier: Apache-2.0
//
// Infra-layer config nesting, grounded on `spo-api/src/infra.rs`'s `api`/`storage`
// split, extended with the `queue` (Redis) and `jwt` sub-configs this binary also needs.

pub mod api;

use plotsweep_common::infra::{jwt, pool, redis_queue};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(rename = "api")]
    pub api_config: api::Config,

    #[serde(rename = "storage")]
    pub storage_config: pool::Config,

    #[serde(rename = "queue")]
    pub queue_config: redis_queue::Config,

    #[serde(rename = "jwt")]
    pub jwt_config: jwt::Config,
}
