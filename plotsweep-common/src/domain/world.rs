// This file is part of plotsweep.
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

/// An immutable world (game server), populated once from game data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct World {
    pub world_id: i32,
    pub name: String,
    pub datacenter_id: i32,
    pub datacenter_name: String,
}

/// An immutable housing district. Five known districts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct District {
    pub district_id: i32,
    pub name: String,
    pub land_set_id: i32,
}

/// Immutable per-(district, plot_number) metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlotInfo {
    pub district_id: i32,
    pub plot_number: i32,
    pub house_size: i32,
    pub base_price: i64,
}

/// Uniquely identifies a physical plot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlotLocation {
    pub world_id: i32,
    pub district_id: i32,
    pub ward_number: i32,
    pub plot_number: i32,
}

/// Client identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sweeper {
    pub sweeper_id: i64,
    pub name: String,
    pub world_id: i32,
    pub last_seen: i64,
}
