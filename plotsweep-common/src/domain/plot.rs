// This file is part of plotsweep.
// SPDX-License-Identifier: Apache-2.0

use crate::domain::Timestamp;
use serde::{Deserialize, Serialize};
use std::ops::{BitOr, BitOrAssign};

/// Bitflag set over {LOTTERY, FREE_COMPANY, INDIVIDUAL}. Absence of LOTTERY implies FCFS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurchaseSystem(pub i32);

impl PurchaseSystem {
    pub const NONE: Self = Self(0);
    pub const LOTTERY: Self = Self(1);
    pub const FREE_COMPANY: Self = Self(2);
    pub const INDIVIDUAL: Self = Self(4);

    pub fn contains(self, flag: Self) -> bool {
        self.0 & flag.0 == flag.0
    }

    pub fn is_lottery(self) -> bool {
        self.contains(Self::LOTTERY)
    }
}

impl BitOr for PurchaseSystem {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for PurchaseSystem {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Housing ward-sweep bitfield as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InfoFlags(pub i32);

impl InfoFlags {
    pub const PLOT_OWNED: Self = Self(1);
    pub const VISITORS_ALLOWED: Self = Self(2);
    pub const HAS_SEARCH_COMMENT: Self = Self(4);
    pub const HOUSE_BUILT: Self = Self(8);
    pub const OWNED_BY_FC: Self = Self(16);

    pub fn contains(self, flag: Self) -> bool {
        self.0 & flag.0 == flag.0
    }

    pub fn is_owned(self) -> bool {
        self.contains(Self::PLOT_OWNED)
    }

    pub fn has_built_house(self) -> bool {
        self.contains(Self::HOUSE_BUILT)
    }
}

/// Lifecycle state of a lottery cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LottoPhase {
    Available,
    Results,
    Unavailable,
}

impl LottoPhase {
    /// `AvailabilityType` on the wire: 1=Available, 2=Results, 3=Unavailable.
    pub fn from_availability_type(value: i32) -> Option<Self> {
        match value {
            1 => Some(Self::Available),
            2 => Some(Self::Results),
            3 => Some(Self::Unavailable),
            _ => None,
        }
    }
}

/// One row per distinguishable epoch of a plot (spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotState {
    pub id: i64,

    pub world_id: i32,
    pub district_id: i32,
    pub ward_number: i32,
    pub plot_number: i32,

    pub first_seen: Timestamp,
    pub last_seen: Timestamp,

    pub is_owned: bool,
    pub owner_name: Option<String>,
    pub last_seen_price: Option<i64>,

    pub purchase_system: PurchaseSystem,

    pub lotto_entries: Option<i32>,
    pub lotto_phase: Option<LottoPhase>,
    pub lotto_phase_until: Option<i64>,
}

impl PlotState {
    pub fn location(&self) -> crate::domain::PlotLocation {
        crate::domain::PlotLocation {
            world_id: self.world_id,
            district_id: self.district_id,
            ward_number: self.ward_number,
            plot_number: self.plot_number,
        }
    }
}
