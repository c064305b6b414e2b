// This file is part of plotsweep.
// SPDX-License-Identifier: Apache-2.0

use crate::domain::{InfoFlags, LottoPhase, PurchaseSystem, Timestamp};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One entry of a `HOUSING_WARD_INFO` batch (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HouseInfoEntry {
    pub house_price: Option<i64>,
    pub info_flags: InfoFlags,
    pub house_appeals: [i32; 3],
    pub estate_owner_name: Option<String>,
}

/// `LandIdent` on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandIdent {
    pub world_id: i32,
    pub territory_type_id: i32,
    pub ward_number: i32,
    pub land_id: i32,
}

/// `HOUSING_WARD_INFO` observation: one ward sweep, carrying 60 plot entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HousingWardInfo {
    pub client_timestamp: Timestamp,
    pub server_timestamp: Timestamp,
    pub land_ident: LandIdent,
    pub house_info_entries: Vec<HouseInfoEntry>,
    pub purchase_type: i32,
    pub tenant_type: i32,
}

/// `LOTTERY_INFO` observation: one plot's lottery counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LotteryInfo {
    pub client_timestamp: Timestamp,
    pub world_id: i32,
    pub district_id: i32,
    pub ward_id: i32,
    pub plot_id: i32,
    pub purchase_type: i32,
    pub tenant_type: i32,
    pub availability_type: i32,
    pub phase_ends_at: Option<i64>,
    pub entry_count: Option<i32>,
}

/// Tagged sum type over the two observation shapes (spec.md §9: "realized as a tagged sum
/// type with event_type as discriminator").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type")]
pub enum Observation {
    #[serde(rename = "HOUSING_WARD_INFO")]
    HousingWardInfo(HousingWardInfo),
    #[serde(rename = "LOTTERY_INFO")]
    LotteryInfo(LotteryInfo),
}

/// Maps `PurchaseType`/`TenantType` on the wire to the output `PurchaseSystem` bitflag
/// (spec.md §6: "PurchaseType=Lottery ⇒ set LOTTERY; TenantType=Personal ⇒ INDIVIDUAL;
/// TenantType=FreeCompany ⇒ FREE_COMPANY; TenantType=Unrestricted ⇒ both").
pub fn purchase_system_from_wire(purchase_type: i32, tenant_type: i32) -> PurchaseSystem {
    let mut system = PurchaseSystem::NONE;
    if purchase_type == 2 {
        system |= PurchaseSystem::LOTTERY;
    }
    match tenant_type {
        1 => system |= PurchaseSystem::FREE_COMPANY,
        2 => system |= PurchaseSystem::INDIVIDUAL,
        _ => system |= PurchaseSystem::FREE_COMPANY | PurchaseSystem::INDIVIDUAL,
    }
    system
}

/// A single plot's worth of normalized observation, as enqueued and consumed by the
/// reconciliation worker (spec.md §4.1, §4.3). Mirrors the original's
/// `schemas.paissa.PlotStateEntry`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotStateEntry {
    pub world_id: i32,
    pub district_id: i32,
    pub ward_num: i32,
    pub plot_num: i32,
    pub timestamp: Timestamp,

    pub is_owned: bool,
    pub owner_name: Option<String>,
    pub price: Option<i64>,
    pub purchase_system: PurchaseSystem,

    pub lotto_entries: Option<i32>,
    pub lotto_phase: Option<LottoPhase>,
    pub lotto_phase_until: Option<i64>,
}

/// Which dedup/queue namespace an entry belongs to (spec.md §4.1, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationKind {
    WardInfo,
    LotteryInfo,
}

impl ObservationKind {
    pub fn key_namespace(self) -> &'static str {
        match self {
            Self::WardInfo => "event.wardinfo.plot",
            Self::LotteryInfo => "event.lotteryinfo.plot",
        }
    }
}

/// Normalizes a `HousingWardInfo` batch into one `PlotStateEntry` per plot, using the
/// authoritative server timestamp (spec.md §4.1: "For ward observations the server
/// timestamp is authoritative").
pub fn entries_from_ward_info(ward_info: &HousingWardInfo) -> Vec<PlotStateEntry> {
    let purchase_system = purchase_system_from_wire(ward_info.purchase_type, ward_info.tenant_type);

    ward_info
        .house_info_entries
        .iter()
        .enumerate()
        .map(|(plot_num, entry)| PlotStateEntry {
            world_id: ward_info.land_ident.world_id,
            district_id: ward_info.land_ident.territory_type_id,
            ward_num: ward_info.land_ident.ward_number,
            plot_num: plot_num as i32,
            timestamp: ward_info.server_timestamp,
            is_owned: entry.info_flags.is_owned(),
            owner_name: entry.estate_owner_name.clone().filter(|s| !s.is_empty()),
            price: entry.house_price,
            purchase_system,
            lotto_entries: None,
            lotto_phase: None,
            lotto_phase_until: None,
        })
        .collect()
}

/// Normalizes a `LotteryInfo` observation into a `PlotStateEntry`, using the client
/// timestamp (spec.md §4.1: "for lottery observations use the client timestamp").
pub fn entry_from_lottery_info(info: &LotteryInfo) -> PlotStateEntry {
    PlotStateEntry {
        world_id: info.world_id,
        district_id: info.district_id,
        ward_num: info.ward_id,
        plot_num: info.plot_id,
        timestamp: info.client_timestamp,
        is_owned: false,
        owner_name: None,
        price: None,
        purchase_system: purchase_system_from_wire(info.purchase_type, info.tenant_type),
        lotto_entries: info.entry_count,
        lotto_phase: LottoPhase::from_availability_type(info.availability_type),
        lotto_phase_until: info.phase_ends_at,
    }
}

/// `sha256(be32(world) ∥ be32(district) ∥ be16(ward) ∥ be16(plot) ∥ utf8_padded(owner, 32))`,
/// hex-encoded (spec.md §4.1, §6).
pub fn dedup_key_hash(
    world_id: i32,
    district_id: i32,
    ward_number: i32,
    plot_number: i32,
    owner_name: &str,
) -> String {
    let mut buf = Vec::with_capacity(12 + 32);
    buf.extend_from_slice(&(world_id as u32).to_be_bytes());
    buf.extend_from_slice(&(district_id as u32).to_be_bytes());
    buf.extend_from_slice(&(ward_number as u16).to_be_bytes());
    buf.extend_from_slice(&(plot_number as u16).to_be_bytes());

    let mut owner_padded = [0u8; 32];
    let owner_bytes = owner_name.as_bytes();
    let len = owner_bytes.len().min(32);
    owner_padded[..len].copy_from_slice(&owner_bytes[..len]);
    buf.extend_from_slice(&owner_padded);

    let digest = Sha256::digest(&buf);
    hex::encode(digest)
}

/// Full dedup key including namespace, e.g. `event.wardinfo.plot:<hex>`.
pub fn dedup_key(entry: &PlotStateEntry, kind: ObservationKind) -> String {
    let owner = entry.owner_name.as_deref().unwrap_or("");
    let hash = dedup_key_hash(
        entry.world_id,
        entry.district_id,
        entry.ward_num,
        entry.plot_num,
        owner,
    );
    format!("{}:{}", kind.key_namespace(), hash)
}

/// Append-only audit row (spec.md §3). Never read by the core reconciliation path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub sweeper_id: Option<i64>,
    pub timestamp: Timestamp,
    pub event_type: String,
    pub data: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_key_is_stable() {
        let a = dedup_key_hash(31415, 339, 0, 0, "");
        let b = dedup_key_hash(31415, 339, 0, 0, "");
        assert_eq!(a, b);
    }

    #[test]
    fn dedup_key_distinguishes_owner() {
        let a = dedup_key_hash(31415, 339, 0, 0, "");
        let b = dedup_key_hash(31415, 339, 0, 0, "Alice Smith");
        assert_ne!(a, b);
    }

    #[test]
    fn dedup_key_namespaces_differ() {
        let entry = PlotStateEntry {
            world_id: 1,
            district_id: 2,
            ward_num: 3,
            plot_num: 4,
            timestamp: 0.0,
            is_owned: false,
            owner_name: None,
            price: None,
            purchase_system: PurchaseSystem::NONE,
            lotto_entries: None,
            lotto_phase: None,
            lotto_phase_until: None,
        };
        let ward = dedup_key(&entry, ObservationKind::WardInfo);
        let lottery = dedup_key(&entry, ObservationKind::LotteryInfo);
        assert!(ward.starts_with("event.wardinfo.plot:"));
        assert!(lottery.starts_with("event.lotteryinfo.plot:"));
        assert_ne!(ward, lottery);
    }
}
