//! Event type constants, one per distinct event the phase handlers in
//! `wargame-orders` may emit (spec.md §4, enumerated phase by phase).
//! Kept as plain `&'static str` rather than an enum because presentation
//! layers (out of scope) match on the wire string, and new event types
//! are expected to be added without a matching engine-wide enum bump.

/// Beginning phase (spec.md §4.2).
pub mod beginning {
    pub const ORDER_FAILED: &str = "ORDER_FAILED";
    pub const FACTION_LEFT: &str = "FACTION_LEFT";
    pub const FACTION_KICKED: &str = "FACTION_KICKED";
    pub const FACTION_JOINED: &str = "FACTION_JOINED";
    pub const COMMANDER_ASSIGNED: &str = "COMMANDER_ASSIGNED";
    pub const VICTORY_POINTS_ASSIGNED: &str = "VICTORY_POINTS_ASSIGNED";
    pub const ALLIANCE_PROPOSED: &str = "ALLIANCE_PROPOSED";
    pub const ALLIANCE_ACTIVATED: &str = "ALLIANCE_ACTIVATED";
    pub const ALLIANCE_DISSOLVED: &str = "ALLIANCE_DISSOLVED";
    pub const WAR_DECLARED: &str = "WAR_DECLARED";
}

/// Movement phase (spec.md §4.3).
pub mod movement {
    pub const TRANSIT_COMPLETE: &str = "TRANSIT_COMPLETE";
    pub const TRANSIT_PROGRESS: &str = "TRANSIT_PROGRESS";
    pub const MOVEMENT_BLOCKED: &str = "MOVEMENT_BLOCKED";
    pub const UNIT_ENGAGED: &str = "UNIT_ENGAGED";
    pub const UNIT_OBSERVED: &str = "UNIT_OBSERVED";
    pub const NAVAL_POSITION_SET: &str = "NAVAL_POSITION_SET";
    pub const NAVAL_TRANSIT_PROGRESS: &str = "NAVAL_TRANSIT_PROGRESS";
    pub const NAVAL_TRANSIT_COMPLETE: &str = "NAVAL_TRANSIT_COMPLETE";
    pub const NAVAL_WAITING: &str = "NAVAL_WAITING";
}

/// Combat phase (spec.md §4.4).
pub mod combat {
    pub const COMBAT_STARTED: &str = "COMBAT_STARTED";
    pub const COMBAT_ROUND: &str = "COMBAT_ROUND";
    pub const COMBAT_ENDED: &str = "COMBAT_ENDED";
    pub const RETREAT: &str = "RETREAT";
    pub const TERRITORY_CAPTURED: &str = "TERRITORY_CAPTURED";
    pub const BUILDING_COMBAT_DAMAGE: &str = "BUILDING_COMBAT_DAMAGE";
}

/// Resource collection phase (spec.md §4.5).
pub mod resource_collection {
    pub const CHARACTER_PRODUCTION: &str = "CHARACTER_PRODUCTION";
    pub const FACTION_TERRITORY_PRODUCTION: &str = "FACTION_TERRITORY_PRODUCTION";
}

/// Resource transfer phase (spec.md §4.6).
pub mod resource_transfer {
    pub const TRANSFER_CANCELLED: &str = "TRANSFER_CANCELLED";
    pub const RESOURCE_TRANSFER_SUCCESS: &str = "RESOURCE_TRANSFER_SUCCESS";
    pub const RESOURCE_TRANSFER_PARTIAL: &str = "RESOURCE_TRANSFER_PARTIAL";
    pub const RESOURCE_TRANSFER_FAILED: &str = "RESOURCE_TRANSFER_FAILED";
}

/// Encirclement phase (spec.md §4.7).
pub mod encirclement {
    pub const UNIT_ENCIRCLED: &str = "UNIT_ENCIRCLED";
}

/// Upkeep phase (spec.md §4.8).
pub mod upkeep {
    pub const FACTION_SPENDING: &str = "FACTION_SPENDING";
    pub const FACTION_SPENDING_PARTIAL: &str = "FACTION_SPENDING_PARTIAL";
    pub const BUILDING_UPKEEP_PAID: &str = "BUILDING_UPKEEP_PAID";
    pub const BUILDING_UPKEEP_DEFICIT: &str = "BUILDING_UPKEEP_DEFICIT";
    pub const UPKEEP_ENCIRCLED: &str = "UPKEEP_ENCIRCLED";
    pub const FACTION_UPKEEP_ENCIRCLED: &str = "FACTION_UPKEEP_ENCIRCLED";
    pub const UPKEEP_DEFICIT: &str = "UPKEEP_DEFICIT";
    pub const FACTION_UPKEEP_DEFICIT: &str = "FACTION_UPKEEP_DEFICIT";
    pub const UPKEEP_SUMMARY: &str = "UPKEEP_SUMMARY";
    pub const FACTION_UPKEEP_SUMMARY: &str = "FACTION_UPKEEP_SUMMARY";
    pub const UPKEEP_TOTAL_DEFICIT: &str = "UPKEEP_TOTAL_DEFICIT";
    pub const FACTION_UPKEEP_TOTAL_DEFICIT: &str = "FACTION_UPKEEP_TOTAL_DEFICIT";
}

/// Organization phase (spec.md §4.9).
pub mod organization {
    pub const UNIT_DISBANDED: &str = "UNIT_DISBANDED";
    pub const BUILDING_DESTROYED: &str = "BUILDING_DESTROYED";
    pub const ORG_RECOVERY: &str = "ORG_RECOVERY";
}

/// Construction phase (spec.md §4.10).
pub mod construction {
    pub const UNIT_MOBILIZED: &str = "UNIT_MOBILIZED";
    pub const BUILDING_CONSTRUCTED: &str = "BUILDING_CONSTRUCTED";
    pub const MOBILIZATION_FAILED: &str = "MOBILIZATION_FAILED";
    pub const CONSTRUCTION_FAILED: &str = "CONSTRUCTION_FAILED";
}
