//! Core entity structs for the wargame turn-resolution engine (spec.md §3).
//!
//! Ownership is modeled with the tagged [`Owner`] union rather than
//! nullable twin columns (spec.md §9 "Dynamic row mapping"): a value that
//! would be `controller_character_id XOR controller_faction_id` in the
//! source schema is `Option<Owner>` here, so "both columns set" and
//! "neither set but code assumes one" are unrepresentable.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{
    AllianceStatus, BuildingStatus, MovementAction, OrderStatus, OrderType, Owner,
    PermissionType, Phase, ProductType, Resource, UnitStatus, WarSide,
};
use crate::ids::{
    BuildingPk, CharacterId, FactionId, GuildId, OrderId, TaskId, TerritoryKey, TerritoryPk,
    UnitKey, UnitPk, WarId,
};

/// A single game instance. All other entities carry a `guild_id` and are
/// never queried across guilds (spec.md §3 Guild invariant).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guild {
    pub id: GuildId,
    pub current_turn: u32,
    pub max_movement_stat: u32,
}

/// A player-controlled persona. May hold membership in many factions but
/// represents exactly one at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: CharacterId,
    pub guild_id: GuildId,
    pub identifier: String,
    pub user_id: Option<String>,
    pub represented_faction_id: Option<FactionId>,
    pub representation_changed_turn: Option<u32>,
    pub victory_points: u32,
    pub production: ResourceMap,
}

/// A faction (player organization). The leader must also hold a
/// [`FactionMember`] row (spec.md §3 Faction invariant).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Faction {
    pub id: FactionId,
    pub guild_id: GuildId,
    pub faction_id: String,
    pub leader_character_id: Option<CharacterId>,
    pub nation: Option<String>,
    pub created_turn: u32,
    pub starting_territory_count: u32,
    pub spending: ResourceMap,
}

/// Membership of a character in a faction, unique per `(faction_id,
/// character_id, guild_id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactionMember {
    pub faction_id: FactionId,
    pub character_id: CharacterId,
    pub joined_turn: u32,
    pub guild_id: GuildId,
}

/// A permission grant. The faction leader implicitly holds every
/// permission type without a row existing (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactionPermission {
    pub faction_id: FactionId,
    pub character_id: CharacterId,
    pub permission_type: PermissionType,
    pub guild_id: GuildId,
}

/// A bilateral alliance between two factions, stored canonically with the
/// lower [`FactionId`] first so `(a, b)` and `(b, a)` never both exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alliance {
    pub faction_a_id: FactionId,
    pub faction_b_id: FactionId,
    pub status: AllianceStatus,
    pub initiated_by_faction_id: FactionId,
    pub created_at: DateTime<Utc>,
    pub activated_at: Option<DateTime<Utc>>,
    pub guild_id: GuildId,
}

impl Alliance {
    /// Build the canonical `(lower, higher)` pair for a proposed alliance.
    #[must_use]
    pub fn canonical_pair(a: FactionId, b: FactionId) -> (FactionId, FactionId) {
        if a.into_inner() <= b.into_inner() {
            (a, b)
        } else {
            (b, a)
        }
    }
}

/// A declared war between two coalitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct War {
    pub id: WarId,
    pub guild_id: GuildId,
    pub war_id: String,
    pub objective: Option<String>,
    pub declared_turn: u32,
}

/// A faction's membership on one side of a [`War`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarParticipant {
    pub war_id: WarId,
    pub faction_id: FactionId,
    pub side: WarSide,
    pub joined_turn: u32,
    pub is_original_declarer: bool,
}

/// Terrain kind, used by the terrain-cost table (spec.md §9 "Terrain cost
/// vs. tick budget"). Water excludes a territory from land encirclement
/// reachability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerrainType {
    Plains,
    Forest,
    Hills,
    Mountains,
    Swamp,
    Desert,
    Water,
}

impl TerrainType {
    /// True for `Water` -- excluded from land movement and encirclement
    /// traversal (spec.md §4.7).
    #[must_use]
    pub const fn is_water(self) -> bool {
        matches!(self, TerrainType::Water)
    }

    /// Movement point cost to enter a territory of this terrain. One
    /// territory step per tick is the minimal sufficient semantics per
    /// spec.md §9; costlier terrain consumes more of the tick budget.
    #[must_use]
    pub const fn movement_cost(self) -> u32 {
        match self {
            TerrainType::Plains | TerrainType::Water => 1,
            TerrainType::Forest | TerrainType::Desert => 2,
            TerrainType::Hills | TerrainType::Swamp => 2,
            TerrainType::Mountains => 3,
        }
    }
}

/// A map location. Controlled by at most one character or faction at a
/// time (spec.md §3 Territory invariant).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Territory {
    pub id: TerritoryPk,
    pub guild_id: GuildId,
    pub territory_id: TerritoryKey,
    pub name: String,
    pub terrain_type: TerrainType,
    pub production: ResourceMap,
    pub victory_points: u32,
    pub controller: Option<Owner>,
    pub original_nation: Option<String>,
    /// Territories flagged `sacred-land` are skipped during territory
    /// production (spec.md §4.5 step 2).
    pub sacred_land: bool,
}

/// An unordered adjacency edge between two territories, stored canonically
/// (lower key first) so `{a, b}` is represented once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerritoryAdjacency {
    pub guild_id: GuildId,
    pub a: TerritoryKey,
    pub b: TerritoryKey,
}

/// The static stat block for a unit type, shared (or nation-specific) and
/// unique per `(type_id, nation, guild_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitType {
    pub type_id: String,
    pub guild_id: GuildId,
    pub nation: Option<String>,
    pub movement: u32,
    pub organization_max: u32,
    pub attack: u32,
    pub defense: u32,
    pub siege_attack: u32,
    pub siege_defense: u32,
    pub costs: ResourceMap,
    pub upkeep: ResourceMap,
    pub is_naval: bool,
}

/// A fielded unit. Owned by exactly one character or one faction while
/// `ACTIVE` (spec.md §3 Unit invariant).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitPk,
    pub guild_id: GuildId,
    pub unit_id: UnitKey,
    pub type_id: String,
    pub owner: Option<Owner>,
    pub commander_character_id: Option<CharacterId>,
    pub faction_id: Option<FactionId>,
    pub current_territory_id: Option<TerritoryKey>,
    pub organization: i32,
    pub max_organization: u32,
    pub status: UnitStatus,
    pub is_naval: bool,
}

impl Unit {
    /// The unit's home faction: its own `faction_id` if set, else its
    /// owning character's represented faction (spec.md §4.7).
    #[must_use]
    pub fn home_faction(&self, owner_represented_faction: Option<FactionId>) -> Option<FactionId> {
        self.faction_id.or(owner_represented_faction)
    }
}

/// One row of a naval unit's ordered territory sequence. The only entity
/// with ordered multi-row state (spec.md §9 "Naval unit positions");
/// queried both as "territories for unit" (ordered by `position_index`)
/// and "units in territory".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavalUnitPosition {
    pub unit_id: UnitPk,
    pub territory_id: TerritoryKey,
    pub position_index: u32,
    pub guild_id: GuildId,
}

/// The static stat block for a building type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingType {
    pub type_id: String,
    pub guild_id: GuildId,
    pub costs: ResourceMap,
    pub upkeep: ResourceMap,
}

/// A constructed building. `durability` may transiently go non-positive
/// between Upkeep and Organization (spec.md §9 "Durability sign"); the
/// `ACTIVE ⇒ durability > 0` invariant only binds at phase-boundary exits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub id: BuildingPk,
    pub guild_id: GuildId,
    pub building_id: String,
    pub building_type: String,
    pub territory_id: Option<TerritoryKey>,
    pub durability: i32,
    pub status: BuildingStatus,
    pub upkeep: ResourceMap,
}

/// A fixed-shape bag of the six resource kinds. Used for production,
/// costs, upkeep, spending, and balances alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceMap {
    pub ore: u64,
    pub lumber: u64,
    pub coal: u64,
    pub rations: u64,
    pub cloth: u64,
    pub platinum: u64,
}

impl ResourceMap {
    /// Read a single resource kind.
    #[must_use]
    pub const fn get(&self, resource: Resource) -> u64 {
        match resource {
            Resource::Ore => self.ore,
            Resource::Lumber => self.lumber,
            Resource::Coal => self.coal,
            Resource::Rations => self.rations,
            Resource::Cloth => self.cloth,
            Resource::Platinum => self.platinum,
        }
    }

    /// Write a single resource kind.
    pub const fn set(&mut self, resource: Resource, value: u64) {
        match resource {
            Resource::Ore => self.ore = value,
            Resource::Lumber => self.lumber = value,
            Resource::Coal => self.coal = value,
            Resource::Rations => self.rations = value,
            Resource::Cloth => self.cloth = value,
            Resource::Platinum => self.platinum = value,
        }
    }

    /// Iterate over `(resource, amount)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (Resource, u64)> + '_ {
        Resource::ALL.into_iter().map(|r| (r, self.get(r)))
    }

    /// True if every resource kind is zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.iter().all(|(_, v)| v == 0)
    }

    /// Render as a `{resource: amount}` JSON map, omitting nothing --
    /// matches the source's always-present keys used by
    /// `_format_resources` in the report layer.
    #[must_use]
    pub fn to_json_map(&self) -> BTreeMap<String, u64> {
        self.iter().map(|(r, v)| (r.as_str().to_owned(), v)).collect()
    }
}

/// Resource balance owned exclusively by one character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerResources {
    pub character_id: CharacterId,
    pub guild_id: GuildId,
    pub balance: ResourceMap,
}

/// Resource balance owned exclusively by one faction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactionResources {
    pub faction_id: FactionId,
    pub guild_id: GuildId,
    pub balance: ResourceMap,
}

/// A queued player order. `order_data`/`result_data` are opaque JSON maps
/// typed per handler (spec.md §6 "Order payload schema").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub guild_id: GuildId,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub priority: u8,
    pub submitted_at: DateTime<Utc>,
    pub character_id: Option<CharacterId>,
    pub submitting_faction_id: Option<FactionId>,
    pub order_data: serde_json::Value,
    pub result_data: Option<serde_json::Value>,
    pub turn_submitted: u32,
    pub updated_at: DateTime<Utc>,
    pub updated_turn: u32,
}

impl Order {
    /// The total ordering within a phase: `(priority, submitted_at, id)`
    /// ascending (spec.md §4.1, §5 "Ordering guarantees").
    #[must_use]
    pub fn sort_key(&self) -> (u8, DateTime<Utc>, i64) {
        (self.priority, self.submitted_at, self.id.into_inner())
    }
}

/// The `order_data` shape for a `UNIT` (movement) order (spec.md §4.3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementOrderData {
    pub action: MovementAction,
    pub unit_ids: Vec<UnitKey>,
    pub path: Vec<TerritoryKey>,
}

/// A scheduled background task (the source's "Hawky" task queue). The
/// source declares `sender_identifier: Option[str]` with a `Option[str]`
/// typo (missing the `al`); nullability here is expressed correctly via
/// Rust's `Option`, matching spec.md §9's guidance to trust the field's
/// *use*, not its declaration, when resolving the ambiguity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledTask {
    pub id: TaskId,
    pub task: String,
    pub recipient_identifier: Option<String>,
    pub sender_identifier: Option<String>,
    pub parameter: Option<String>,
    pub scheduled_time: DateTime<Utc>,
    pub guild_id: GuildId,
}

/// An entity referenced by the source schema but consumed by no phase
/// handler (spec.md §9 Open Questions: "The `SpiritNexus` entity is
/// defined but no phase consumes it"). Carried here for store-level
/// round-tripping only; no phase reads or writes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpiritNexus {
    pub id: i64,
    pub guild_id: GuildId,
    pub territory_id: Option<TerritoryKey>,
    pub charge: i32,
}

// ---------------------------------------------------------------------------
// Herbalism (spec.md §4.11, §3 "Herbalism")
// ---------------------------------------------------------------------------

/// A raw herbalism ingredient, shared across all guilds (no `guild_id`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub item_number: String,
    pub name: String,
    pub primary_chakra: Option<String>,
    pub primary_chakra_strength: Option<i32>,
    pub secondary_chakra: Option<String>,
    pub secondary_chakra_strength: Option<i32>,
    /// Lowercased tag set (`"alcohol"`, `"ingestible"`, `"aromatic"`,
    /// `"salt"`, ...), stored comma-separated in the source schema.
    pub properties: Vec<String>,
}

impl Ingredient {
    /// Case-insensitive membership test against [`Self::properties`].
    #[must_use]
    pub fn has_property(&self, name: &str) -> bool {
        self.properties.iter().any(|p| p.eq_ignore_ascii_case(name))
    }
}

/// A finished herbalism product, keyed by `(item_number, product_type)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub item_number: String,
    pub name: String,
    pub product_type: ProductType,
}

/// A recipe matching by ingredient subset (spec.md §4.11 step 4).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubsetRecipe {
    pub id: i64,
    pub product_item_number: String,
    pub product_type: ProductType,
    pub quantity_produced: u32,
    /// Sorted descending, matching the store's canonical representation.
    pub ingredients: Vec<String>,
}

/// A recipe matching by chakra/tier constraints and optional wildcard
/// ingredient patterns (spec.md §4.11 step 6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintRecipe {
    pub id: i64,
    pub product_item_number: String,
    pub product_type: ProductType,
    pub quantity_produced: u32,
    pub ingredients: Option<Vec<String>>,
    pub primary_chakra: Option<String>,
    pub primary_is_boon: Option<crate::enums::ChakraValence>,
    pub secondary_chakra: Option<String>,
    pub secondary_is_boon: Option<crate::enums::ChakraValence>,
    pub tier: Option<u8>,
    pub created_at: DateTime<Utc>,
}

/// Maps a product type to its "ruined" fallback product (spec.md §4.11
/// step 7).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedBlend {
    pub product_item_number: String,
    pub product_type: ProductType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_map_round_trips_through_get_set() {
        let mut map = ResourceMap::default();
        map.set(Resource::Ore, 5);
        assert_eq!(map.get(Resource::Ore), 5);
        assert_eq!(map.get(Resource::Lumber), 0);
        assert!(!map.is_empty());
    }

    #[test]
    fn resource_map_empty_by_default() {
        assert!(ResourceMap::default().is_empty());
    }

    #[test]
    fn alliance_canonical_pair_is_order_independent() {
        let a = FactionId::new(5);
        let b = FactionId::new(2);
        assert_eq!(
            Alliance::canonical_pair(a, b),
            Alliance::canonical_pair(b, a)
        );
    }

    #[test]
    fn ingredient_property_lookup_is_case_insensitive() {
        let ing = Ingredient {
            item_number: "5111".to_owned(),
            name: "Test".to_owned(),
            primary_chakra: None,
            primary_chakra_strength: None,
            secondary_chakra: None,
            secondary_chakra_strength: None,
            properties: vec!["Ingestible".to_owned()],
        };
        assert!(ing.has_property("ingestible"));
        assert!(!ing.has_property("alcohol"));
    }

    #[test]
    fn terrain_water_excludes_land_traversal() {
        assert!(TerrainType::Water.is_water());
        assert!(!TerrainType::Plains.is_water());
    }
}
