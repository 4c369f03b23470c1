//! The [`Store`] trait: a typed repository over every persistent table
//! touched by turn resolution (spec.md §2 "Store", §3 "Data Model").
//!
//! Phase handlers in `wargame-orders` and the turn engine in
//! `wargame-core` are generic over `&dyn Store` (or `impl Store`) so they
//! can run against [`crate::pg_store::PgStore`] in production and
//! [`crate::memory::InMemoryStore`] in tests without a live database.

use chrono::{DateTime, Utc};
use wargame_events::Event;
use wargame_types::{
    Alliance, Building, Character, Faction, FactionMember, FactionPermission,
    FactionResources, Guild, NavalUnitPosition, Order, Phase, PlayerResources, ScheduledTask,
    Territory, TerritoryAdjacency, Unit, War, WarParticipant,
};
use wargame_types::ids::{
    BuildingPk, CharacterId, FactionId, GuildId, OrderId, TaskId, TerritoryKey, UnitKey, UnitPk,
    WarId,
};

use crate::error::StoreError;
use crate::rules::RuleTables;

/// A typed repository over the wargame engine's persistent tables.
///
/// Every method takes or derives a `guild_id` explicitly: the store never
/// queries across guilds (spec.md §3 Guild invariant, §5 per-guild
/// isolation). Implementors need not be internally locked -- single-guild
/// turn resolution is single-threaded (spec.md §5 "Scheduling model");
/// cross-cutting tables (Alliance, WarParticipant) rely on row-level
/// locking at the database layer, not on this trait's API shape.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    /// Fetch a guild's row, including `current_turn`.
    async fn fetch_guild(&self, guild_id: GuildId) -> Result<Option<Guild>, StoreError>;

    /// Advance `current_turn` by one and return the new value. Called once,
    /// after a turn commits successfully (spec.md §2.6 "Turn Engine").
    async fn advance_turn(&self, guild_id: GuildId) -> Result<u32, StoreError>;

    /// Fetch a character by internal id.
    async fn fetch_character(&self, id: CharacterId) -> Result<Option<Character>, StoreError>;

    /// Insert or update a character row.
    async fn upsert_character(&self, character: &Character) -> Result<(), StoreError>;

    /// All characters in a guild.
    async fn list_characters(&self, guild_id: GuildId) -> Result<Vec<Character>, StoreError>;

    /// Fetch a faction by internal id.
    async fn fetch_faction(&self, id: FactionId) -> Result<Option<Faction>, StoreError>;

    /// Insert or update a faction row.
    async fn upsert_faction(&self, faction: &Faction) -> Result<(), StoreError>;

    /// All factions in a guild.
    async fn list_factions(&self, guild_id: GuildId) -> Result<Vec<Faction>, StoreError>;

    /// All territories in a guild, for loading rule tables and for phase
    /// handlers that need the full map (Encirclement's reachability BFS).
    async fn list_territories(&self, guild_id: GuildId) -> Result<Vec<Territory>, StoreError>;

    /// Fetch one territory by its business key.
    async fn fetch_territory(
        &self,
        guild_id: GuildId,
        territory_id: &TerritoryKey,
    ) -> Result<Option<Territory>, StoreError>;

    /// Insert or update a territory row (controller changes, production
    /// edits from admin CRUD).
    async fn upsert_territory(&self, territory: &Territory) -> Result<(), StoreError>;

    /// All adjacency edges in a guild, for building the
    /// [`wargame_world::AdjacencyGraph`].
    async fn list_adjacencies(&self, guild_id: GuildId) -> Result<Vec<TerritoryAdjacency>, StoreError>;

    /// All units in a guild.
    async fn list_units(&self, guild_id: GuildId) -> Result<Vec<Unit>, StoreError>;

    /// Fetch a single unit by internal id.
    async fn fetch_unit(&self, id: UnitPk) -> Result<Option<Unit>, StoreError>;

    /// Fetch a single unit by its business key, scoped to a guild.
    async fn fetch_unit_by_key(
        &self,
        guild_id: GuildId,
        unit_id: &UnitKey,
    ) -> Result<Option<Unit>, StoreError>;

    /// Insert or update a unit row (position, organization, status).
    async fn upsert_unit(&self, unit: &Unit) -> Result<(), StoreError>;

    /// Insert a newly mobilized unit, returning its assigned internal id
    /// (spec.md §4.10 Construction: MOBILIZATION creates a `Unit` the
    /// store has never seen before, unlike `upsert_unit`'s update path).
    async fn insert_unit(&self, unit: &Unit) -> Result<UnitPk, StoreError>;

    /// All buildings in a guild.
    async fn list_buildings(&self, guild_id: GuildId) -> Result<Vec<Building>, StoreError>;

    /// Insert or update a building row (durability, status).
    async fn upsert_building(&self, building: &Building) -> Result<(), StoreError>;

    /// Insert a newly constructed building, returning its assigned
    /// internal id (spec.md §4.10 Construction: CONSTRUCTION creates a
    /// `Building` the store has never seen before).
    async fn insert_building(&self, building: &Building) -> Result<BuildingPk, StoreError>;

    /// Fetch a building by internal id.
    async fn fetch_building(&self, id: BuildingPk) -> Result<Option<Building>, StoreError>;

    /// Fetch a character's resource balance, defaulting to an all-zero
    /// [`wargame_types::ResourceMap`] if the row does not yet exist
    /// (spec.md §3 "all resource counts non-negative" -- absence means
    /// zero, not an error).
    async fn fetch_player_resources(
        &self,
        character_id: CharacterId,
    ) -> Result<PlayerResources, StoreError>;

    /// Insert or update a character's resource balance.
    async fn upsert_player_resources(&self, resources: &PlayerResources) -> Result<(), StoreError>;

    /// Fetch a faction's resource balance, defaulting to all-zero.
    async fn fetch_faction_resources(
        &self,
        faction_id: FactionId,
    ) -> Result<FactionResources, StoreError>;

    /// Insert or update a faction's resource balance.
    async fn upsert_faction_resources(
        &self,
        resources: &FactionResources,
    ) -> Result<(), StoreError>;

    /// Every order of a guild scheduled for `phase`, in any status. The
    /// caller (the turn engine) filters to [`wargame_types::OrderStatus::is_eligible`]
    /// and sorts by [`wargame_types::Order::sort_key`] before dispatch
    /// (spec.md §4.1, §5 "Ordering guarantees").
    async fn list_orders_for_phase(
        &self,
        guild_id: GuildId,
        phase: Phase,
    ) -> Result<Vec<Order>, StoreError>;

    /// Fetch a single order.
    async fn fetch_order(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    /// Insert or update an order row (status, `result_data`, `order_data`
    /// mutation for ONGOING orders).
    async fn upsert_order(&self, order: &Order) -> Result<(), StoreError>;

    /// Append a batch of events, atomically, as the final step of a
    /// committed turn (spec.md §5 "Cancellation and timeouts": if the
    /// turn fails partway, nothing here is called and the transaction
    /// that would have held these rolls back).
    async fn append_events(&self, events: &[Event]) -> Result<(), StoreError>;

    /// Every event logged for a guild, in append order, optionally
    /// restricted to one turn (spec.md §6 "Outputs: Appended `TurnLog`
    /// rows"). The query surface `wargame-api` exposes over this further
    /// filters by `affected_character_ids` client-side, since that list
    /// lives inside `event_data` rather than as an indexed column.
    async fn list_events(&self, guild_id: GuildId, turn: Option<u32>) -> Result<Vec<Event>, StoreError>;

    /// Load every rule table needed by turn resolution for one guild in
    /// one shot (spec.md §2 "Rule Tables: immutable-per-turn caches").
    async fn load_rule_tables(&self, guild_id: GuildId) -> Result<RuleTables, StoreError>;

    /// Insert a new scheduled task.
    async fn insert_task(&self, task: &ScheduledTask) -> Result<TaskId, StoreError>;

    /// Atomically claim and remove the earliest-due task scheduled at or
    /// before `now`, skipping rows already locked by a concurrent claimant
    /// (spec.md §5 "claim-and-delete", grounded in the source's
    /// `HawkyTask.pop_next_task`: `SELECT ... FOR UPDATE SKIP LOCKED` then
    /// `DELETE`). This is the only operation in the store that must be
    /// safe under concurrent callers.
    async fn claim_next_task(&self, now: DateTime<Utc>) -> Result<Option<ScheduledTask>, StoreError>;

    // -- Faction membership & permissions (spec.md §3 FactionMember/FactionPermission,
    //    §4.2 Beginning phase) ------------------------------------------------

    /// Every faction a character holds membership in, within a guild.
    async fn list_memberships_for_character(
        &self,
        guild_id: GuildId,
        character_id: CharacterId,
    ) -> Result<Vec<FactionMember>, StoreError>;

    /// Every member of one faction.
    async fn list_faction_members(
        &self,
        guild_id: GuildId,
        faction_id: FactionId,
    ) -> Result<Vec<FactionMember>, StoreError>;

    /// Insert or update a membership row.
    async fn upsert_faction_member(&self, member: &FactionMember) -> Result<(), StoreError>;

    /// Remove a membership row (spec.md §4.2 LEAVE_FACTION/KICK_FROM_FACTION).
    async fn delete_faction_member(
        &self,
        guild_id: GuildId,
        faction_id: FactionId,
        character_id: CharacterId,
    ) -> Result<(), StoreError>;

    /// Every explicit permission grant for a faction (the leader holds
    /// every permission implicitly without a row; spec.md §3).
    async fn list_permissions(
        &self,
        guild_id: GuildId,
        faction_id: FactionId,
    ) -> Result<Vec<FactionPermission>, StoreError>;

    // -- Alliances & wars (spec.md §3 Alliance/War/WarParticipant,
    //    §4.2 MAKE_ALLIANCE/DISSOLVE_ALLIANCE/DECLARE_WAR) ---------------------

    /// Fetch the canonical alliance row between two factions, if any.
    async fn fetch_alliance(
        &self,
        guild_id: GuildId,
        faction_a_id: FactionId,
        faction_b_id: FactionId,
    ) -> Result<Option<Alliance>, StoreError>;

    /// Every alliance a faction participates in, any status.
    async fn list_alliances_for_faction(
        &self,
        guild_id: GuildId,
        faction_id: FactionId,
    ) -> Result<Vec<Alliance>, StoreError>;

    /// Insert or update an alliance row.
    async fn upsert_alliance(&self, alliance: &Alliance) -> Result<(), StoreError>;

    /// Delete an alliance row (DISSOLVE_ALLIANCE).
    async fn delete_alliance(
        &self,
        guild_id: GuildId,
        faction_a_id: FactionId,
        faction_b_id: FactionId,
    ) -> Result<(), StoreError>;

    /// Insert a new war, returning its assigned internal id.
    async fn insert_war(&self, war: &War) -> Result<WarId, StoreError>;

    /// Every war active in a guild.
    async fn list_wars(&self, guild_id: GuildId) -> Result<Vec<War>, StoreError>;

    /// Every participant row across every war in a guild.
    async fn list_war_participants(&self, guild_id: GuildId) -> Result<Vec<WarParticipant>, StoreError>;

    /// Insert or update a war participant row.
    async fn upsert_war_participant(
        &self,
        guild_id: GuildId,
        participant: &WarParticipant,
    ) -> Result<(), StoreError>;

    // -- Naval positions (spec.md §9 "Naval unit positions") -------------------

    /// The ordered territory sequence for a naval unit, by `position_index`.
    async fn list_naval_positions(
        &self,
        guild_id: GuildId,
        unit_id: UnitPk,
    ) -> Result<Vec<NavalUnitPosition>, StoreError>;

    /// Atomically replace a naval unit's full position sequence: delete all
    /// prior rows, then insert `positions` (spec.md §9 `set_positions`).
    async fn set_naval_positions(
        &self,
        guild_id: GuildId,
        unit_id: UnitPk,
        positions: &[NavalUnitPosition],
    ) -> Result<(), StoreError>;
}
