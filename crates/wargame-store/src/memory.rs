//! An in-memory [`Store`] implementation for tests (spec.md §9 "async/
//! await": a blocking-free double the phase handlers and the turn engine
//! can run against without a live `PostgreSQL` instance).
//!
//! Internals are guarded by a single [`tokio::sync::Mutex`] -- guild turn
//! resolution is single-threaded per guild (spec.md §5 "Scheduling
//! model"), so a coarse lock costs nothing in practice and keeps this
//! double simple to reason about. [`Store::claim_next_task`] is the one
//! operation documented as needing to be safe under concurrent callers;
//! the mutex gives that for free.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use wargame_events::Event;
use wargame_types::ids::{
    BuildingPk, CharacterId, FactionId, GuildId, OrderId, TaskId, TerritoryKey, UnitKey, UnitPk,
    WarId,
};
use wargame_types::{
    Alliance, Building, BuildingType, Character, ConstraintRecipe, Faction, FactionMember,
    FactionPermission, FactionResources, FailedBlend, Guild, NavalUnitPosition, Order, Phase,
    PlayerResources, ScheduledTask, SubsetRecipe, Territory, TerritoryAdjacency, Unit, UnitType,
    War, WarParticipant,
};

use crate::error::StoreError;
use crate::rules::RuleTables;
use crate::traits::Store;

/// Default all-zero balance for a character/faction with no row yet.
fn default_player_resources(character_id: CharacterId, guild_id: GuildId) -> PlayerResources {
    PlayerResources {
        character_id,
        guild_id,
        balance: wargame_types::ResourceMap::default(),
    }
}

fn default_faction_resources(faction_id: FactionId, guild_id: GuildId) -> FactionResources {
    FactionResources {
        faction_id,
        guild_id,
        balance: wargame_types::ResourceMap::default(),
    }
}

/// All tables the in-memory double round-trips, guarded by one mutex.
#[derive(Debug, Default)]
struct State {
    guilds: HashMap<i64, Guild>,
    characters: HashMap<i64, Character>,
    factions: HashMap<i64, Faction>,
    faction_members: Vec<FactionMember>,
    permissions: Vec<FactionPermission>,
    alliances: Vec<Alliance>,
    wars: HashMap<i64, War>,
    war_participants: Vec<WarParticipant>,
    territories: HashMap<(i64, TerritoryKey), Territory>,
    adjacencies: Vec<TerritoryAdjacency>,
    units: HashMap<i64, Unit>,
    naval_positions: HashMap<i64, Vec<NavalUnitPosition>>,
    buildings: HashMap<i64, Building>,
    player_resources: HashMap<i64, PlayerResources>,
    faction_resources: HashMap<i64, FactionResources>,
    orders: HashMap<i64, Order>,
    events: Vec<Event>,
    tasks: Vec<ScheduledTask>,
    unit_types: Vec<UnitType>,
    building_types: Vec<BuildingType>,
    subset_recipes: Vec<SubsetRecipe>,
    constraint_recipes: Vec<ConstraintRecipe>,
    failed_blends: Vec<FailedBlend>,
    next_war_id: i64,
    next_task_id: i64,
}

/// An in-memory [`Store`]. Construct with [`InMemoryStore::new`] and seed
/// rule tables/entities directly through the `seed_*` helpers in test
/// setup; production code uses [`crate::pg_store::PgStore`] instead.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a guild row directly (test setup convenience).
    pub async fn seed_guild(&self, guild: Guild) {
        self.state.lock().await.guilds.insert(guild.id.into_inner(), guild);
    }

    /// Seed a unit type row.
    pub async fn seed_unit_type(&self, unit_type: UnitType) {
        self.state.lock().await.unit_types.push(unit_type);
    }

    /// Seed a building type row.
    pub async fn seed_building_type(&self, building_type: BuildingType) {
        self.state.lock().await.building_types.push(building_type);
    }

    /// Seed a herbalism subset recipe.
    pub async fn seed_subset_recipe(&self, recipe: SubsetRecipe) {
        self.state.lock().await.subset_recipes.push(recipe);
    }

    /// Seed a herbalism constraint recipe.
    pub async fn seed_constraint_recipe(&self, recipe: ConstraintRecipe) {
        self.state.lock().await.constraint_recipes.push(recipe);
    }

    /// Seed a failed-blend fallback mapping.
    pub async fn seed_failed_blend(&self, failed: FailedBlend) {
        self.state.lock().await.failed_blends.push(failed);
    }

    /// Seed a territory adjacency edge (no phase handler ever creates
    /// these at runtime; map topology is admin-CRUD-only, spec.md §1).
    pub async fn seed_adjacency(&self, adjacency: TerritoryAdjacency) {
        self.state.lock().await.adjacencies.push(adjacency);
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn fetch_guild(&self, guild_id: GuildId) -> Result<Option<Guild>, StoreError> {
        Ok(self.state.lock().await.guilds.get(&guild_id.into_inner()).cloned())
    }

    async fn advance_turn(&self, guild_id: GuildId) -> Result<u32, StoreError> {
        let mut state = self.state.lock().await;
        let guild = state
            .guilds
            .get_mut(&guild_id.into_inner())
            .ok_or_else(|| StoreError::NotFound(format!("guild {guild_id}")))?;
        guild.current_turn = guild.current_turn.saturating_add(1);
        Ok(guild.current_turn)
    }

    async fn fetch_character(&self, id: CharacterId) -> Result<Option<Character>, StoreError> {
        Ok(self.state.lock().await.characters.get(&id.into_inner()).cloned())
    }

    async fn upsert_character(&self, character: &Character) -> Result<(), StoreError> {
        self.state
            .lock()
            .await
            .characters
            .insert(character.id.into_inner(), character.clone());
        Ok(())
    }

    async fn list_characters(&self, guild_id: GuildId) -> Result<Vec<Character>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .characters
            .values()
            .filter(|c| c.guild_id == guild_id)
            .cloned()
            .collect())
    }

    async fn fetch_faction(&self, id: FactionId) -> Result<Option<Faction>, StoreError> {
        Ok(self.state.lock().await.factions.get(&id.into_inner()).cloned())
    }

    async fn upsert_faction(&self, faction: &Faction) -> Result<(), StoreError> {
        self.state
            .lock()
            .await
            .factions
            .insert(faction.id.into_inner(), faction.clone());
        Ok(())
    }

    async fn list_factions(&self, guild_id: GuildId) -> Result<Vec<Faction>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .factions
            .values()
            .filter(|f| f.guild_id == guild_id)
            .cloned()
            .collect())
    }

    async fn list_territories(&self, guild_id: GuildId) -> Result<Vec<Territory>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .territories
            .values()
            .filter(|t| t.guild_id == guild_id)
            .cloned()
            .collect())
    }

    async fn fetch_territory(
        &self,
        guild_id: GuildId,
        territory_id: &TerritoryKey,
    ) -> Result<Option<Territory>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .territories
            .get(&(guild_id.into_inner(), territory_id.clone()))
            .cloned())
    }

    async fn upsert_territory(&self, territory: &Territory) -> Result<(), StoreError> {
        self.state.lock().await.territories.insert(
            (territory.guild_id.into_inner(), territory.territory_id.clone()),
            territory.clone(),
        );
        Ok(())
    }

    async fn list_adjacencies(
        &self,
        guild_id: GuildId,
    ) -> Result<Vec<TerritoryAdjacency>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .adjacencies
            .iter()
            .filter(|a| a.guild_id == guild_id)
            .cloned()
            .collect())
    }

    async fn list_units(&self, guild_id: GuildId) -> Result<Vec<Unit>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .units
            .values()
            .filter(|u| u.guild_id == guild_id)
            .cloned()
            .collect())
    }

    async fn fetch_unit(&self, id: UnitPk) -> Result<Option<Unit>, StoreError> {
        Ok(self.state.lock().await.units.get(&id.into_inner()).cloned())
    }

    async fn fetch_unit_by_key(
        &self,
        guild_id: GuildId,
        unit_id: &UnitKey,
    ) -> Result<Option<Unit>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .units
            .values()
            .find(|u| u.guild_id == guild_id && &u.unit_id == unit_id)
            .cloned())
    }

    async fn upsert_unit(&self, unit: &Unit) -> Result<(), StoreError> {
        self.state.lock().await.units.insert(unit.id.into_inner(), unit.clone());
        Ok(())
    }

    async fn insert_unit(&self, unit: &Unit) -> Result<UnitPk, StoreError> {
        let mut state = self.state.lock().await;
        let id = UnitPk::new(state.units.keys().max().copied().unwrap_or(0) + 1);
        let mut row = unit.clone();
        row.id = id;
        state.units.insert(id.into_inner(), row);
        Ok(id)
    }

    async fn list_buildings(&self, guild_id: GuildId) -> Result<Vec<Building>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .buildings
            .values()
            .filter(|b| b.guild_id == guild_id)
            .cloned()
            .collect())
    }

    async fn upsert_building(&self, building: &Building) -> Result<(), StoreError> {
        self.state
            .lock()
            .await
            .buildings
            .insert(building.id.into_inner(), building.clone());
        Ok(())
    }

    async fn insert_building(&self, building: &Building) -> Result<BuildingPk, StoreError> {
        let mut state = self.state.lock().await;
        let id = BuildingPk::new(state.buildings.keys().max().copied().unwrap_or(0) + 1);
        let mut row = building.clone();
        row.id = id;
        state.buildings.insert(id.into_inner(), row);
        Ok(id)
    }

    async fn fetch_building(&self, id: BuildingPk) -> Result<Option<Building>, StoreError> {
        Ok(self.state.lock().await.buildings.get(&id.into_inner()).cloned())
    }

    async fn fetch_player_resources(
        &self,
        character_id: CharacterId,
    ) -> Result<PlayerResources, StoreError> {
        let state = self.state.lock().await;
        let guild_id = state
            .characters
            .get(&character_id.into_inner())
            .map_or(GuildId::new(0), |c| c.guild_id);
        Ok(state
            .player_resources
            .get(&character_id.into_inner())
            .cloned()
            .unwrap_or_else(|| default_player_resources(character_id, guild_id)))
    }

    async fn upsert_player_resources(&self, resources: &PlayerResources) -> Result<(), StoreError> {
        self.state
            .lock()
            .await
            .player_resources
            .insert(resources.character_id.into_inner(), *resources);
        Ok(())
    }

    async fn fetch_faction_resources(
        &self,
        faction_id: FactionId,
    ) -> Result<FactionResources, StoreError> {
        let state = self.state.lock().await;
        let guild_id = state
            .factions
            .get(&faction_id.into_inner())
            .map_or(GuildId::new(0), |f| f.guild_id);
        Ok(state
            .faction_resources
            .get(&faction_id.into_inner())
            .cloned()
            .unwrap_or_else(|| default_faction_resources(faction_id, guild_id)))
    }

    async fn upsert_faction_resources(
        &self,
        resources: &FactionResources,
    ) -> Result<(), StoreError> {
        self.state
            .lock()
            .await
            .faction_resources
            .insert(resources.faction_id.into_inner(), *resources);
        Ok(())
    }

    async fn list_orders_for_phase(
        &self,
        guild_id: GuildId,
        phase: Phase,
    ) -> Result<Vec<Order>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .orders
            .values()
            .filter(|o| o.guild_id == guild_id && o.order_type.phase() == phase)
            .cloned()
            .collect())
    }

    async fn fetch_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.state.lock().await.orders.get(&id.into_inner()).cloned())
    }

    async fn upsert_order(&self, order: &Order) -> Result<(), StoreError> {
        self.state.lock().await.orders.insert(order.id.into_inner(), order.clone());
        Ok(())
    }

    async fn append_events(&self, events: &[Event]) -> Result<(), StoreError> {
        self.state.lock().await.events.extend_from_slice(events);
        Ok(())
    }

    async fn list_events(&self, guild_id: GuildId, turn: Option<u32>) -> Result<Vec<Event>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .events
            .iter()
            .filter(|e| e.guild_id == guild_id && turn.is_none_or(|t| e.turn_number == t))
            .cloned()
            .collect())
    }

    async fn load_rule_tables(&self, guild_id: GuildId) -> Result<RuleTables, StoreError> {
        let state = self.state.lock().await;
        Ok(RuleTables {
            unit_types: state
                .unit_types
                .iter()
                .filter(|t| t.guild_id == guild_id)
                .cloned()
                .collect(),
            building_types: state
                .building_types
                .iter()
                .filter(|t| t.guild_id == guild_id)
                .cloned()
                .collect(),
            adjacencies: state
                .adjacencies
                .iter()
                .filter(|a| a.guild_id == guild_id)
                .cloned()
                .collect(),
            subset_recipes: state.subset_recipes.clone(),
            constraint_recipes: state.constraint_recipes.clone(),
            failed_blends: state.failed_blends.clone(),
        })
    }

    async fn insert_task(&self, task: &ScheduledTask) -> Result<TaskId, StoreError> {
        let mut state = self.state.lock().await;
        state.next_task_id = state.next_task_id.saturating_add(1);
        let id = TaskId::new(state.next_task_id);
        let mut row = task.clone();
        row.id = id;
        state.tasks.push(row);
        Ok(id)
    }

    async fn claim_next_task(&self, now: DateTime<Utc>) -> Result<Option<ScheduledTask>, StoreError> {
        let mut state = self.state.lock().await;
        let index = state
            .tasks
            .iter()
            .enumerate()
            .filter(|(_, t)| t.scheduled_time <= now)
            .min_by_key(|(_, t)| t.scheduled_time)
            .map(|(index, _)| index);
        Ok(index.map(|index| state.tasks.remove(index)))
    }

    async fn list_memberships_for_character(
        &self,
        guild_id: GuildId,
        character_id: CharacterId,
    ) -> Result<Vec<FactionMember>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .faction_members
            .iter()
            .filter(|m| m.guild_id == guild_id && m.character_id == character_id)
            .copied()
            .collect())
    }

    async fn list_faction_members(
        &self,
        guild_id: GuildId,
        faction_id: FactionId,
    ) -> Result<Vec<FactionMember>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .faction_members
            .iter()
            .filter(|m| m.guild_id == guild_id && m.faction_id == faction_id)
            .copied()
            .collect())
    }

    async fn upsert_faction_member(&self, member: &FactionMember) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.faction_members.retain(|m| {
            !(m.guild_id == member.guild_id
                && m.faction_id == member.faction_id
                && m.character_id == member.character_id)
        });
        state.faction_members.push(*member);
        Ok(())
    }

    async fn delete_faction_member(
        &self,
        guild_id: GuildId,
        faction_id: FactionId,
        character_id: CharacterId,
    ) -> Result<(), StoreError> {
        self.state.lock().await.faction_members.retain(|m| {
            !(m.guild_id == guild_id && m.faction_id == faction_id && m.character_id == character_id)
        });
        Ok(())
    }

    async fn list_permissions(
        &self,
        guild_id: GuildId,
        faction_id: FactionId,
    ) -> Result<Vec<FactionPermission>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .permissions
            .iter()
            .filter(|p| p.guild_id == guild_id && p.faction_id == faction_id)
            .copied()
            .collect())
    }

    async fn fetch_alliance(
        &self,
        guild_id: GuildId,
        faction_a_id: FactionId,
        faction_b_id: FactionId,
    ) -> Result<Option<Alliance>, StoreError> {
        let (a, b) = Alliance::canonical_pair(faction_a_id, faction_b_id);
        Ok(self
            .state
            .lock()
            .await
            .alliances
            .iter()
            .find(|al| al.guild_id == guild_id && al.faction_a_id == a && al.faction_b_id == b)
            .cloned())
    }

    async fn list_alliances_for_faction(
        &self,
        guild_id: GuildId,
        faction_id: FactionId,
    ) -> Result<Vec<Alliance>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .alliances
            .iter()
            .filter(|al| {
                al.guild_id == guild_id
                    && (al.faction_a_id == faction_id || al.faction_b_id == faction_id)
            })
            .cloned()
            .collect())
    }

    async fn upsert_alliance(&self, alliance: &Alliance) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.alliances.retain(|al| {
            !(al.guild_id == alliance.guild_id
                && al.faction_a_id == alliance.faction_a_id
                && al.faction_b_id == alliance.faction_b_id)
        });
        state.alliances.push(alliance.clone());
        Ok(())
    }

    async fn delete_alliance(
        &self,
        guild_id: GuildId,
        faction_a_id: FactionId,
        faction_b_id: FactionId,
    ) -> Result<(), StoreError> {
        let (a, b) = Alliance::canonical_pair(faction_a_id, faction_b_id);
        self.state
            .lock()
            .await
            .alliances
            .retain(|al| !(al.guild_id == guild_id && al.faction_a_id == a && al.faction_b_id == b));
        Ok(())
    }

    async fn insert_war(&self, war: &War) -> Result<WarId, StoreError> {
        let mut state = self.state.lock().await;
        state.next_war_id = state.next_war_id.saturating_add(1);
        let id = WarId::new(state.next_war_id);
        let mut row = war.clone();
        row.id = id;
        state.wars.insert(id.into_inner(), row);
        Ok(id)
    }

    async fn list_wars(&self, guild_id: GuildId) -> Result<Vec<War>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .wars
            .values()
            .filter(|w| w.guild_id == guild_id)
            .cloned()
            .collect())
    }

    async fn list_war_participants(&self, guild_id: GuildId) -> Result<Vec<WarParticipant>, StoreError> {
        let state = self.state.lock().await;
        let war_ids: std::collections::HashSet<i64> = state
            .wars
            .values()
            .filter(|w| w.guild_id == guild_id)
            .map(|w| w.id.into_inner())
            .collect();
        Ok(state
            .war_participants
            .iter()
            .filter(|p| war_ids.contains(&p.war_id.into_inner()))
            .copied()
            .collect())
    }

    async fn upsert_war_participant(
        &self,
        _guild_id: GuildId,
        participant: &WarParticipant,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state
            .war_participants
            .retain(|p| !(p.war_id == participant.war_id && p.faction_id == participant.faction_id));
        state.war_participants.push(*participant);
        Ok(())
    }

    async fn list_naval_positions(
        &self,
        _guild_id: GuildId,
        unit_id: UnitPk,
    ) -> Result<Vec<NavalUnitPosition>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .naval_positions
            .get(&unit_id.into_inner())
            .cloned()
            .unwrap_or_default())
    }

    async fn set_naval_positions(
        &self,
        _guild_id: GuildId,
        unit_id: UnitPk,
        positions: &[NavalUnitPosition],
    ) -> Result<(), StoreError> {
        self.state
            .lock()
            .await
            .naval_positions
            .insert(unit_id.into_inner(), positions.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wargame_types::OrderStatus;

    #[tokio::test]
    async fn advance_turn_increments_and_persists() {
        let store = InMemoryStore::new();
        store
            .seed_guild(Guild { id: GuildId::new(1), current_turn: 0, max_movement_stat: 6 })
            .await;
        let new_turn = store.advance_turn(GuildId::new(1)).await.expect("advance");
        assert_eq!(new_turn, 1);
        let guild = store.fetch_guild(GuildId::new(1)).await.expect("fetch").expect("present");
        assert_eq!(guild.current_turn, 1);
    }

    #[tokio::test]
    async fn player_resources_default_to_zero_when_absent() {
        let store = InMemoryStore::new();
        let balance = store
            .fetch_player_resources(CharacterId::new(42))
            .await
            .expect("fetch");
        assert!(balance.balance.is_empty());
    }

    #[tokio::test]
    async fn claim_next_task_is_atomic_and_removes_the_row() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let task = ScheduledTask {
            id: TaskId::new(0),
            task: "remind".to_owned(),
            recipient_identifier: Some("char-1".to_owned()),
            sender_identifier: None,
            parameter: None,
            scheduled_time: now,
            guild_id: GuildId::new(1),
        };
        store.insert_task(&task).await.expect("insert");
        let claimed = store.claim_next_task(now).await.expect("claim").expect("present");
        assert_eq!(claimed.task, "remind");
        assert!(store.claim_next_task(now).await.expect("claim").is_none());
    }

    #[tokio::test]
    async fn faction_member_upsert_replaces_existing_row() {
        let store = InMemoryStore::new();
        let member = FactionMember {
            faction_id: FactionId::new(1),
            character_id: CharacterId::new(1),
            joined_turn: 1,
            guild_id: GuildId::new(1),
        };
        store.upsert_faction_member(&member).await.expect("upsert");
        let mut updated = member;
        updated.joined_turn = 2;
        store.upsert_faction_member(&updated).await.expect("upsert");
        let members = store
            .list_faction_members(GuildId::new(1), FactionId::new(1))
            .await
            .expect("list");
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].joined_turn, 2);
    }

    #[tokio::test]
    async fn orders_filter_by_routed_phase() {
        let store = InMemoryStore::new();
        let order = Order {
            id: OrderId::new(1),
            guild_id: GuildId::new(1),
            order_type: wargame_types::OrderType::JoinFaction,
            status: OrderStatus::Pending,
            priority: 1,
            submitted_at: Utc::now(),
            character_id: Some(CharacterId::new(1)),
            submitting_faction_id: None,
            order_data: serde_json::json!({}),
            result_data: None,
            turn_submitted: 1,
            updated_at: Utc::now(),
            updated_turn: 1,
        };
        store.upsert_order(&order).await.expect("upsert");
        let beginning = store
            .list_orders_for_phase(GuildId::new(1), Phase::Beginning)
            .await
            .expect("list");
        assert_eq!(beginning.len(), 1);
        let movement = store
            .list_orders_for_phase(GuildId::new(1), Phase::Movement)
            .await
            .expect("list");
        assert!(movement.is_empty());
    }
}
