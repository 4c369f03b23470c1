//! The `PostgreSQL`-backed [`Store`] implementation.
//!
//! Queries are built at runtime with [`sqlx::query`]/[`sqlx::query_as`]
//! rather than the `query!` macro family, so the workspace builds without
//! a live database (spec.md §2.1 "Store"; mirrors the teacher's
//! `postgres.rs` doc comment on avoiding compile-time query checking).
//! Owner columns are read back from the schema's nullable
//! `*_character_id`/`*_faction_id` twin columns and reassembled into the
//! tagged [`wargame_types::Owner`] union at this boundary -- the one
//! place the translation from spec.md §9's "Dynamic row mapping" note
//! has to happen, since the relational schema itself still needs two
//! nullable columns to express an XOR constraint.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use wargame_events::Event;
use wargame_types::ids::{
    BuildingPk, CharacterId, FactionId, GuildId, OrderId, TaskId, TerritoryKey, UnitKey, UnitPk,
    WarId,
};
use wargame_types::{
    Alliance, Building, BuildingStatus, BuildingType, Character, ConstraintRecipe, Faction,
    FactionMember, FactionPermission, FactionResources, FailedBlend, Guild, NavalUnitPosition,
    Order, OrderStatus, Owner, Phase, PlayerResources, ResourceMap, ScheduledTask, SubsetRecipe,
    TerrainType, Territory, TerritoryAdjacency, Unit, UnitStatus, UnitType, War, WarParticipant,
};

use crate::error::StoreError;
use crate::postgres::PostgresPool;
use crate::rules::RuleTables;
use crate::traits::Store;

/// A [`Store`] backed by a live `PostgreSQL` pool.
pub struct PgStore {
    pool: PostgresPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PostgresPool) -> Self {
        Self { pool }
    }
}

/// Reassemble an `Option<Owner>` from the schema's nullable twin columns.
/// Both set or a malformed row is an integrity fault (spec.md §7), not
/// silently resolved -- callers surface it via [`StoreError::InvariantViolation`].
fn owner_from_columns(
    character_id: Option<i64>,
    faction_id: Option<i64>,
) -> Result<Option<Owner>, StoreError> {
    match (character_id, faction_id) {
        (Some(_), Some(_)) => Err(StoreError::InvariantViolation(
            "row has both owner_character_id and owner_faction_id set".to_owned(),
        )),
        (Some(c), None) => Ok(Some(Owner::Character(CharacterId::new(c)))),
        (None, Some(f)) => Ok(Some(Owner::Faction(FactionId::new(f)))),
        (None, None) => Ok(None),
    }
}

fn owner_to_columns(owner: Option<Owner>) -> (Option<i64>, Option<i64>) {
    match owner {
        Some(Owner::Character(id)) => (Some(id.into_inner()), None),
        Some(Owner::Faction(id)) => (None, Some(id.into_inner())),
        None => (None, None),
    }
}

fn resource_map_from_json(value: serde_json::Value) -> ResourceMap {
    serde_json::from_value(value).unwrap_or_default()
}

#[async_trait]
impl Store for PgStore {
    async fn fetch_guild(&self, guild_id: GuildId) -> Result<Option<Guild>, StoreError> {
        let row = sqlx::query("SELECT id, current_turn, max_movement_stat FROM guilds WHERE id = $1")
            .bind(guild_id.into_inner())
            .fetch_optional(self.pool.pool())
            .await?;
        Ok(row.map(|r| Guild {
            id: GuildId::new(r.get("id")),
            #[allow(clippy::cast_sign_loss)]
            current_turn: r.get::<i64, _>("current_turn") as u32,
            #[allow(clippy::cast_sign_loss)]
            max_movement_stat: r.get::<i64, _>("max_movement_stat") as u32,
        }))
    }

    async fn advance_turn(&self, guild_id: GuildId) -> Result<u32, StoreError> {
        let row = sqlx::query(
            "UPDATE guilds SET current_turn = current_turn + 1 WHERE id = $1 RETURNING current_turn",
        )
        .bind(guild_id.into_inner())
        .fetch_one(self.pool.pool())
        .await?;
        #[allow(clippy::cast_sign_loss)]
        Ok(row.get::<i64, _>("current_turn") as u32)
    }

    async fn fetch_character(&self, id: CharacterId) -> Result<Option<Character>, StoreError> {
        let row = sqlx::query(
            "SELECT id, guild_id, identifier, user_id, represented_faction_id, \
             representation_changed_turn, victory_points, production FROM characters WHERE id = $1",
        )
        .bind(id.into_inner())
        .fetch_optional(self.pool.pool())
        .await?;
        Ok(row.map(|r| Character {
            id: CharacterId::new(r.get("id")),
            guild_id: GuildId::new(r.get("guild_id")),
            identifier: r.get("identifier"),
            user_id: r.get("user_id"),
            represented_faction_id: r
                .get::<Option<i64>, _>("represented_faction_id")
                .map(FactionId::new),
            #[allow(clippy::cast_sign_loss)]
            representation_changed_turn: r
                .get::<Option<i64>, _>("representation_changed_turn")
                .map(|v| v as u32),
            #[allow(clippy::cast_sign_loss)]
            victory_points: r.get::<i64, _>("victory_points") as u32,
            production: resource_map_from_json(r.get("production")),
        }))
    }

    async fn upsert_character(&self, character: &Character) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO characters (id, guild_id, identifier, user_id, represented_faction_id, \
             representation_changed_turn, victory_points, production) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (id) DO UPDATE SET identifier = EXCLUDED.identifier, \
             user_id = EXCLUDED.user_id, represented_faction_id = EXCLUDED.represented_faction_id, \
             representation_changed_turn = EXCLUDED.representation_changed_turn, \
             victory_points = EXCLUDED.victory_points, production = EXCLUDED.production",
        )
        .bind(character.id.into_inner())
        .bind(character.guild_id.into_inner())
        .bind(&character.identifier)
        .bind(&character.user_id)
        .bind(character.represented_faction_id.map(wargame_types::ids::FactionId::into_inner))
        .bind(character.representation_changed_turn.map(i64::from))
        .bind(i64::from(character.victory_points))
        .bind(serde_json::to_value(character.production)?)
        .execute(self.pool.pool())
        .await?;
        Ok(())
    }

    async fn list_characters(&self, guild_id: GuildId) -> Result<Vec<Character>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, guild_id, identifier, user_id, represented_faction_id, \
             representation_changed_turn, victory_points, production FROM characters \
             WHERE guild_id = $1",
        )
        .bind(guild_id.into_inner())
        .fetch_all(self.pool.pool())
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| Character {
                id: CharacterId::new(r.get("id")),
                guild_id: GuildId::new(r.get("guild_id")),
                identifier: r.get("identifier"),
                user_id: r.get("user_id"),
                represented_faction_id: r
                    .get::<Option<i64>, _>("represented_faction_id")
                    .map(FactionId::new),
                #[allow(clippy::cast_sign_loss)]
                representation_changed_turn: r
                    .get::<Option<i64>, _>("representation_changed_turn")
                    .map(|v| v as u32),
                #[allow(clippy::cast_sign_loss)]
                victory_points: r.get::<i64, _>("victory_points") as u32,
                production: resource_map_from_json(r.get("production")),
            })
            .collect())
    }

    async fn fetch_faction(&self, id: FactionId) -> Result<Option<Faction>, StoreError> {
        let row = sqlx::query(
            "SELECT id, guild_id, faction_id, leader_character_id, nation, created_turn, \
             starting_territory_count, spending FROM factions WHERE id = $1",
        )
        .bind(id.into_inner())
        .fetch_optional(self.pool.pool())
        .await?;
        Ok(row.map(|r| Faction {
            id: FactionId::new(r.get("id")),
            guild_id: GuildId::new(r.get("guild_id")),
            faction_id: r.get("faction_id"),
            leader_character_id: r.get::<Option<i64>, _>("leader_character_id").map(CharacterId::new),
            nation: r.get("nation"),
            #[allow(clippy::cast_sign_loss)]
            created_turn: r.get::<i64, _>("created_turn") as u32,
            #[allow(clippy::cast_sign_loss)]
            starting_territory_count: r.get::<i64, _>("starting_territory_count") as u32,
            spending: resource_map_from_json(r.get("spending")),
        }))
    }

    async fn upsert_faction(&self, faction: &Faction) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO factions (id, guild_id, faction_id, leader_character_id, nation, \
             created_turn, starting_territory_count, spending) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (id) DO UPDATE SET leader_character_id = EXCLUDED.leader_character_id, \
             nation = EXCLUDED.nation, spending = EXCLUDED.spending",
        )
        .bind(faction.id.into_inner())
        .bind(faction.guild_id.into_inner())
        .bind(&faction.faction_id)
        .bind(faction.leader_character_id.map(wargame_types::ids::CharacterId::into_inner))
        .bind(&faction.nation)
        .bind(i64::from(faction.created_turn))
        .bind(i64::from(faction.starting_territory_count))
        .bind(serde_json::to_value(faction.spending)?)
        .execute(self.pool.pool())
        .await?;
        Ok(())
    }

    async fn list_factions(&self, guild_id: GuildId) -> Result<Vec<Faction>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, guild_id, faction_id, leader_character_id, nation, created_turn, \
             starting_territory_count, spending FROM factions WHERE guild_id = $1",
        )
        .bind(guild_id.into_inner())
        .fetch_all(self.pool.pool())
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| Faction {
                id: FactionId::new(r.get("id")),
                guild_id: GuildId::new(r.get("guild_id")),
                faction_id: r.get("faction_id"),
                leader_character_id: r
                    .get::<Option<i64>, _>("leader_character_id")
                    .map(CharacterId::new),
                nation: r.get("nation"),
                #[allow(clippy::cast_sign_loss)]
                created_turn: r.get::<i64, _>("created_turn") as u32,
                #[allow(clippy::cast_sign_loss)]
                starting_territory_count: r.get::<i64, _>("starting_territory_count") as u32,
                spending: resource_map_from_json(r.get("spending")),
            })
            .collect())
    }

    async fn list_territories(&self, guild_id: GuildId) -> Result<Vec<Territory>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, guild_id, territory_id, name, terrain_type, production, victory_points, \
             controller_character_id, controller_faction_id, original_nation, sacred_land \
             FROM territories WHERE guild_id = $1",
        )
        .bind(guild_id.into_inner())
        .fetch_all(self.pool.pool())
        .await?;
        rows.into_iter().map(|r| self.territory_from_row(&r)).collect()
    }

    async fn fetch_territory(
        &self,
        guild_id: GuildId,
        territory_id: &TerritoryKey,
    ) -> Result<Option<Territory>, StoreError> {
        let row = sqlx::query(
            "SELECT id, guild_id, territory_id, name, terrain_type, production, victory_points, \
             controller_character_id, controller_faction_id, original_nation, sacred_land \
             FROM territories WHERE guild_id = $1 AND territory_id = $2",
        )
        .bind(guild_id.into_inner())
        .bind(&territory_id.0)
        .fetch_optional(self.pool.pool())
        .await?;
        row.map(|r| self.territory_from_row(&r)).transpose()
    }

    async fn upsert_territory(&self, territory: &Territory) -> Result<(), StoreError> {
        let (owner_char, owner_faction) = owner_to_columns(territory.controller);
        sqlx::query(
            "INSERT INTO territories (id, guild_id, territory_id, name, terrain_type, production, \
             victory_points, controller_character_id, controller_faction_id, original_nation, sacred_land) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             ON CONFLICT (id) DO UPDATE SET controller_character_id = EXCLUDED.controller_character_id, \
             controller_faction_id = EXCLUDED.controller_faction_id, production = EXCLUDED.production, \
             victory_points = EXCLUDED.victory_points",
        )
        .bind(territory.id.into_inner())
        .bind(territory.guild_id.into_inner())
        .bind(&territory.territory_id.0)
        .bind(&territory.name)
        .bind(terrain_to_str(territory.terrain_type))
        .bind(serde_json::to_value(territory.production)?)
        .bind(i64::from(territory.victory_points))
        .bind(owner_char)
        .bind(owner_faction)
        .bind(&territory.original_nation)
        .bind(territory.sacred_land)
        .execute(self.pool.pool())
        .await?;
        Ok(())
    }

    async fn list_adjacencies(
        &self,
        guild_id: GuildId,
    ) -> Result<Vec<TerritoryAdjacency>, StoreError> {
        let rows = sqlx::query("SELECT guild_id, a, b FROM territory_adjacencies WHERE guild_id = $1")
            .bind(guild_id.into_inner())
            .fetch_all(self.pool.pool())
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| TerritoryAdjacency {
                guild_id: GuildId::new(r.get("guild_id")),
                a: TerritoryKey(r.get("a")),
                b: TerritoryKey(r.get("b")),
            })
            .collect())
    }

    async fn list_units(&self, guild_id: GuildId) -> Result<Vec<Unit>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, guild_id, unit_id, type_id, owner_character_id, owner_faction_id, \
             commander_character_id, faction_id, current_territory_id, organization, \
             max_organization, status, is_naval FROM units WHERE guild_id = $1",
        )
        .bind(guild_id.into_inner())
        .fetch_all(self.pool.pool())
        .await?;
        rows.iter().map(|r| self.unit_from_row(r)).collect()
    }

    async fn fetch_unit(&self, id: UnitPk) -> Result<Option<Unit>, StoreError> {
        let row = sqlx::query(
            "SELECT id, guild_id, unit_id, type_id, owner_character_id, owner_faction_id, \
             commander_character_id, faction_id, current_territory_id, organization, \
             max_organization, status, is_naval FROM units WHERE id = $1",
        )
        .bind(id.into_inner())
        .fetch_optional(self.pool.pool())
        .await?;
        row.as_ref().map(|r| self.unit_from_row(r)).transpose()
    }

    async fn fetch_unit_by_key(
        &self,
        guild_id: GuildId,
        unit_id: &UnitKey,
    ) -> Result<Option<Unit>, StoreError> {
        let row = sqlx::query(
            "SELECT id, guild_id, unit_id, type_id, owner_character_id, owner_faction_id, \
             commander_character_id, faction_id, current_territory_id, organization, \
             max_organization, status, is_naval FROM units WHERE guild_id = $1 AND unit_id = $2",
        )
        .bind(guild_id.into_inner())
        .bind(&unit_id.0)
        .fetch_optional(self.pool.pool())
        .await?;
        row.as_ref().map(|r| self.unit_from_row(r)).transpose()
    }

    async fn upsert_unit(&self, unit: &Unit) -> Result<(), StoreError> {
        let (owner_char, owner_faction) = owner_to_columns(unit.owner);
        sqlx::query(
            "INSERT INTO units (id, guild_id, unit_id, type_id, owner_character_id, \
             owner_faction_id, commander_character_id, faction_id, current_territory_id, \
             organization, max_organization, status, is_naval) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13) \
             ON CONFLICT (id) DO UPDATE SET owner_character_id = EXCLUDED.owner_character_id, \
             owner_faction_id = EXCLUDED.owner_faction_id, \
             commander_character_id = EXCLUDED.commander_character_id, \
             current_territory_id = EXCLUDED.current_territory_id, \
             organization = EXCLUDED.organization, status = EXCLUDED.status",
        )
        .bind(unit.id.into_inner())
        .bind(unit.guild_id.into_inner())
        .bind(&unit.unit_id.0)
        .bind(&unit.type_id)
        .bind(owner_char)
        .bind(owner_faction)
        .bind(unit.commander_character_id.map(wargame_types::ids::CharacterId::into_inner))
        .bind(unit.faction_id.map(wargame_types::ids::FactionId::into_inner))
        .bind(unit.current_territory_id.as_ref().map(|t| t.0.clone()))
        .bind(unit.organization)
        .bind(i64::from(unit.max_organization))
        .bind(unit_status_to_str(unit.status))
        .bind(unit.is_naval)
        .execute(self.pool.pool())
        .await?;
        Ok(())
    }

    async fn insert_unit(&self, unit: &Unit) -> Result<UnitPk, StoreError> {
        let (owner_char, owner_faction) = owner_to_columns(unit.owner);
        let row = sqlx::query(
            "INSERT INTO units (guild_id, unit_id, type_id, owner_character_id, \
             owner_faction_id, commander_character_id, faction_id, current_territory_id, \
             organization, max_organization, status, is_naval) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12) RETURNING id",
        )
        .bind(unit.guild_id.into_inner())
        .bind(&unit.unit_id.0)
        .bind(&unit.type_id)
        .bind(owner_char)
        .bind(owner_faction)
        .bind(unit.commander_character_id.map(wargame_types::ids::CharacterId::into_inner))
        .bind(unit.faction_id.map(wargame_types::ids::FactionId::into_inner))
        .bind(unit.current_territory_id.as_ref().map(|t| t.0.clone()))
        .bind(unit.organization)
        .bind(i64::from(unit.max_organization))
        .bind(unit_status_to_str(unit.status))
        .bind(unit.is_naval)
        .fetch_one(self.pool.pool())
        .await?;
        Ok(UnitPk::new(row.get("id")))
    }

    async fn list_buildings(&self, guild_id: GuildId) -> Result<Vec<Building>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, guild_id, building_id, building_type, territory_id, durability, status, \
             upkeep FROM buildings WHERE guild_id = $1",
        )
        .bind(guild_id.into_inner())
        .fetch_all(self.pool.pool())
        .await?;
        Ok(rows.into_iter().map(|r| self.building_from_row(&r)).collect())
    }

    async fn upsert_building(&self, building: &Building) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO buildings (id, guild_id, building_id, building_type, territory_id, \
             durability, status, upkeep) VALUES ($1,$2,$3,$4,$5,$6,$7,$8) \
             ON CONFLICT (id) DO UPDATE SET durability = EXCLUDED.durability, \
             status = EXCLUDED.status, territory_id = EXCLUDED.territory_id",
        )
        .bind(building.id.into_inner())
        .bind(building.guild_id.into_inner())
        .bind(&building.building_id)
        .bind(&building.building_type)
        .bind(building.territory_id.as_ref().map(|t| t.0.clone()))
        .bind(building.durability)
        .bind(building_status_to_str(building.status))
        .bind(serde_json::to_value(building.upkeep)?)
        .execute(self.pool.pool())
        .await?;
        Ok(())
    }

    async fn insert_building(&self, building: &Building) -> Result<BuildingPk, StoreError> {
        let row = sqlx::query(
            "INSERT INTO buildings (guild_id, building_id, building_type, territory_id, \
             durability, status, upkeep) VALUES ($1,$2,$3,$4,$5,$6,$7) RETURNING id",
        )
        .bind(building.guild_id.into_inner())
        .bind(&building.building_id)
        .bind(&building.building_type)
        .bind(building.territory_id.as_ref().map(|t| t.0.clone()))
        .bind(building.durability)
        .bind(building_status_to_str(building.status))
        .bind(serde_json::to_value(building.upkeep)?)
        .fetch_one(self.pool.pool())
        .await?;
        Ok(BuildingPk::new(row.get("id")))
    }

    async fn fetch_building(&self, id: BuildingPk) -> Result<Option<Building>, StoreError> {
        let row = sqlx::query(
            "SELECT id, guild_id, building_id, building_type, territory_id, durability, status, \
             upkeep FROM buildings WHERE id = $1",
        )
        .bind(id.into_inner())
        .fetch_optional(self.pool.pool())
        .await?;
        Ok(row.map(|r| self.building_from_row(&r)))
    }

    async fn fetch_player_resources(
        &self,
        character_id: CharacterId,
    ) -> Result<PlayerResources, StoreError> {
        let row = sqlx::query(
            "SELECT character_id, guild_id, balance FROM player_resources WHERE character_id = $1",
        )
        .bind(character_id.into_inner())
        .fetch_optional(self.pool.pool())
        .await?;
        match row {
            Some(r) => Ok(PlayerResources {
                character_id: CharacterId::new(r.get("character_id")),
                guild_id: GuildId::new(r.get("guild_id")),
                balance: resource_map_from_json(r.get("balance")),
            }),
            None => {
                let guild = sqlx::query("SELECT guild_id FROM characters WHERE id = $1")
                    .bind(character_id.into_inner())
                    .fetch_optional(self.pool.pool())
                    .await?
                    .map(|r| GuildId::new(r.get("guild_id")))
                    .unwrap_or_else(|| GuildId::new(0));
                Ok(PlayerResources { character_id, guild_id: guild, balance: ResourceMap::default() })
            }
        }
    }

    async fn upsert_player_resources(&self, resources: &PlayerResources) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO player_resources (character_id, guild_id, balance) VALUES ($1, $2, $3) \
             ON CONFLICT (character_id) DO UPDATE SET balance = EXCLUDED.balance",
        )
        .bind(resources.character_id.into_inner())
        .bind(resources.guild_id.into_inner())
        .bind(serde_json::to_value(resources.balance)?)
        .execute(self.pool.pool())
        .await?;
        Ok(())
    }

    async fn fetch_faction_resources(
        &self,
        faction_id: FactionId,
    ) -> Result<FactionResources, StoreError> {
        let row = sqlx::query(
            "SELECT faction_id, guild_id, balance FROM faction_resources WHERE faction_id = $1",
        )
        .bind(faction_id.into_inner())
        .fetch_optional(self.pool.pool())
        .await?;
        match row {
            Some(r) => Ok(FactionResources {
                faction_id: FactionId::new(r.get("faction_id")),
                guild_id: GuildId::new(r.get("guild_id")),
                balance: resource_map_from_json(r.get("balance")),
            }),
            None => {
                let guild = sqlx::query("SELECT guild_id FROM factions WHERE id = $1")
                    .bind(faction_id.into_inner())
                    .fetch_optional(self.pool.pool())
                    .await?
                    .map(|r| GuildId::new(r.get("guild_id")))
                    .unwrap_or_else(|| GuildId::new(0));
                Ok(FactionResources { faction_id, guild_id: guild, balance: ResourceMap::default() })
            }
        }
    }

    async fn upsert_faction_resources(
        &self,
        resources: &FactionResources,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO faction_resources (faction_id, guild_id, balance) VALUES ($1, $2, $3) \
             ON CONFLICT (faction_id) DO UPDATE SET balance = EXCLUDED.balance",
        )
        .bind(resources.faction_id.into_inner())
        .bind(resources.guild_id.into_inner())
        .bind(serde_json::to_value(resources.balance)?)
        .execute(self.pool.pool())
        .await?;
        Ok(())
    }

    async fn list_orders_for_phase(
        &self,
        guild_id: GuildId,
        phase: Phase,
    ) -> Result<Vec<Order>, StoreError> {
        // `phase` is derived from `order_type` (spec.md §4.1), not stored;
        // filter client-side after a per-guild fetch rather than pushing an
        // `OrderType::routing` match into SQL.
        let all = self.list_all_orders(guild_id).await?;
        Ok(all.into_iter().filter(|o| o.order_type.phase() == phase).collect())
    }

    async fn fetch_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let row = sqlx::query(
            "SELECT id, guild_id, order_type, status, priority, submitted_at, character_id, \
             submitting_faction_id, order_data, result_data, turn_submitted, updated_at, \
             updated_turn FROM orders WHERE id = $1",
        )
        .bind(id.into_inner())
        .fetch_optional(self.pool.pool())
        .await?;
        row.as_ref().map(|r| self.order_from_row(r)).transpose()
    }

    async fn upsert_order(&self, order: &Order) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO orders (id, guild_id, order_type, status, priority, submitted_at, \
             character_id, submitting_faction_id, order_data, result_data, turn_submitted, \
             updated_at, updated_turn) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13) \
             ON CONFLICT (id) DO UPDATE SET status = EXCLUDED.status, \
             order_data = EXCLUDED.order_data, result_data = EXCLUDED.result_data, \
             updated_at = EXCLUDED.updated_at, updated_turn = EXCLUDED.updated_turn",
        )
        .bind(order.id.into_inner())
        .bind(order.guild_id.into_inner())
        .bind(order_type_to_str(order.order_type))
        .bind(order_status_to_str(order.status))
        .bind(i64::from(order.priority))
        .bind(order.submitted_at)
        .bind(order.character_id.map(wargame_types::ids::CharacterId::into_inner))
        .bind(order.submitting_faction_id.map(wargame_types::ids::FactionId::into_inner))
        .bind(&order.order_data)
        .bind(&order.result_data)
        .bind(i64::from(order.turn_submitted))
        .bind(order.updated_at)
        .bind(i64::from(order.updated_turn))
        .execute(self.pool.pool())
        .await?;
        Ok(())
    }

    async fn append_events(&self, events: &[Event]) -> Result<(), StoreError> {
        let mut tx = self.pool.pool().begin().await?;
        for event in events {
            sqlx::query(
                "INSERT INTO turn_log (turn_number, phase, event_type, entity_type, entity_id, \
                 guild_id, event_data) VALUES ($1,$2,$3,$4,$5,$6,$7)",
            )
            .bind(i64::from(event.turn_number))
            .bind(event.phase.as_str())
            .bind(&event.event_type)
            .bind(&event.entity_type)
            .bind(event.entity_id)
            .bind(event.guild_id.into_inner())
            .bind(&event.event_data)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn list_events(&self, guild_id: GuildId, turn: Option<u32>) -> Result<Vec<Event>, StoreError> {
        let rows = match turn {
            Some(t) => {
                sqlx::query(
                    "SELECT turn_number, phase, event_type, entity_type, entity_id, guild_id, \
                     event_data FROM turn_log WHERE guild_id = $1 AND turn_number = $2 ORDER BY id",
                )
                .bind(guild_id.into_inner())
                .bind(i64::from(t))
                .fetch_all(self.pool.pool())
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT turn_number, phase, event_type, entity_type, entity_id, guild_id, \
                     event_data FROM turn_log WHERE guild_id = $1 ORDER BY id",
                )
                .bind(guild_id.into_inner())
                .fetch_all(self.pool.pool())
                .await?
            }
        };
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        Ok(rows
            .into_iter()
            .map(|r| {
                let turn_number: i64 = r.get("turn_number");
                Event {
                    turn_number: turn_number as u32,
                    phase: phase_from_str(&r.get::<String, _>("phase")),
                    event_type: r.get("event_type"),
                    entity_type: r.get("entity_type"),
                    entity_id: r.get("entity_id"),
                    guild_id: GuildId::new(r.get("guild_id")),
                    event_data: r.get("event_data"),
                }
            })
            .collect())
    }

    async fn load_rule_tables(&self, guild_id: GuildId) -> Result<RuleTables, StoreError> {
        let unit_types = self.list_unit_types(guild_id).await?;
        let building_types = self.list_building_types(guild_id).await?;
        let adjacencies = self.list_adjacencies(guild_id).await?;
        // Herbalism recipes are shared across guilds (no `guild_id` column,
        // spec.md §3 Herbalism) so they are fetched unconditionally here.
        let subset_recipes = self.list_subset_recipes().await?;
        let constraint_recipes = self.list_constraint_recipes().await?;
        let failed_blends = self.list_failed_blends().await?;
        Ok(RuleTables {
            unit_types,
            building_types,
            adjacencies,
            subset_recipes,
            constraint_recipes,
            failed_blends,
        })
    }

    async fn insert_task(&self, task: &ScheduledTask) -> Result<TaskId, StoreError> {
        let row = sqlx::query(
            "INSERT INTO scheduled_tasks (task, recipient_identifier, sender_identifier, \
             parameter, scheduled_time, guild_id) VALUES ($1,$2,$3,$4,$5,$6) RETURNING id",
        )
        .bind(&task.task)
        .bind(&task.recipient_identifier)
        .bind(&task.sender_identifier)
        .bind(&task.parameter)
        .bind(task.scheduled_time)
        .bind(task.guild_id.into_inner())
        .fetch_one(self.pool.pool())
        .await?;
        Ok(TaskId::new(row.get("id")))
    }

    async fn claim_next_task(&self, now: DateTime<Utc>) -> Result<Option<ScheduledTask>, StoreError> {
        let mut tx = self.pool.pool().begin().await?;
        let row = sqlx::query(
            "SELECT id, task, recipient_identifier, sender_identifier, parameter, scheduled_time, \
             guild_id FROM scheduled_tasks WHERE scheduled_time <= $1 \
             ORDER BY scheduled_time ASC LIMIT 1 FOR UPDATE SKIP LOCKED",
        )
        .bind(now)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            tx.commit().await?;
            return Ok(None);
        };
        let id: i64 = row.get("id");
        sqlx::query("DELETE FROM scheduled_tasks WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(Some(ScheduledTask {
            id: TaskId::new(id),
            task: row.get("task"),
            recipient_identifier: row.get("recipient_identifier"),
            sender_identifier: row.get("sender_identifier"),
            parameter: row.get("parameter"),
            scheduled_time: row.get("scheduled_time"),
            guild_id: GuildId::new(row.get("guild_id")),
        }))
    }

    async fn list_memberships_for_character(
        &self,
        guild_id: GuildId,
        character_id: CharacterId,
    ) -> Result<Vec<FactionMember>, StoreError> {
        let rows = sqlx::query(
            "SELECT faction_id, character_id, joined_turn, guild_id FROM faction_members \
             WHERE guild_id = $1 AND character_id = $2",
        )
        .bind(guild_id.into_inner())
        .bind(character_id.into_inner())
        .fetch_all(self.pool.pool())
        .await?;
        Ok(rows.into_iter().map(Self::faction_member_from_row).collect())
    }

    async fn list_faction_members(
        &self,
        guild_id: GuildId,
        faction_id: FactionId,
    ) -> Result<Vec<FactionMember>, StoreError> {
        let rows = sqlx::query(
            "SELECT faction_id, character_id, joined_turn, guild_id FROM faction_members \
             WHERE guild_id = $1 AND faction_id = $2",
        )
        .bind(guild_id.into_inner())
        .bind(faction_id.into_inner())
        .fetch_all(self.pool.pool())
        .await?;
        Ok(rows.into_iter().map(Self::faction_member_from_row).collect())
    }

    async fn upsert_faction_member(&self, member: &FactionMember) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO faction_members (faction_id, character_id, joined_turn, guild_id) \
             VALUES ($1,$2,$3,$4) ON CONFLICT (faction_id, character_id, guild_id) \
             DO UPDATE SET joined_turn = EXCLUDED.joined_turn",
        )
        .bind(member.faction_id.into_inner())
        .bind(member.character_id.into_inner())
        .bind(i64::from(member.joined_turn))
        .bind(member.guild_id.into_inner())
        .execute(self.pool.pool())
        .await?;
        Ok(())
    }

    async fn delete_faction_member(
        &self,
        guild_id: GuildId,
        faction_id: FactionId,
        character_id: CharacterId,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "DELETE FROM faction_members WHERE guild_id = $1 AND faction_id = $2 AND character_id = $3",
        )
        .bind(guild_id.into_inner())
        .bind(faction_id.into_inner())
        .bind(character_id.into_inner())
        .execute(self.pool.pool())
        .await?;
        Ok(())
    }

    async fn list_permissions(
        &self,
        guild_id: GuildId,
        faction_id: FactionId,
    ) -> Result<Vec<FactionPermission>, StoreError> {
        let rows = sqlx::query(
            "SELECT faction_id, character_id, permission_type, guild_id FROM faction_permissions \
             WHERE guild_id = $1 AND faction_id = $2",
        )
        .bind(guild_id.into_inner())
        .bind(faction_id.into_inner())
        .fetch_all(self.pool.pool())
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| FactionPermission {
                faction_id: FactionId::new(r.get("faction_id")),
                character_id: CharacterId::new(r.get("character_id")),
                permission_type: permission_from_str(r.get("permission_type")),
                guild_id: GuildId::new(r.get("guild_id")),
            })
            .collect())
    }

    async fn fetch_alliance(
        &self,
        guild_id: GuildId,
        faction_a_id: FactionId,
        faction_b_id: FactionId,
    ) -> Result<Option<Alliance>, StoreError> {
        let (a, b) = Alliance::canonical_pair(faction_a_id, faction_b_id);
        let row = sqlx::query(
            "SELECT faction_a_id, faction_b_id, status, initiated_by_faction_id, created_at, \
             activated_at, guild_id FROM alliances \
             WHERE guild_id = $1 AND faction_a_id = $2 AND faction_b_id = $3",
        )
        .bind(guild_id.into_inner())
        .bind(a.into_inner())
        .bind(b.into_inner())
        .fetch_optional(self.pool.pool())
        .await?;
        Ok(row.map(Self::alliance_from_row))
    }

    async fn list_alliances_for_faction(
        &self,
        guild_id: GuildId,
        faction_id: FactionId,
    ) -> Result<Vec<Alliance>, StoreError> {
        let rows = sqlx::query(
            "SELECT faction_a_id, faction_b_id, status, initiated_by_faction_id, created_at, \
             activated_at, guild_id FROM alliances \
             WHERE guild_id = $1 AND (faction_a_id = $2 OR faction_b_id = $2)",
        )
        .bind(guild_id.into_inner())
        .bind(faction_id.into_inner())
        .fetch_all(self.pool.pool())
        .await?;
        Ok(rows.into_iter().map(Self::alliance_from_row).collect())
    }

    async fn upsert_alliance(&self, alliance: &Alliance) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO alliances (faction_a_id, faction_b_id, status, initiated_by_faction_id, \
             created_at, activated_at, guild_id) VALUES ($1,$2,$3,$4,$5,$6,$7) \
             ON CONFLICT (faction_a_id, faction_b_id, guild_id) \
             DO UPDATE SET status = EXCLUDED.status, activated_at = EXCLUDED.activated_at",
        )
        .bind(alliance.faction_a_id.into_inner())
        .bind(alliance.faction_b_id.into_inner())
        .bind(alliance_status_to_str(alliance.status))
        .bind(alliance.initiated_by_faction_id.into_inner())
        .bind(alliance.created_at)
        .bind(alliance.activated_at)
        .bind(alliance.guild_id.into_inner())
        .execute(self.pool.pool())
        .await?;
        Ok(())
    }

    async fn delete_alliance(
        &self,
        guild_id: GuildId,
        faction_a_id: FactionId,
        faction_b_id: FactionId,
    ) -> Result<(), StoreError> {
        let (a, b) = Alliance::canonical_pair(faction_a_id, faction_b_id);
        sqlx::query(
            "DELETE FROM alliances WHERE guild_id = $1 AND faction_a_id = $2 AND faction_b_id = $3",
        )
        .bind(guild_id.into_inner())
        .bind(a.into_inner())
        .bind(b.into_inner())
        .execute(self.pool.pool())
        .await?;
        Ok(())
    }

    async fn insert_war(&self, war: &War) -> Result<WarId, StoreError> {
        let row = sqlx::query(
            "INSERT INTO wars (guild_id, war_id, objective, declared_turn) VALUES ($1,$2,$3,$4) \
             RETURNING id",
        )
        .bind(war.guild_id.into_inner())
        .bind(&war.war_id)
        .bind(&war.objective)
        .bind(i64::from(war.declared_turn))
        .fetch_one(self.pool.pool())
        .await?;
        Ok(WarId::new(row.get("id")))
    }

    async fn list_wars(&self, guild_id: GuildId) -> Result<Vec<War>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, guild_id, war_id, objective, declared_turn FROM wars WHERE guild_id = $1",
        )
        .bind(guild_id.into_inner())
        .fetch_all(self.pool.pool())
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| War {
                id: WarId::new(r.get("id")),
                guild_id: GuildId::new(r.get("guild_id")),
                war_id: r.get("war_id"),
                objective: r.get("objective"),
                #[allow(clippy::cast_sign_loss)]
                declared_turn: r.get::<i64, _>("declared_turn") as u32,
            })
            .collect())
    }

    async fn list_war_participants(&self, guild_id: GuildId) -> Result<Vec<WarParticipant>, StoreError> {
        let rows = sqlx::query(
            "SELECT wp.war_id, wp.faction_id, wp.side, wp.joined_turn, wp.is_original_declarer \
             FROM war_participants wp JOIN wars w ON w.id = wp.war_id WHERE w.guild_id = $1",
        )
        .bind(guild_id.into_inner())
        .fetch_all(self.pool.pool())
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| WarParticipant {
                war_id: WarId::new(r.get("war_id")),
                faction_id: FactionId::new(r.get("faction_id")),
                side: side_from_str(r.get("side")),
                #[allow(clippy::cast_sign_loss)]
                joined_turn: r.get::<i64, _>("joined_turn") as u32,
                is_original_declarer: r.get("is_original_declarer"),
            })
            .collect())
    }

    async fn upsert_war_participant(
        &self,
        _guild_id: GuildId,
        participant: &WarParticipant,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO war_participants (war_id, faction_id, side, joined_turn, \
             is_original_declarer) VALUES ($1,$2,$3,$4,$5) \
             ON CONFLICT (war_id, faction_id) DO UPDATE SET side = EXCLUDED.side",
        )
        .bind(participant.war_id.into_inner())
        .bind(participant.faction_id.into_inner())
        .bind(side_to_str(participant.side))
        .bind(i64::from(participant.joined_turn))
        .bind(participant.is_original_declarer)
        .execute(self.pool.pool())
        .await?;
        Ok(())
    }

    async fn list_naval_positions(
        &self,
        _guild_id: GuildId,
        unit_id: UnitPk,
    ) -> Result<Vec<NavalUnitPosition>, StoreError> {
        let rows = sqlx::query(
            "SELECT unit_id, territory_id, position_index, guild_id FROM naval_unit_positions \
             WHERE unit_id = $1 ORDER BY position_index ASC",
        )
        .bind(unit_id.into_inner())
        .fetch_all(self.pool.pool())
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| NavalUnitPosition {
                unit_id: UnitPk::new(r.get("unit_id")),
                territory_id: TerritoryKey(r.get("territory_id")),
                #[allow(clippy::cast_sign_loss)]
                position_index: r.get::<i64, _>("position_index") as u32,
                guild_id: GuildId::new(r.get("guild_id")),
            })
            .collect())
    }

    async fn set_naval_positions(
        &self,
        guild_id: GuildId,
        unit_id: UnitPk,
        positions: &[NavalUnitPosition],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.pool().begin().await?;
        sqlx::query("DELETE FROM naval_unit_positions WHERE unit_id = $1")
            .bind(unit_id.into_inner())
            .execute(&mut *tx)
            .await?;
        for position in positions {
            sqlx::query(
                "INSERT INTO naval_unit_positions (unit_id, territory_id, position_index, guild_id) \
                 VALUES ($1,$2,$3,$4)",
            )
            .bind(unit_id.into_inner())
            .bind(&position.territory_id.0)
            .bind(i64::from(position.position_index))
            .bind(guild_id.into_inner())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }
}

impl PgStore {
    async fn list_all_orders(&self, guild_id: GuildId) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, guild_id, order_type, status, priority, submitted_at, character_id, \
             submitting_faction_id, order_data, result_data, turn_submitted, updated_at, \
             updated_turn FROM orders WHERE guild_id = $1",
        )
        .bind(guild_id.into_inner())
        .fetch_all(self.pool.pool())
        .await?;
        rows.iter().map(|r| self.order_from_row(r)).collect()
    }

    fn order_from_row(&self, r: &sqlx::postgres::PgRow) -> Result<Order, StoreError> {
        let order_type = order_type_from_str(r.get("order_type"))?;
        Ok(Order {
            id: OrderId::new(r.get("id")),
            guild_id: GuildId::new(r.get("guild_id")),
            order_type,
            status: order_status_from_str(r.get("status")),
            #[allow(clippy::cast_sign_loss)]
            priority: r.get::<i64, _>("priority") as u8,
            submitted_at: r.get("submitted_at"),
            character_id: r.get::<Option<i64>, _>("character_id").map(CharacterId::new),
            submitting_faction_id: r
                .get::<Option<i64>, _>("submitting_faction_id")
                .map(FactionId::new),
            order_data: r.get("order_data"),
            result_data: r.get("result_data"),
            #[allow(clippy::cast_sign_loss)]
            turn_submitted: r.get::<i64, _>("turn_submitted") as u32,
            updated_at: r.get("updated_at"),
            #[allow(clippy::cast_sign_loss)]
            updated_turn: r.get::<i64, _>("updated_turn") as u32,
        })
    }

    fn territory_from_row(&self, r: &sqlx::postgres::PgRow) -> Result<Territory, StoreError> {
        let controller = owner_from_columns(
            r.get("controller_character_id"),
            r.get("controller_faction_id"),
        )?;
        Ok(Territory {
            id: wargame_types::ids::TerritoryPk::new(r.get("id")),
            guild_id: GuildId::new(r.get("guild_id")),
            territory_id: TerritoryKey(r.get("territory_id")),
            name: r.get("name"),
            terrain_type: terrain_from_str(r.get("terrain_type")),
            production: resource_map_from_json(r.get("production")),
            #[allow(clippy::cast_sign_loss)]
            victory_points: r.get::<i64, _>("victory_points") as u32,
            controller,
            original_nation: r.get("original_nation"),
            sacred_land: r.get("sacred_land"),
        })
    }

    fn unit_from_row(&self, r: &sqlx::postgres::PgRow) -> Result<Unit, StoreError> {
        let owner = owner_from_columns(r.get("owner_character_id"), r.get("owner_faction_id"))?;
        Ok(Unit {
            id: UnitPk::new(r.get("id")),
            guild_id: GuildId::new(r.get("guild_id")),
            unit_id: UnitKey(r.get("unit_id")),
            type_id: r.get("type_id"),
            owner,
            commander_character_id: r
                .get::<Option<i64>, _>("commander_character_id")
                .map(CharacterId::new),
            faction_id: r.get::<Option<i64>, _>("faction_id").map(FactionId::new),
            current_territory_id: r
                .get::<Option<String>, _>("current_territory_id")
                .map(TerritoryKey),
            organization: r.get("organization"),
            #[allow(clippy::cast_sign_loss)]
            max_organization: r.get::<i64, _>("max_organization") as u32,
            status: unit_status_from_str(r.get("status")),
            is_naval: r.get("is_naval"),
        })
    }

    fn building_from_row(&self, r: &sqlx::postgres::PgRow) -> Building {
        Building {
            id: BuildingPk::new(r.get("id")),
            guild_id: GuildId::new(r.get("guild_id")),
            building_id: r.get("building_id"),
            building_type: r.get("building_type"),
            territory_id: r.get::<Option<String>, _>("territory_id").map(TerritoryKey),
            durability: r.get("durability"),
            status: building_status_from_str(r.get("status")),
            upkeep: resource_map_from_json(r.get("upkeep")),
        }
    }

    fn faction_member_from_row(r: sqlx::postgres::PgRow) -> FactionMember {
        FactionMember {
            faction_id: FactionId::new(r.get("faction_id")),
            character_id: CharacterId::new(r.get("character_id")),
            #[allow(clippy::cast_sign_loss)]
            joined_turn: r.get::<i64, _>("joined_turn") as u32,
            guild_id: GuildId::new(r.get("guild_id")),
        }
    }

    fn alliance_from_row(r: sqlx::postgres::PgRow) -> Alliance {
        Alliance {
            faction_a_id: FactionId::new(r.get("faction_a_id")),
            faction_b_id: FactionId::new(r.get("faction_b_id")),
            status: alliance_status_from_str(r.get("status")),
            initiated_by_faction_id: FactionId::new(r.get("initiated_by_faction_id")),
            created_at: r.get("created_at"),
            activated_at: r.get("activated_at"),
            guild_id: GuildId::new(r.get("guild_id")),
        }
    }

    async fn list_unit_types(&self, guild_id: GuildId) -> Result<Vec<UnitType>, StoreError> {
        let rows = sqlx::query(
            "SELECT type_id, guild_id, nation, movement, organization_max, attack, defense, \
             siege_attack, siege_defense, costs, upkeep, is_naval FROM unit_types \
             WHERE guild_id = $1",
        )
        .bind(guild_id.into_inner())
        .fetch_all(self.pool.pool())
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| UnitType {
                type_id: r.get("type_id"),
                guild_id: GuildId::new(r.get("guild_id")),
                nation: r.get("nation"),
                #[allow(clippy::cast_sign_loss)]
                movement: r.get::<i64, _>("movement") as u32,
                #[allow(clippy::cast_sign_loss)]
                organization_max: r.get::<i64, _>("organization_max") as u32,
                #[allow(clippy::cast_sign_loss)]
                attack: r.get::<i64, _>("attack") as u32,
                #[allow(clippy::cast_sign_loss)]
                defense: r.get::<i64, _>("defense") as u32,
                #[allow(clippy::cast_sign_loss)]
                siege_attack: r.get::<i64, _>("siege_attack") as u32,
                #[allow(clippy::cast_sign_loss)]
                siege_defense: r.get::<i64, _>("siege_defense") as u32,
                costs: resource_map_from_json(r.get("costs")),
                upkeep: resource_map_from_json(r.get("upkeep")),
                is_naval: r.get("is_naval"),
            })
            .collect())
    }

    async fn list_building_types(&self, guild_id: GuildId) -> Result<Vec<BuildingType>, StoreError> {
        let rows = sqlx::query(
            "SELECT type_id, guild_id, costs, upkeep FROM building_types WHERE guild_id = $1",
        )
        .bind(guild_id.into_inner())
        .fetch_all(self.pool.pool())
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| BuildingType {
                type_id: r.get("type_id"),
                guild_id: GuildId::new(r.get("guild_id")),
                costs: resource_map_from_json(r.get("costs")),
                upkeep: resource_map_from_json(r.get("upkeep")),
            })
            .collect())
    }

    async fn list_subset_recipes(&self) -> Result<Vec<SubsetRecipe>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, product_item_number, product_type, quantity_produced, ingredients \
             FROM herbalism_subset_recipes",
        )
        .fetch_all(self.pool.pool())
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| SubsetRecipe {
                id: r.get("id"),
                product_item_number: r.get("product_item_number"),
                product_type: product_type_from_str(r.get("product_type")),
                #[allow(clippy::cast_sign_loss)]
                quantity_produced: r.get::<i64, _>("quantity_produced") as u32,
                ingredients: serde_json::from_value(r.get("ingredients")).unwrap_or_default(),
            })
            .collect())
    }

    async fn list_constraint_recipes(&self) -> Result<Vec<ConstraintRecipe>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, product_item_number, product_type, quantity_produced, ingredients, \
             primary_chakra, primary_is_boon, secondary_chakra, secondary_is_boon, tier, \
             created_at FROM herbalism_constraint_recipes ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(self.pool.pool())
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| ConstraintRecipe {
                id: r.get("id"),
                product_item_number: r.get("product_item_number"),
                product_type: product_type_from_str(r.get("product_type")),
                #[allow(clippy::cast_sign_loss)]
                quantity_produced: r.get::<i64, _>("quantity_produced") as u32,
                ingredients: r
                    .get::<Option<serde_json::Value>, _>("ingredients")
                    .and_then(|v| serde_json::from_value(v).ok()),
                primary_chakra: r.get("primary_chakra"),
                primary_is_boon: r
                    .get::<Option<String>, _>("primary_is_boon")
                    .map(|s| valence_from_str(&s)),
                secondary_chakra: r.get("secondary_chakra"),
                secondary_is_boon: r
                    .get::<Option<String>, _>("secondary_is_boon")
                    .map(|s| valence_from_str(&s)),
                #[allow(clippy::cast_sign_loss)]
                tier: r.get::<Option<i64>, _>("tier").map(|v| v as u8),
                created_at: r.get("created_at"),
            })
            .collect())
    }

    async fn list_failed_blends(&self) -> Result<Vec<FailedBlend>, StoreError> {
        let rows = sqlx::query("SELECT product_item_number, product_type FROM herbalism_failed_blends")
            .fetch_all(self.pool.pool())
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| FailedBlend {
                product_item_number: r.get("product_item_number"),
                product_type: product_type_from_str(r.get("product_type")),
            })
            .collect())
    }
}

fn phase_from_str(s: &str) -> Phase {
    match s {
        "MOVEMENT" => Phase::Movement,
        "COMBAT" => Phase::Combat,
        "RESOURCE_COLLECTION" => Phase::ResourceCollection,
        "RESOURCE_TRANSFER" => Phase::ResourceTransfer,
        "ENCIRCLEMENT" => Phase::Encirclement,
        "UPKEEP" => Phase::Upkeep,
        "ORGANIZATION" => Phase::Organization,
        "CONSTRUCTION" => Phase::Construction,
        _ => Phase::Beginning,
    }
}

fn terrain_to_str(t: TerrainType) -> &'static str {
    match t {
        TerrainType::Plains => "plains",
        TerrainType::Forest => "forest",
        TerrainType::Hills => "hills",
        TerrainType::Mountains => "mountains",
        TerrainType::Swamp => "swamp",
        TerrainType::Desert => "desert",
        TerrainType::Water => "water",
    }
}

fn terrain_from_str(s: String) -> TerrainType {
    match s.as_str() {
        "forest" => TerrainType::Forest,
        "hills" => TerrainType::Hills,
        "mountains" => TerrainType::Mountains,
        "swamp" => TerrainType::Swamp,
        "desert" => TerrainType::Desert,
        "water" => TerrainType::Water,
        _ => TerrainType::Plains,
    }
}

fn unit_status_to_str(s: UnitStatus) -> &'static str {
    match s {
        UnitStatus::Active => "ACTIVE",
        UnitStatus::Disbanded => "DISBANDED",
    }
}

fn unit_status_from_str(s: String) -> UnitStatus {
    if s == "DISBANDED" { UnitStatus::Disbanded } else { UnitStatus::Active }
}

fn building_status_to_str(s: BuildingStatus) -> &'static str {
    match s {
        BuildingStatus::Active => "ACTIVE",
        BuildingStatus::Destroyed => "DESTROYED",
    }
}

fn building_status_from_str(s: String) -> BuildingStatus {
    if s == "DESTROYED" { BuildingStatus::Destroyed } else { BuildingStatus::Active }
}

fn order_status_to_str(s: OrderStatus) -> &'static str {
    match s {
        OrderStatus::Pending => "PENDING",
        OrderStatus::Ongoing => "ONGOING",
        OrderStatus::Success => "SUCCESS",
        OrderStatus::Failed => "FAILED",
        OrderStatus::Cancelled => "CANCELLED",
    }
}

fn order_status_from_str(s: String) -> OrderStatus {
    match s.as_str() {
        "ONGOING" => OrderStatus::Ongoing,
        "SUCCESS" => OrderStatus::Success,
        "FAILED" => OrderStatus::Failed,
        "CANCELLED" => OrderStatus::Cancelled,
        _ => OrderStatus::Pending,
    }
}

fn order_type_to_str(t: wargame_types::OrderType) -> &'static str {
    use wargame_types::OrderType::{
        AssignCommander, AssignVictoryPoints, CancelTransfer, Construction, DeclareWar,
        DissolveAlliance, JoinFaction, KickFromFaction, LeaveFaction, MakeAlliance, Mobilization,
        ResourceTransfer, Unit,
    };
    match t {
        LeaveFaction => "LEAVE_FACTION",
        KickFromFaction => "KICK_FROM_FACTION",
        JoinFaction => "JOIN_FACTION",
        AssignCommander => "ASSIGN_COMMANDER",
        AssignVictoryPoints => "ASSIGN_VICTORY_POINTS",
        MakeAlliance => "MAKE_ALLIANCE",
        DissolveAlliance => "DISSOLVE_ALLIANCE",
        DeclareWar => "DECLARE_WAR",
        Unit => "UNIT",
        CancelTransfer => "CANCEL_TRANSFER",
        ResourceTransfer => "RESOURCE_TRANSFER",
        Mobilization => "MOBILIZATION",
        Construction => "CONSTRUCTION",
    }
}

fn order_type_from_str(s: String) -> Result<wargame_types::OrderType, StoreError> {
    use wargame_types::OrderType;
    Ok(match s.as_str() {
        "LEAVE_FACTION" => OrderType::LeaveFaction,
        "KICK_FROM_FACTION" => OrderType::KickFromFaction,
        "JOIN_FACTION" => OrderType::JoinFaction,
        "ASSIGN_COMMANDER" => OrderType::AssignCommander,
        "ASSIGN_VICTORY_POINTS" => OrderType::AssignVictoryPoints,
        "MAKE_ALLIANCE" => OrderType::MakeAlliance,
        "DISSOLVE_ALLIANCE" => OrderType::DissolveAlliance,
        "DECLARE_WAR" => OrderType::DeclareWar,
        "UNIT" => OrderType::Unit,
        "CANCEL_TRANSFER" => OrderType::CancelTransfer,
        "RESOURCE_TRANSFER" => OrderType::ResourceTransfer,
        "MOBILIZATION" => OrderType::Mobilization,
        "CONSTRUCTION" => OrderType::Construction,
        other => return Err(StoreError::InvariantViolation(format!("unknown order_type: {other}"))),
    })
}

fn permission_from_str(s: String) -> wargame_types::PermissionType {
    if s == "FINANCIAL" {
        wargame_types::PermissionType::Financial
    } else {
        wargame_types::PermissionType::Command
    }
}

fn alliance_status_to_str(s: wargame_types::AllianceStatus) -> &'static str {
    use wargame_types::AllianceStatus::{Active, PendingFactionA, PendingFactionB};
    match s {
        PendingFactionA => "PENDING_FACTION_A",
        PendingFactionB => "PENDING_FACTION_B",
        Active => "ACTIVE",
    }
}

fn alliance_status_from_str(s: String) -> wargame_types::AllianceStatus {
    match s.as_str() {
        "PENDING_FACTION_B" => wargame_types::AllianceStatus::PendingFactionB,
        "ACTIVE" => wargame_types::AllianceStatus::Active,
        _ => wargame_types::AllianceStatus::PendingFactionA,
    }
}

fn side_to_str(s: wargame_types::WarSide) -> &'static str {
    match s {
        wargame_types::WarSide::SideA => "SIDE_A",
        wargame_types::WarSide::SideB => "SIDE_B",
    }
}

fn side_from_str(s: String) -> wargame_types::WarSide {
    if s == "SIDE_B" { wargame_types::WarSide::SideB } else { wargame_types::WarSide::SideA }
}

fn product_type_from_str(s: String) -> wargame_types::ProductType {
    use wargame_types::ProductType::{Bath, Decoction, Incense, Salve, Tea, Tincture};
    match s.as_str() {
        "salve" => Salve,
        "tincture" => Tincture,
        "decoction" => Decoction,
        "bath" => Bath,
        "incense" => Incense,
        _ => Tea,
    }
}

fn valence_from_str(s: &str) -> wargame_types::ChakraValence {
    if s.eq_ignore_ascii_case("bane") {
        wargame_types::ChakraValence::Bane
    } else {
        wargame_types::ChakraValence::Boon
    }
}
