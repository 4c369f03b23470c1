//! Construction phase: mobilize units and construct buildings, FIFO by
//! submission (spec.md §4.10).
//!
//! `order_data` carries `owner` as the same tagged `{"kind", "id"}` shape
//! [`crate::resource_transfer`] uses, plus a `territory_id`, the type id
//! to instantiate, and the user-facing business key the new entity should
//! receive.

use serde_json::Value;
use wargame_events::{Event, EventDataBuilder, event_type::construction as evt};
use wargame_ledger::deduct;
use wargame_store::Store;
use wargame_types::ids::{CharacterId, FactionId};
use wargame_types::{
    Building, BuildingStatus, FactionResources, GuildId, Order, OrderStatus, Owner, Phase,
    PermissionType, PlayerResources, ResourceMap, Unit, UnitStatus,
};

use crate::OrderResult;
use crate::dispatch::{eligible_orders, fail_order};

/// Run the Construction phase: MOBILIZATION and CONSTRUCTION orders in
/// FIFO order (spec.md §4.10).
pub async fn execute_construction_phase(
    store: &dyn Store,
    guild_id: GuildId,
    turn_number: u32,
) -> OrderResult<Vec<Event>> {
    let orders = eligible_orders(store, guild_id, Phase::Construction).await?;
    let mut events = Vec::new();

    for mut order in orders {
        let produced = match order.order_type {
            wargame_types::OrderType::Mobilization => handle_mobilization(store, guild_id, turn_number, &mut order).await?,
            wargame_types::OrderType::Construction => handle_construction(store, guild_id, turn_number, &mut order).await?,
            other => {
                let data = fail_order(&mut order, format!("no handler found for {other:?}"));
                vec![Event::new(turn_number, Phase::Construction, evt::CONSTRUCTION_FAILED, "order", order.id.into_inner(), guild_id, to_map(data))]
            }
        };
        store.upsert_order(&order).await?;
        events.extend(produced);
    }
    Ok(events)
}

fn to_map(value: Value) -> serde_json::Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    }
}

fn parse_owner(value: &Value) -> Option<Owner> {
    let kind = value.get("kind")?.as_str()?;
    let id = value.get("id")?.as_i64()?;
    match kind {
        "character" => Some(Owner::Character(CharacterId::new(id))),
        "faction" => Some(Owner::Faction(FactionId::new(id))),
        _ => None,
    }
}

/// Whether `character_id` may spend `owner`'s resources for a
/// mobilization/construction order: it must be the owning character
/// itself, or (for a faction owner) a COMMAND or FINANCIAL permission
/// holder, or the faction leader (spec.md §4.10 "Validate that the
/// acting character has the right").
async fn has_authority(store: &dyn Store, guild_id: GuildId, owner: Owner, character_id: Option<CharacterId>) -> OrderResult<bool> {
    let Some(character_id) = character_id else {
        return Ok(false);
    };
    match owner {
        Owner::Character(owner_id) => Ok(owner_id == character_id),
        Owner::Faction(faction_id) => {
            let Some(faction) = store.fetch_faction(faction_id).await? else {
                return Ok(false);
            };
            if faction.leader_character_id == Some(character_id) {
                return Ok(true);
            }
            Ok(store
                .list_permissions(guild_id, faction_id)
                .await?
                .iter()
                .any(|p| {
                    p.character_id == character_id
                        && matches!(p.permission_type, PermissionType::Command | PermissionType::Financial)
                }))
        }
    }
}

async fn owner_balance(store: &dyn Store, owner: Owner) -> OrderResult<ResourceMap> {
    Ok(match owner {
        Owner::Character(id) => store.fetch_player_resources(id).await?.balance,
        Owner::Faction(id) => store.fetch_faction_resources(id).await?.balance,
    })
}

async fn persist_owner_balance(store: &dyn Store, guild_id: GuildId, owner: Owner, balance: ResourceMap) -> OrderResult<()> {
    match owner {
        Owner::Character(character_id) => {
            store.upsert_player_resources(&PlayerResources { character_id, guild_id, balance }).await?;
        }
        Owner::Faction(faction_id) => {
            store.upsert_faction_resources(&FactionResources { faction_id, guild_id, balance }).await?;
        }
    }
    Ok(())
}

fn order_affected(order: &Order) -> Vec<i64> {
    order.character_id.map(|c| c.into_inner()).into_iter().collect()
}

async fn handle_mobilization(store: &dyn Store, guild_id: GuildId, turn_number: u32, order: &mut Order) -> OrderResult<Vec<Event>> {
    let Some(owner) = order.order_data.get("owner").and_then(parse_owner) else {
        return Ok(vec![construction_failed(turn_number, guild_id, order, evt::MOBILIZATION_FAILED, "order_data missing owner")]);
    };
    let Some(type_id) = order.order_data.get("unit_type").and_then(Value::as_str).map(str::to_owned) else {
        return Ok(vec![construction_failed(turn_number, guild_id, order, evt::MOBILIZATION_FAILED, "order_data missing unit_type")]);
    };
    let Some(unit_id) = order.order_data.get("unit_id").and_then(Value::as_str).map(str::to_owned) else {
        return Ok(vec![construction_failed(turn_number, guild_id, order, evt::MOBILIZATION_FAILED, "order_data missing unit_id")]);
    };
    let territory_id = order.order_data.get("territory_id").and_then(Value::as_str).map(wargame_types::TerritoryKey::from);

    if !has_authority(store, guild_id, owner, order.character_id).await? {
        return Ok(vec![construction_failed(turn_number, guild_id, order, evt::MOBILIZATION_FAILED, "not authorized to mobilize for this owner")]);
    }

    let nation = owner_nation(store, owner).await?;
    let rule_tables = store.load_rule_tables(guild_id).await?;
    let Some(unit_type) = rule_tables.unit_type(&type_id, nation.as_deref()) else {
        return Ok(vec![construction_failed(turn_number, guild_id, order, evt::MOBILIZATION_FAILED, format!("unknown unit type {type_id}"))]);
    };
    let costs = unit_type.costs;
    let max_organization = unit_type.organization_max;
    let is_naval = unit_type.is_naval;

    let mut balance = owner_balance(store, owner).await?;
    let outcome = deduct(&mut balance, &costs);
    if !outcome.is_full() {
        return Ok(vec![construction_failed(turn_number, guild_id, order, evt::MOBILIZATION_FAILED, "insufficient resources")]);
    }
    persist_owner_balance(store, guild_id, owner, balance).await?;

    let faction_id = match owner {
        Owner::Faction(f) => Some(f),
        Owner::Character(_) => None,
    };
    let assigned = store
        .insert_unit(&Unit {
            id: wargame_types::ids::UnitPk::new(0),
            guild_id,
            unit_id: wargame_types::ids::UnitKey::from(unit_id.as_str()),
            type_id,
            owner: Some(owner),
            commander_character_id: order.character_id,
            faction_id,
            current_territory_id: territory_id,
            organization: i32::try_from(max_organization).unwrap_or(i32::MAX),
            max_organization,
            status: UnitStatus::Active,
            is_naval,
        })
        .await?;

    order.status = OrderStatus::Success;
    order.result_data = Some(serde_json::json!({ "unit_id": unit_id, "cost": costs.to_json_map() }));

    let data = EventDataBuilder::new()
        .field("unit_id", unit_id)
        .field("cost", costs.to_json_map())
        .affected(order_affected(order))
        .build();
    Ok(vec![Event::new(turn_number, Phase::Construction, evt::UNIT_MOBILIZED, "unit", assigned.into_inner(), guild_id, data)])
}

async fn handle_construction(store: &dyn Store, guild_id: GuildId, turn_number: u32, order: &mut Order) -> OrderResult<Vec<Event>> {
    let Some(owner) = order.order_data.get("owner").and_then(parse_owner) else {
        return Ok(vec![construction_failed(turn_number, guild_id, order, evt::CONSTRUCTION_FAILED, "order_data missing owner")]);
    };
    let Some(building_type_id) = order.order_data.get("building_type").and_then(Value::as_str).map(str::to_owned) else {
        return Ok(vec![construction_failed(turn_number, guild_id, order, evt::CONSTRUCTION_FAILED, "order_data missing building_type")]);
    };
    let Some(building_id) = order.order_data.get("building_id").and_then(Value::as_str).map(str::to_owned) else {
        return Ok(vec![construction_failed(turn_number, guild_id, order, evt::CONSTRUCTION_FAILED, "order_data missing building_id")]);
    };
    let territory_id = order.order_data.get("territory_id").and_then(Value::as_str).map(wargame_types::TerritoryKey::from);

    if !has_authority(store, guild_id, owner, order.character_id).await? {
        return Ok(vec![construction_failed(turn_number, guild_id, order, evt::CONSTRUCTION_FAILED, "not authorized to build for this owner")]);
    }

    let rule_tables = store.load_rule_tables(guild_id).await?;
    let Some(building_type) = rule_tables.building_type(&building_type_id) else {
        return Ok(vec![construction_failed(turn_number, guild_id, order, evt::CONSTRUCTION_FAILED, format!("unknown building type {building_type_id}"))]);
    };
    let costs = building_type.costs;
    let upkeep = building_type.upkeep;

    let mut balance = owner_balance(store, owner).await?;
    let outcome = deduct(&mut balance, &costs);
    if !outcome.is_full() {
        return Ok(vec![construction_failed(turn_number, guild_id, order, evt::CONSTRUCTION_FAILED, "insufficient resources")]);
    }
    persist_owner_balance(store, guild_id, owner, balance).await?;

    let assigned = store
        .insert_building(&Building {
            id: wargame_types::ids::BuildingPk::new(0),
            guild_id,
            building_id: building_id.clone(),
            building_type: building_type_id,
            territory_id,
            durability: 1,
            status: BuildingStatus::Active,
            upkeep,
        })
        .await?;

    order.status = OrderStatus::Success;
    order.result_data = Some(serde_json::json!({ "building_id": building_id, "cost": costs.to_json_map() }));

    let data = EventDataBuilder::new()
        .field("building_id", building_id)
        .field("cost", costs.to_json_map())
        .affected(order_affected(order))
        .build();
    Ok(vec![Event::new(turn_number, Phase::Construction, evt::BUILDING_CONSTRUCTED, "building", assigned.into_inner(), guild_id, data)])
}

async fn owner_nation(store: &dyn Store, owner: Owner) -> OrderResult<Option<String>> {
    match owner {
        Owner::Character(character_id) => {
            let Some(character) = store.fetch_character(character_id).await? else {
                return Ok(None);
            };
            let Some(faction_id) = character.represented_faction_id else {
                return Ok(None);
            };
            Ok(store.fetch_faction(faction_id).await?.and_then(|f| f.nation))
        }
        Owner::Faction(faction_id) => Ok(store.fetch_faction(faction_id).await?.and_then(|f| f.nation)),
    }
}

fn construction_failed(turn_number: u32, guild_id: GuildId, order: &mut Order, event_type: &'static str, reason: impl Into<String>) -> Event {
    let reason = reason.into();
    fail_order(order, reason.clone());
    let data = EventDataBuilder::new()
        .field("error", reason)
        .field("order_id", order.id.into_inner())
        .affected(order_affected(order))
        .build();
    Event::new(turn_number, Phase::Construction, event_type, "order", order.id.into_inner(), guild_id, data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use wargame_store::InMemoryStore;
    use wargame_types::ids::OrderId;
    use wargame_types::{OrderType, UnitType};

    fn order(id: i64, order_type: OrderType, character_id: Option<CharacterId>, order_data: Value) -> Order {
        Order {
            id: OrderId::new(id),
            guild_id: GuildId::new(1),
            order_type,
            status: OrderStatus::Pending,
            priority: order_type.priority(),
            submitted_at: Utc::now(),
            character_id,
            submitting_faction_id: None,
            order_data,
            result_data: None,
            turn_submitted: 1,
            updated_at: Utc::now(),
            updated_turn: 1,
        }
    }

    #[tokio::test]
    async fn mobilization_deducts_cost_and_creates_unit() {
        let store = InMemoryStore::new();
        let guild_id = GuildId::new(1);
        store
            .seed_unit_type(UnitType {
                type_id: "infantry".to_owned(),
                guild_id,
                nation: None,
                movement: 2,
                organization_max: 10,
                attack: 1,
                defense: 1,
                siege_attack: 0,
                siege_defense: 0,
                costs: ResourceMap { ore: 5, ..Default::default() },
                upkeep: ResourceMap::default(),
                is_naval: false,
            })
            .await;
        store
            .upsert_player_resources(&PlayerResources { character_id: CharacterId::new(1), guild_id, balance: ResourceMap { ore: 10, ..Default::default() } })
            .await
            .unwrap();

        let order_data = serde_json::json!({
            "owner": {"kind": "character", "id": 1},
            "unit_type": "infantry",
            "unit_id": "U1",
            "territory_id": "T1",
        });
        store.upsert_order(&order(1, OrderType::Mobilization, Some(CharacterId::new(1)), order_data)).await.unwrap();

        let events = execute_construction_phase(&store, guild_id, 1).await.unwrap();
        assert_eq!(events[0].event_type, evt::UNIT_MOBILIZED);

        let resources = store.fetch_player_resources(CharacterId::new(1)).await.unwrap();
        assert_eq!(resources.balance.ore, 5);
        let stored = store
            .fetch_unit_by_key(guild_id, &wargame_types::ids::UnitKey::from("U1"))
            .await
            .unwrap();
        assert!(stored.is_some());
    }

    #[tokio::test]
    async fn mobilization_by_unauthorized_character_fails() {
        let store = InMemoryStore::new();
        let guild_id = GuildId::new(1);
        store
            .seed_unit_type(UnitType {
                type_id: "infantry".to_owned(),
                guild_id,
                nation: None,
                movement: 2,
                organization_max: 10,
                attack: 1,
                defense: 1,
                siege_attack: 0,
                siege_defense: 0,
                costs: ResourceMap::default(),
                upkeep: ResourceMap::default(),
                is_naval: false,
            })
            .await;

        let order_data = serde_json::json!({
            "owner": {"kind": "character", "id": 2},
            "unit_type": "infantry",
            "unit_id": "U1",
        });
        store.upsert_order(&order(1, OrderType::Mobilization, Some(CharacterId::new(1)), order_data)).await.unwrap();

        let events = execute_construction_phase(&store, guild_id, 1).await.unwrap();
        assert_eq!(events[0].event_type, evt::MOBILIZATION_FAILED);
        let stored = store.fetch_order(OrderId::new(1)).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Failed);
    }

    #[tokio::test]
    async fn insufficient_resources_fails_construction() {
        let store = InMemoryStore::new();
        let guild_id = GuildId::new(1);
        store
            .seed_building_type(wargame_types::BuildingType {
                type_id: "fort".to_owned(),
                guild_id,
                costs: ResourceMap { ore: 20, ..Default::default() },
                upkeep: ResourceMap::default(),
            })
            .await;

        let order_data = serde_json::json!({
            "owner": {"kind": "character", "id": 1},
            "building_type": "fort",
            "building_id": "B1",
        });
        store.upsert_order(&order(1, OrderType::Construction, Some(CharacterId::new(1)), order_data)).await.unwrap();

        let events = execute_construction_phase(&store, guild_id, 1).await.unwrap();
        assert_eq!(events[0].event_type, evt::CONSTRUCTION_FAILED);
    }
}
