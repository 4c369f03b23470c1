//! Upkeep phase: faction spending, then building upkeep, then unit
//! upkeep, in that order (spec.md §4.8).

use std::collections::{BTreeMap, BTreeSet};

use wargame_events::{Event, EventDataBuilder, event_type::upkeep as evt};
use wargame_ledger::deduct;
use wargame_store::Store;
use wargame_types::ids::{BuildingPk, CharacterId, FactionId, UnitPk};
use wargame_types::{Faction, GuildId, Owner, PermissionType, Phase, ResourceMap, UnitStatus};

use crate::OrderResult;
use crate::dispatch::faction_recipients;

/// Run the Upkeep phase. `encircled_unit_ids` comes from the preceding
/// Encirclement phase: those units skip resource deduction entirely.
pub async fn execute_upkeep_phase(
    store: &dyn Store,
    guild_id: GuildId,
    turn_number: u32,
    encircled_unit_ids: &BTreeSet<i64>,
) -> OrderResult<Vec<Event>> {
    let mut events = execute_faction_spending(store, guild_id, turn_number).await?;
    events.extend(execute_building_upkeep(store, guild_id, turn_number).await?);
    events.extend(execute_unit_upkeep(store, guild_id, turn_number, encircled_unit_ids).await?);
    Ok(events)
}

async fn faction_financial_holders(store: &dyn Store, guild_id: GuildId, faction: &Faction) -> OrderResult<Vec<i64>> {
    Ok(faction_recipients(store, guild_id, faction.id, PermissionType::Financial).await?)
}

async fn faction_command_holders(store: &dyn Store, guild_id: GuildId, faction: &Faction) -> OrderResult<Vec<i64>> {
    Ok(faction_recipients(store, guild_id, faction.id, PermissionType::Command).await?)
}

/// Faction spending: deduct each faction's `spending` field from its
/// resource balance (spec.md §4.8 "Faction spending").
async fn execute_faction_spending(
    store: &dyn Store,
    guild_id: GuildId,
    turn_number: u32,
) -> OrderResult<Vec<Event>> {
    let mut events = Vec::new();
    for faction in store.list_factions(guild_id).await? {
        if faction.spending.is_empty() {
            continue;
        }
        let mut resources = store.fetch_faction_resources(faction.id).await?;
        let outcome = deduct(&mut resources.balance, &faction.spending);
        store.upsert_faction_resources(&resources).await?;

        let affected = faction_financial_holders(store, guild_id, &faction).await?;
        if outcome.is_full() {
            let data = EventDataBuilder::new()
                .field("amounts_spent", outcome.paid.to_json_map())
                .affected(affected)
                .build();
            events.push(Event::new(
                turn_number,
                Phase::Upkeep,
                evt::FACTION_SPENDING,
                "faction",
                faction.id.into_inner(),
                guild_id,
                data,
            ));
        } else {
            let data = EventDataBuilder::new()
                .field("amounts_spent", outcome.paid.to_json_map())
                .field("shortfall", outcome.shortfall.to_json_map())
                .affected(affected)
                .build();
            events.push(Event::new(
                turn_number,
                Phase::Upkeep,
                evt::FACTION_SPENDING_PARTIAL,
                "faction",
                faction.id.into_inner(),
                guild_id,
                data,
            ));
        }
    }
    Ok(events)
}

/// Building upkeep: buildings processed in ascending `(durability,
/// territory_id, id)` order (spec.md §4.8 "Building upkeep").
async fn execute_building_upkeep(
    store: &dyn Store,
    guild_id: GuildId,
    turn_number: u32,
) -> OrderResult<Vec<Event>> {
    let territories = store.list_territories(guild_id).await?;
    let territory_by_key: BTreeMap<_, _> = territories
        .iter()
        .map(|t| (t.territory_id.clone(), t))
        .collect();
    let rule_tables = store.load_rule_tables(guild_id).await?;

    let mut buildings = store.list_buildings(guild_id).await?;
    buildings.sort_by(|a, b| {
        a.durability
            .cmp(&b.durability)
            .then_with(|| a.territory_id.cmp(&b.territory_id))
            .then_with(|| a.id.into_inner().cmp(&b.id.into_inner()))
    });

    let mut events = Vec::new();
    for mut building in buildings {
        if building.status != wargame_types::BuildingStatus::Active {
            continue;
        }
        let upkeep = rule_tables
            .building_type(&building.building_type)
            .map_or(building.upkeep, |bt| bt.upkeep);
        if upkeep.is_empty() {
            continue;
        }

        let controller = building
            .territory_id
            .as_ref()
            .and_then(|key| territory_by_key.get(key))
            .and_then(|territory| territory.controller);

        let (paid, deficit_types, affected) = match controller {
            None => (ResourceMap::default(), deficit_type_names(&upkeep), Vec::new()),
            Some(Owner::Character(character_id)) => {
                let mut resources = store.fetch_player_resources(character_id).await?;
                let outcome = deduct(&mut resources.balance, &upkeep);
                store.upsert_player_resources(&resources).await?;
                (outcome.paid, outcome.deficit_types(), vec![character_id.into_inner()])
            }
            Some(Owner::Faction(faction_id)) => {
                let mut resources = store.fetch_faction_resources(faction_id).await?;
                let outcome = deduct(&mut resources.balance, &upkeep);
                store.upsert_faction_resources(&resources).await?;
                let affected = if let Some(faction) = store.fetch_faction(faction_id).await? {
                    faction_financial_holders(store, guild_id, &faction).await?
                } else {
                    Vec::new()
                };
                (outcome.paid, outcome.deficit_types(), affected)
            }
        };

        let penalty = i32::try_from(deficit_types.len()).unwrap_or(i32::MAX);
        if penalty > 0 {
            building.durability -= penalty;
            store.upsert_building(&building).await?;
            let data = EventDataBuilder::new()
                .field("building_id", building.building_id.clone())
                .field("resources_paid", paid.to_json_map())
                .field(
                    "deficit_types",
                    deficit_types.iter().map(|r| r.as_str()).collect::<Vec<_>>(),
                )
                .field("durability_penalty", penalty)
                .field("new_durability", building.durability)
                .affected(affected)
                .build();
            events.push(Event::new(
                turn_number,
                Phase::Upkeep,
                evt::BUILDING_UPKEEP_DEFICIT,
                "building",
                building.id.into_inner(),
                guild_id,
                data,
            ));
        } else {
            let data = EventDataBuilder::new()
                .field("building_id", building.building_id.clone())
                .field("resources_paid", paid.to_json_map())
                .affected(affected)
                .build();
            events.push(Event::new(
                turn_number,
                Phase::Upkeep,
                evt::BUILDING_UPKEEP_PAID,
                "building",
                building.id.into_inner(),
                guild_id,
                data,
            ));
        }
    }
    Ok(events)
}

fn deficit_type_names(map: &ResourceMap) -> Vec<wargame_types::Resource> {
    map.iter().filter(|(_, amount)| *amount > 0).map(|(r, _)| r).collect()
}

enum Ownership {
    Character(CharacterId),
    Faction(FactionId),
}

/// Unit upkeep: `ACTIVE` units grouped by owner, processed in ascending
/// `id` order within a group, with a summary event per group (spec.md
/// §4.8 "Unit upkeep").
async fn execute_unit_upkeep(
    store: &dyn Store,
    guild_id: GuildId,
    turn_number: u32,
    encircled_unit_ids: &BTreeSet<i64>,
) -> OrderResult<Vec<Event>> {
    let rule_tables = store.load_rule_tables(guild_id).await?;
    let mut units = store.list_units(guild_id).await?;
    units.retain(|u| u.status == UnitStatus::Active);
    units.sort_by_key(|u| u.id.into_inner());

    let mut by_owner: BTreeMap<(u8, i64), Vec<UnitPk>> = BTreeMap::new();
    for unit in &units {
        let key = match unit.owner {
            Some(Owner::Character(c)) => (0u8, c.into_inner()),
            Some(Owner::Faction(f)) => (1u8, f.into_inner()),
            None => continue,
        };
        by_owner.entry(key).or_default().push(unit.id);
    }

    let mut events = Vec::new();
    for ((kind, owner_id), unit_ids) in by_owner {
        let ownership = if kind == 0 {
            Ownership::Character(CharacterId::new(owner_id))
        } else {
            Ownership::Faction(FactionId::new(owner_id))
        };

        let mut any_spending = false;
        let mut any_deficit = false;

        for unit_pk in unit_ids {
            let Some(mut unit) = store.fetch_unit(unit_pk).await? else {
                continue;
            };
            let nation = ownership_nation(store, guild_id, &ownership).await?;
            let unit_upkeep = rule_tables
                .unit_type(&unit.type_id, nation.as_deref())
                .map_or(ResourceMap::default(), |ut| ut.upkeep);
            if unit_upkeep.is_empty() {
                continue;
            }

            let affected = unit_affected(store, guild_id, &ownership, unit.commander_character_id).await?;

            if encircled_unit_ids.contains(&unit.id.into_inner()) {
                let penalty = i32::try_from(deficit_type_names(&unit_upkeep).len()).unwrap_or(i32::MAX);
                unit.organization -= penalty;
                store.upsert_unit(&unit).await?;
                any_deficit = true;
                let event_type = match ownership {
                    Ownership::Character(_) => evt::UPKEEP_ENCIRCLED,
                    Ownership::Faction(_) => evt::FACTION_UPKEEP_ENCIRCLED,
                };
                let data = EventDataBuilder::new()
                    .field("unit_id", unit.unit_id.to_string())
                    .field("organization_penalty", penalty)
                    .field("new_organization", unit.organization)
                    .affected(affected)
                    .build();
                events.push(Event::new(turn_number, Phase::Upkeep, event_type, "unit", unit.id.into_inner(), guild_id, data));
                continue;
            }

            let mut balance = ownership_balance(store, &ownership).await?;
            let outcome = deduct(&mut balance, &unit_upkeep);
            persist_ownership_balance(store, guild_id, &ownership, balance).await?;

            let penalty = outcome.deficit_type_count();
            #[allow(clippy::cast_possible_wrap)]
            let penalty_i32 = penalty as i32;
            unit.organization -= penalty_i32;
            store.upsert_unit(&unit).await?;

            any_spending = true;
            if !outcome.is_full() {
                any_deficit = true;
                let event_type = match ownership {
                    Ownership::Character(_) => evt::UPKEEP_DEFICIT,
                    Ownership::Faction(_) => evt::FACTION_UPKEEP_DEFICIT,
                };
                let data = EventDataBuilder::new()
                    .field("unit_id", unit.unit_id.to_string())
                    .field("resources_paid", outcome.paid.to_json_map())
                    .field(
                        "deficit_types",
                        outcome.deficit_types().iter().map(|r| r.as_str()).collect::<Vec<_>>(),
                    )
                    .field("organization_penalty", penalty)
                    .field("new_organization", unit.organization)
                    .affected(affected)
                    .build();
                events.push(Event::new(turn_number, Phase::Upkeep, event_type, "unit", unit.id.into_inner(), guild_id, data));
            }
        }

        if any_spending {
            let affected = owner_summary_affected(store, guild_id, &ownership).await?;
            let event_type = match ownership {
                Ownership::Character(_) => evt::UPKEEP_SUMMARY,
                Ownership::Faction(_) => evt::FACTION_UPKEEP_SUMMARY,
            };
            let data = EventDataBuilder::new().affected(affected.clone()).build();
            events.push(Event::new(turn_number, Phase::Upkeep, event_type, "owner", owner_id, guild_id, data));

            if any_deficit {
                let event_type = match ownership {
                    Ownership::Character(_) => evt::UPKEEP_TOTAL_DEFICIT,
                    Ownership::Faction(_) => evt::FACTION_UPKEEP_TOTAL_DEFICIT,
                };
                let data = EventDataBuilder::new().affected(affected).build();
                events.push(Event::new(turn_number, Phase::Upkeep, event_type, "owner", owner_id, guild_id, data));
            }
        }
    }

    Ok(events)
}

async fn ownership_nation(store: &dyn Store, guild_id: GuildId, ownership: &Ownership) -> OrderResult<Option<String>> {
    match ownership {
        Ownership::Character(character_id) => {
            let Some(character) = store.fetch_character(*character_id).await? else {
                return Ok(None);
            };
            let Some(faction_id) = character.represented_faction_id else {
                return Ok(None);
            };
            Ok(store.fetch_faction(faction_id).await?.and_then(|f| f.nation))
        }
        Ownership::Faction(faction_id) => Ok(store
            .fetch_faction(*faction_id)
            .await?
            .and_then(|f| f.nation)),
    }
}

async fn ownership_balance(store: &dyn Store, ownership: &Ownership) -> OrderResult<ResourceMap> {
    Ok(match ownership {
        Ownership::Character(character_id) => store.fetch_player_resources(*character_id).await?.balance,
        Ownership::Faction(faction_id) => store.fetch_faction_resources(*faction_id).await?.balance,
    })
}

async fn persist_ownership_balance(
    store: &dyn Store,
    guild_id: GuildId,
    ownership: &Ownership,
    balance: ResourceMap,
) -> OrderResult<()> {
    match ownership {
        Ownership::Character(character_id) => {
            store
                .upsert_player_resources(&wargame_types::PlayerResources { character_id: *character_id, guild_id, balance })
                .await?;
        }
        Ownership::Faction(faction_id) => {
            store
                .upsert_faction_resources(&wargame_types::FactionResources { faction_id: *faction_id, guild_id, balance })
                .await?;
        }
    }
    Ok(())
}

/// `affected_character_ids` for a per-unit event: the commander plus
/// (for faction-owned units) COMMAND-permission holders (spec.md §4.8
/// "Invariants").
async fn unit_affected(
    store: &dyn Store,
    guild_id: GuildId,
    ownership: &Ownership,
    commander: Option<CharacterId>,
) -> OrderResult<Vec<i64>> {
    let mut affected = Vec::new();
    if let Ownership::Faction(faction_id) = ownership {
        if let Some(faction) = store.fetch_faction(*faction_id).await? {
            affected.extend(faction_command_holders(store, guild_id, &faction).await?);
        }
    } else if let Ownership::Character(character_id) = ownership {
        affected.push(character_id.into_inner());
    }
    if let Some(commander) = commander {
        affected.push(commander.into_inner());
    }
    affected.sort_unstable();
    affected.dedup();
    Ok(affected)
}

async fn owner_summary_affected(store: &dyn Store, guild_id: GuildId, ownership: &Ownership) -> OrderResult<Vec<i64>> {
    match ownership {
        Ownership::Character(character_id) => Ok(vec![character_id.into_inner()]),
        Ownership::Faction(faction_id) => {
            if let Some(faction) = store.fetch_faction(*faction_id).await? {
                faction_command_holders(store, guild_id, &faction).await
            } else {
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wargame_store::InMemoryStore;
    use wargame_types::ids::{TerritoryPk, UnitPk};
    use wargame_types::{PlayerResources, Territory, TerritoryKey, Unit, UnitType};

    #[tokio::test]
    async fn encircled_unit_skips_resource_deduction() {
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
                upkeep: ResourceMap { rations: 2, ..Default::default() },
                is_naval: false,
            })
            .await;
        store
            .upsert_unit(&Unit {
                id: UnitPk::new(1),
                guild_id,
                unit_id: wargame_types::ids::UnitKey::from("U1"),
                type_id: "infantry".to_owned(),
                owner: Some(Owner::Character(CharacterId::new(1))),
                commander_character_id: None,
                faction_id: None,
                current_territory_id: None,
                organization: 5,
                max_organization: 10,
                status: UnitStatus::Active,
                is_naval: false,
            })
            .await
            .unwrap();
        store
            .upsert_player_resources(&PlayerResources { character_id: CharacterId::new(1), guild_id, balance: ResourceMap::default() })
            .await
            .unwrap();

        let encircled = BTreeSet::from([1]);
        let events = execute_upkeep_phase(&store, guild_id, 1, &encircled).await.unwrap();
        let encircled_event = events.iter().find(|e| e.event_type == evt::UPKEEP_ENCIRCLED).expect("encircled event");
        assert_eq!(encircled_event.data_i64("organization_penalty"), Some(1));

        let unit = store.fetch_unit(UnitPk::new(1)).await.unwrap().unwrap();
        assert_eq!(unit.organization, 4);
        let resources = store.fetch_player_resources(CharacterId::new(1)).await.unwrap();
        assert!(resources.balance.is_empty());
    }

    #[tokio::test]
    async fn building_upkeep_with_no_controller_is_full_deficit() {
        let store = InMemoryStore::new();
        let guild_id = GuildId::new(1);
        store
            .seed_building_type(wargame_types::BuildingType {
                type_id: "fort".to_owned(),
                guild_id,
                costs: ResourceMap::default(),
                upkeep: ResourceMap { ore: 2, lumber: 3, ..Default::default() },
            })
            .await;
        store
            .upsert_territory(&Territory {
                id: TerritoryPk::new(1),
                guild_id,
                territory_id: TerritoryKey::from("T1"),
                name: "T1".to_owned(),
                terrain_type: wargame_types::TerrainType::Plains,
                production: ResourceMap::default(),
                victory_points: 0,
                controller: None,
                original_nation: None,
                sacred_land: false,
            })
            .await
            .unwrap();
        store
            .upsert_building(&wargame_types::Building {
                id: BuildingPk::new(1),
                guild_id,
                building_id: "B1".to_owned(),
                building_type: "fort".to_owned(),
                territory_id: Some(TerritoryKey::from("T1")),
                durability: 5,
                status: wargame_types::BuildingStatus::Active,
                upkeep: ResourceMap::default(),
            })
            .await
            .unwrap();

        let events = execute_building_upkeep(&store, guild_id, 1).await.unwrap();
        assert_eq!(events[0].event_type, evt::BUILDING_UPKEEP_DEFICIT);
        assert_eq!(events[0].data_i64("durability_penalty"), Some(2));

        let building = store.fetch_building(BuildingPk::new(1)).await.unwrap().unwrap();
        assert_eq!(building.durability, 3);
    }
}
