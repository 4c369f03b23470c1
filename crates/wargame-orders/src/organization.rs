//! Organization phase: disband exhausted units, destroy ruined buildings,
//! then recover organization for units standing on friendly ground
//! (spec.md §4.9).

use wargame_events::{Event, EventDataBuilder, event_type::organization as evt};
use wargame_store::Store;
use wargame_types::ids::FactionId;
use wargame_types::{BuildingStatus, GuildId, Owner, Phase, UnitStatus};

use crate::OrderResult;

/// Run the Organization phase, returning the events it produced.
pub async fn execute_organization_phase(
    store: &dyn Store,
    guild_id: GuildId,
    turn_number: u32,
) -> OrderResult<Vec<Event>> {
    let mut events = disband_exhausted_units(store, guild_id, turn_number).await?;
    events.extend(destroy_ruined_buildings(store, guild_id, turn_number).await?);
    events.extend(recover_organization(store, guild_id, turn_number).await?);
    Ok(events)
}

/// Step 1: disband every `ACTIVE` unit with `organization <= 0` (spec.md
/// §4.9 step 1).
async fn disband_exhausted_units(store: &dyn Store, guild_id: GuildId, turn_number: u32) -> OrderResult<Vec<Event>> {
    let mut events = Vec::new();
    let mut units = store.list_units(guild_id).await?;
    units.sort_by_key(|u| u.id.into_inner());

    for mut unit in units {
        if unit.status != UnitStatus::Active || unit.organization > 0 {
            continue;
        }
        let owner_name = owner_name(store, unit.owner).await?;
        let final_organization = unit.organization;
        unit.status = UnitStatus::Disbanded;
        store.upsert_unit(&unit).await?;

        let mut builder = EventDataBuilder::new()
            .field("unit_id", unit.unit_id.to_string())
            .field("final_organization", final_organization);
        if let Some(owner_name) = owner_name {
            builder = builder.field("owner_name", owner_name);
        }
        let affected = unit.commander_character_id.map(|c| c.into_inner()).into_iter().collect::<Vec<_>>();
        events.push(Event::new(
            turn_number,
            Phase::Organization,
            evt::UNIT_DISBANDED,
            "unit",
            unit.id.into_inner(),
            guild_id,
            builder.affected(affected).build(),
        ));
    }
    Ok(events)
}

/// Step 2: destroy every `ACTIVE` building with `durability <= 0` (spec.md
/// §4.9 step 2).
async fn destroy_ruined_buildings(store: &dyn Store, guild_id: GuildId, turn_number: u32) -> OrderResult<Vec<Event>> {
    let mut events = Vec::new();
    let mut buildings = store.list_buildings(guild_id).await?;
    buildings.sort_by_key(|b| b.id.into_inner());

    for mut building in buildings {
        if building.status != BuildingStatus::Active || building.durability > 0 {
            continue;
        }
        building.status = BuildingStatus::Destroyed;
        store.upsert_building(&building).await?;

        let data = EventDataBuilder::new()
            .field("building_id", building.building_id.clone())
            .field("final_durability", building.durability)
            .build();
        events.push(Event::new(
            turn_number,
            Phase::Organization,
            evt::BUILDING_DESTROYED,
            "building",
            building.id.into_inner(),
            guild_id,
            data,
        ));
    }
    Ok(events)
}

/// Step 3: every `ACTIVE` unit below `max_organization`, standing in a
/// territory controlled by a member of its own faction, gains +1
/// organization, capped (spec.md §4.9 step 3).
async fn recover_organization(store: &dyn Store, guild_id: GuildId, turn_number: u32) -> OrderResult<Vec<Event>> {
    let territories = store.list_territories(guild_id).await?;
    let mut events = Vec::new();
    let mut units = store.list_units(guild_id).await?;
    units.sort_by_key(|u| u.id.into_inner());

    for mut unit in units {
        if unit.status != UnitStatus::Active {
            continue;
        }
        let max = i32::try_from(unit.max_organization).unwrap_or(i32::MAX);
        if unit.organization >= max {
            continue;
        }
        let Some(territory_key) = unit.current_territory_id.clone() else {
            continue;
        };
        let Some(home_faction) = crate::hostility::home_faction(store, unit.faction_id, unit.owner).await? else {
            continue;
        };
        let controller = territories
            .iter()
            .find(|t| t.territory_id == territory_key)
            .and_then(|t| t.controller);
        if !controlled_by_faction_member(store, guild_id, home_faction, controller).await? {
            continue;
        }

        unit.organization = (unit.organization + 1).min(max);
        store.upsert_unit(&unit).await?;

        let affected = unit.commander_character_id.map(|c| c.into_inner()).into_iter().collect::<Vec<_>>();
        let data = EventDataBuilder::new()
            .field("unit_id", unit.unit_id.to_string())
            .field("new_organization", unit.organization)
            .affected(affected)
            .build();
        events.push(Event::new(
            turn_number,
            Phase::Organization,
            evt::ORG_RECOVERY,
            "unit",
            unit.id.into_inner(),
            guild_id,
            data,
        ));
    }
    Ok(events)
}

async fn controlled_by_faction_member(
    store: &dyn Store,
    guild_id: GuildId,
    home_faction: FactionId,
    controller: Option<Owner>,
) -> OrderResult<bool> {
    match controller {
        Some(Owner::Faction(f)) => Ok(f == home_faction),
        Some(Owner::Character(c)) => Ok(store
            .list_faction_members(guild_id, home_faction)
            .await?
            .iter()
            .any(|m| m.character_id == c)),
        None => Ok(false),
    }
}

async fn owner_name(store: &dyn Store, owner: Option<Owner>) -> OrderResult<Option<String>> {
    Ok(match owner {
        Some(Owner::Character(c)) => store.fetch_character(c).await?.map(|c| c.identifier),
        Some(Owner::Faction(f)) => store.fetch_faction(f).await?.map(|f| f.faction_id),
        None => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wargame_store::InMemoryStore;
    use wargame_types::ids::{BuildingPk, CharacterId, TerritoryPk, UnitPk};
    use wargame_types::{Building, Character, FactionMember, ResourceMap, Territory, TerritoryKey};

    fn unit(id: i64, organization: i32, max_organization: u32, territory: Option<&str>, faction_id: Option<FactionId>) -> wargame_types::Unit {
        wargame_types::Unit {
            id: UnitPk::new(id),
            guild_id: GuildId::new(1),
            unit_id: wargame_types::ids::UnitKey::from(format!("U{id}").as_str()),
            type_id: "infantry".to_owned(),
            owner: faction_id.map(Owner::Faction),
            commander_character_id: None,
            faction_id,
            current_territory_id: territory.map(TerritoryKey::from),
            organization,
            max_organization,
            status: UnitStatus::Active,
            is_naval: false,
        }
    }

    #[tokio::test]
    async fn exhausted_unit_is_disbanded() {
        let store = InMemoryStore::new();
        let guild_id = GuildId::new(1);
        store.upsert_unit(&unit(1, 0, 10, None, None)).await.unwrap();

        let events = execute_organization_phase(&store, guild_id, 1).await.unwrap();
        assert_eq!(events[0].event_type, evt::UNIT_DISBANDED);

        let stored = store.fetch_unit(UnitPk::new(1)).await.unwrap().unwrap();
        assert_eq!(stored.status, UnitStatus::Disbanded);
    }

    #[tokio::test]
    async fn ruined_building_is_destroyed() {
        let store = InMemoryStore::new();
        let guild_id = GuildId::new(1);
        store
            .upsert_building(&Building {
                id: BuildingPk::new(1),
                guild_id,
                building_id: "B1".to_owned(),
                building_type: "fort".to_owned(),
                territory_id: None,
                durability: -1,
                status: BuildingStatus::Active,
                upkeep: ResourceMap::default(),
            })
            .await
            .unwrap();

        let events = execute_organization_phase(&store, guild_id, 1).await.unwrap();
        assert!(events.iter().any(|e| e.event_type == evt::BUILDING_DESTROYED));
        let building = store.fetch_building(BuildingPk::new(1)).await.unwrap().unwrap();
        assert_eq!(building.status, BuildingStatus::Destroyed);
    }

    #[tokio::test]
    async fn unit_on_own_faction_territory_recovers_organization() {
        let store = InMemoryStore::new();
        let guild_id = GuildId::new(1);
        let faction_id = FactionId::new(1);

        store
            .upsert_character(&Character {
                id: CharacterId::new(1),
                guild_id,
                identifier: "alice".to_owned(),
                user_id: None,
                represented_faction_id: Some(faction_id),
                representation_changed_turn: None,
                victory_points: 0,
                production: ResourceMap::default(),
            })
            .await
            .unwrap();
        store
            .upsert_faction_member(&FactionMember { faction_id, character_id: CharacterId::new(1), joined_turn: 1, guild_id })
            .await
            .unwrap();
        store
            .upsert_territory(&Territory {
                id: TerritoryPk::new(1),
                guild_id,
                territory_id: TerritoryKey::from("T1"),
                name: "T1".to_owned(),
                terrain_type: wargame_types::TerrainType::Plains,
                production: ResourceMap::default(),
                victory_points: 0,
                controller: Some(Owner::Character(CharacterId::new(1))),
                original_nation: None,
                sacred_land: false,
            })
            .await
            .unwrap();
        store.upsert_unit(&unit(1, 5, 10, Some("T1"), Some(faction_id))).await.unwrap();

        let events = execute_organization_phase(&store, guild_id, 1).await.unwrap();
        assert!(events.iter().any(|e| e.event_type == evt::ORG_RECOVERY));
        let stored = store.fetch_unit(UnitPk::new(1)).await.unwrap().unwrap();
        assert_eq!(stored.organization, 6);
    }
}
