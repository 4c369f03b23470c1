//! Black-box integration tests against [`wargame_store::InMemoryStore`].
//!
//! These exercise the [`wargame_store::Store`] trait the way a phase
//! handler would -- no live `PostgreSQL` instance required, unlike a suite
//! built against `PgStore` would need (spec.md §9 "async/await").

use chrono::Utc;
use wargame_store::{InMemoryStore, Store};
use wargame_types::ids::{
    BuildingPk, CharacterId, FactionId, GuildId, TerritoryKey, TerritoryPk, UnitKey, UnitPk,
};
use wargame_types::{
    Alliance, AllianceStatus, Building, BuildingStatus, Guild, NavalUnitPosition, Owner,
    ResourceMap, TerrainType, Territory, TerritoryAdjacency, Unit, UnitStatus,
};

fn sample_territory(guild_id: GuildId, key: &str, controller: Option<Owner>) -> Territory {
    Territory {
        id: TerritoryPk::new(1),
        guild_id,
        territory_id: TerritoryKey::from(key),
        name: key.to_owned(),
        terrain_type: TerrainType::Plains,
        production: ResourceMap::default(),
        victory_points: 0,
        controller,
        original_nation: None,
        sacred_land: false,
    }
}

#[tokio::test]
async fn territory_controller_round_trips_as_character_owner() {
    let store = InMemoryStore::new();
    let guild_id = GuildId::new(1);
    let territory = sample_territory(guild_id, "T1", Some(Owner::Character(CharacterId::new(7))));
    store.upsert_territory(&territory).await.expect("upsert");

    let fetched = store
        .fetch_territory(guild_id, &TerritoryKey::from("T1"))
        .await
        .expect("fetch")
        .expect("present");
    assert_eq!(fetched.controller, Some(Owner::Character(CharacterId::new(7))));
}

#[tokio::test]
async fn territory_controller_round_trips_as_faction_owner() {
    let store = InMemoryStore::new();
    let guild_id = GuildId::new(1);
    let territory = sample_territory(guild_id, "T2", Some(Owner::Faction(FactionId::new(3))));
    store.upsert_territory(&territory).await.expect("upsert");

    let fetched = store
        .fetch_territory(guild_id, &TerritoryKey::from("T2"))
        .await
        .expect("fetch")
        .expect("present");
    assert_eq!(fetched.controller, Some(Owner::Faction(FactionId::new(3))));
}

#[tokio::test]
async fn adjacency_list_is_scoped_to_guild() {
    let store = InMemoryStore::new();
    store
        .upsert_territory(&sample_territory(GuildId::new(1), "T1", None))
        .await
        .expect("upsert");
    // Adjacencies are loaded as part of the rule tables, not mutated mid-turn
    // (spec.md §2 "Rule Tables"), so an empty guild has an empty edge set.
    let adjacencies = store.list_adjacencies(GuildId::new(1)).await.expect("list");
    assert!(adjacencies.is_empty());
}

#[tokio::test]
async fn unit_lookup_by_business_key_matches_internal_id() {
    let store = InMemoryStore::new();
    let guild_id = GuildId::new(1);
    let unit = Unit {
        id: UnitPk::new(10),
        guild_id,
        unit_id: UnitKey::from("U1"),
        type_id: "infantry".to_owned(),
        owner: Some(Owner::Character(CharacterId::new(1))),
        commander_character_id: None,
        faction_id: None,
        current_territory_id: Some(TerritoryKey::from("T1")),
        organization: 10,
        max_organization: 10,
        status: UnitStatus::Active,
        is_naval: false,
    };
    store.upsert_unit(&unit).await.expect("upsert");

    let by_key = store
        .fetch_unit_by_key(guild_id, &UnitKey::from("U1"))
        .await
        .expect("fetch")
        .expect("present");
    let by_id = store.fetch_unit(UnitPk::new(10)).await.expect("fetch").expect("present");
    assert_eq!(by_key.id, by_id.id);
}

#[tokio::test]
async fn naval_positions_are_replaced_wholesale_by_set() {
    let store = InMemoryStore::new();
    let guild_id = GuildId::new(1);
    let unit_id = UnitPk::new(5);
    let first = vec![
        NavalUnitPosition { unit_id, territory_id: TerritoryKey::from("A"), position_index: 0, guild_id },
        NavalUnitPosition { unit_id, territory_id: TerritoryKey::from("B"), position_index: 1, guild_id },
    ];
    store.set_naval_positions(guild_id, unit_id, &first).await.expect("set");
    assert_eq!(store.list_naval_positions(guild_id, unit_id).await.expect("list").len(), 2);

    let second = vec![NavalUnitPosition {
        unit_id,
        territory_id: TerritoryKey::from("C"),
        position_index: 0,
        guild_id,
    }];
    store.set_naval_positions(guild_id, unit_id, &second).await.expect("set");
    let positions = store.list_naval_positions(guild_id, unit_id).await.expect("list");
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].territory_id, TerritoryKey::from("C"));
}

#[tokio::test]
async fn alliance_round_trips_under_canonical_pair_regardless_of_argument_order() {
    let store = InMemoryStore::new();
    let guild_id = GuildId::new(1);
    let (a, b) = (FactionId::new(5), FactionId::new(2));
    let alliance = Alliance {
        faction_a_id: FactionId::new(2),
        faction_b_id: FactionId::new(5),
        status: AllianceStatus::PendingFactionB,
        initiated_by_faction_id: a,
        created_at: Utc::now(),
        activated_at: None,
        guild_id,
    };
    store.upsert_alliance(&alliance).await.expect("upsert");

    let fetched_ab = store.fetch_alliance(guild_id, a, b).await.expect("fetch").expect("present");
    let fetched_ba = store.fetch_alliance(guild_id, b, a).await.expect("fetch").expect("present");
    assert_eq!(fetched_ab, fetched_ba);
}

#[tokio::test]
async fn building_destroyed_status_round_trips() {
    let store = InMemoryStore::new();
    let guild_id = GuildId::new(1);
    let building = Building {
        id: BuildingPk::new(1),
        guild_id,
        building_id: "B1".to_owned(),
        building_type: "fort".to_owned(),
        territory_id: Some(TerritoryKey::from("T1")),
        durability: -1,
        status: BuildingStatus::Destroyed,
        upkeep: ResourceMap::default(),
    };
    store.upsert_building(&building).await.expect("upsert");
    let fetched = store.fetch_building(BuildingPk::new(1)).await.expect("fetch").expect("present");
    assert_eq!(fetched.status, BuildingStatus::Destroyed);
    assert_eq!(fetched.durability, -1);
}

#[tokio::test]
async fn turn_advances_exactly_once_per_call() {
    let store = InMemoryStore::new();
    store
        .seed_guild(Guild { id: GuildId::new(9), current_turn: 41, max_movement_stat: 6 })
        .await;
    let turn = store.advance_turn(GuildId::new(9)).await.expect("advance");
    assert_eq!(turn, 42);
}

#[test]
fn territory_adjacency_row_preserves_given_order() {
    let guild_id = GuildId::new(1);
    let edge = TerritoryAdjacency {
        guild_id,
        a: TerritoryKey::from("T1"),
        b: TerritoryKey::from("T2"),
    };
    assert_eq!(edge.a, TerritoryKey::from("T1"));
    assert_eq!(edge.b, TerritoryKey::from("T2"));
}
