//! Combat phase: resolves every territory left contested after Movement
//! (spec.md §4.4).
//!
//! spec.md leaves the per-round arithmetic as "a pluggable rule"; the
//! contract it pins down is deterministic, side-symmetric, bounded
//! rounds, and one event per participating unit. This implementation
//! picks the minimal sufficient rule: each side's total `attack` stat is
//! dealt as organization damage to the opposing side, split evenly
//! across its units (remainder to the lowest unit ids, for
//! determinism), for up to [`MAX_ROUNDS`] or until one side has no
//! organization left. A territory with units from more than two mutually
//! hostile factions only fights the anchor faction (lowest `FactionId`)
//! against whichever other faction is at war with it; units from a third,
//! non-hostile faction are bystanders this combat.
//!
//! Organization is only ever reduced here, never disbanded -- the
//! Organization phase (spec.md §4.9) is the sole place `ACTIVE` units
//! transition to `DISBANDED`, matching the Upkeep phase's invariant that
//! a unit at `organization <= 0` waits for Organization to clean it up.

use std::collections::BTreeMap;

use wargame_events::{Event, EventDataBuilder, event_type::combat as evt};
use wargame_store::Store;
use wargame_store::rules::RuleTables;
use wargame_types::ids::{CharacterId, FactionId, TerritoryPk, UnitPk};
use wargame_types::{BuildingStatus, GuildId, Owner, Phase, TerritoryKey, Unit, UnitStatus};

use crate::OrderResult;
use crate::hostility::{WarMap, home_faction};

/// Upper bound on rounds fought in one territory in one turn.
const MAX_ROUNDS: u32 = 10;

/// Run the Combat phase, returning the events it produced.
pub async fn execute_combat_phase(
    store: &dyn Store,
    guild_id: GuildId,
    turn_number: u32,
) -> OrderResult<Vec<Event>> {
    let rule_tables = store.load_rule_tables(guild_id).await?;
    let war_map = WarMap::load(store, guild_id).await?;
    let units = store.list_units(guild_id).await?;

    let mut by_territory: BTreeMap<TerritoryKey, Vec<Unit>> = BTreeMap::new();
    for unit in units {
        if unit.status != UnitStatus::Active {
            continue;
        }
        if let Some(territory_id) = unit.current_territory_id.clone() {
            by_territory.entry(territory_id).or_default().push(unit);
        }
    }

    let territories = store.list_territories(guild_id).await?;
    let mut events = Vec::new();

    for (territory_id, mut occupants) in by_territory {
        occupants.sort_by_key(|u| u.id.into_inner());
        let Some(territory) = territories.iter().find(|t| t.territory_id == territory_id) else {
            continue;
        };

        let mut homes: BTreeMap<UnitPk, FactionId> = BTreeMap::new();
        for unit in &occupants {
            if let Some(faction) = home_faction(store, unit.faction_id, unit.owner).await? {
                homes.insert(unit.id, faction);
            }
        }

        let Some((side_a, side_b)) = split_sides(&occupants, &homes, &war_map) else {
            continue;
        };
        if side_a.is_empty() || side_b.is_empty() {
            continue;
        }

        let anchor = homes.get(&side_a[0]).copied();
        let defender = homes.get(&side_b[0]).copied();
        events.push(combat_started_event(
            turn_number,
            territory.id,
            &occupants,
            &homes,
        ));

        let mut organization: BTreeMap<UnitPk, i64> =
            occupants.iter().map(|u| (u.id, i64::from(u.organization))).collect();

        let mut round = 0u32;
        while round < MAX_ROUNDS
            && side_total_organization(&side_a, &organization) > 0
            && side_total_organization(&side_b, &organization) > 0
        {
            round += 1;
            let attack_a = side_total_attack(&side_a, &occupants, &rule_tables, &organization);
            let attack_b = side_total_attack(&side_b, &occupants, &rule_tables, &organization);
            apply_damage(&side_b, attack_a, &mut organization);
            apply_damage(&side_a, attack_b, &mut organization);
            events.push(Event::new(
                turn_number,
                Phase::Combat,
                evt::COMBAT_ROUND,
                "territory",
                territory.id.into_inner(),
                guild_id,
                EventDataBuilder::new()
                    .field("round", i64::from(round))
                    .field("damage_to_side_a", attack_b)
                    .field("damage_to_side_b", attack_a)
                    .affected(affected_characters(&occupants, &side_a, &side_b))
                    .build(),
            ));
        }

        for unit in &occupants {
            if let Some(&org) = organization.get(&unit.id) {
                let mut updated = unit.clone();
                updated.organization = i32::try_from(org.clamp(i64::from(i32::MIN), i64::from(i32::MAX)))
                    .unwrap_or(unit.organization);
                store.upsert_unit(&updated).await?;
            }
        }

        events.extend(
            damage_buildings(store, guild_id, turn_number, territory.id, &territory_id, round)
                .await?,
        );

        let a_alive = side_total_organization(&side_a, &organization) > 0;
        let b_alive = side_total_organization(&side_b, &organization) > 0;
        if a_alive && !b_alive {
            if let Some(winner) = anchor {
                events.push(capture_territory(store, turn_number, guild_id, territory, winner).await?);
            }
        } else if b_alive && !a_alive {
            if let Some(winner) = defender {
                events.push(capture_territory(store, turn_number, guild_id, territory, winner).await?);
            }
        } else if !a_alive && !b_alive {
            events.push(retreat_event(turn_number, guild_id, territory.id, &occupants, &side_a, &side_b));
        }

        events.push(Event::new(
            turn_number,
            Phase::Combat,
            evt::COMBAT_ENDED,
            "territory",
            territory.id.into_inner(),
            guild_id,
            EventDataBuilder::new()
                .field("rounds_fought", i64::from(round))
                .affected(affected_characters(&occupants, &side_a, &side_b))
                .build(),
        ));
    }

    Ok(events)
}

/// Partition a territory's occupants into two hostile sides: the
/// lowest-`FactionId` faction present (the anchor) against every other
/// present faction at war with it. Returns `None` if no two present
/// factions are hostile (not contested).
fn split_sides(
    occupants: &[Unit],
    homes: &BTreeMap<UnitPk, FactionId>,
    war_map: &WarMap,
) -> Option<(Vec<UnitPk>, Vec<UnitPk>)> {
    let mut factions: Vec<FactionId> = homes.values().copied().collect();
    factions.sort_unstable();
    factions.dedup();
    let anchor = *factions.first()?;
    let hostile_to_anchor: Vec<FactionId> = factions
        .iter()
        .copied()
        .filter(|f| *f != anchor && war_map.at_war(anchor, *f))
        .collect();
    if hostile_to_anchor.is_empty() {
        return None;
    }

    let side_a: Vec<UnitPk> = occupants
        .iter()
        .filter(|u| homes.get(&u.id) == Some(&anchor))
        .map(|u| u.id)
        .collect();
    let side_b: Vec<UnitPk> = occupants
        .iter()
        .filter(|u| homes.get(&u.id).is_some_and(|f| hostile_to_anchor.contains(f)))
        .map(|u| u.id)
        .collect();
    Some((side_a, side_b))
}

fn side_total_organization(side: &[UnitPk], organization: &BTreeMap<UnitPk, i64>) -> i64 {
    side.iter()
        .filter_map(|id| organization.get(id))
        .filter(|&&org| org > 0)
        .sum()
}

fn side_total_attack(
    side: &[UnitPk],
    occupants: &[Unit],
    rule_tables: &RuleTables,
    organization: &BTreeMap<UnitPk, i64>,
) -> i64 {
    side.iter()
        .filter_map(|id| {
            if organization.get(id).copied().unwrap_or(0) <= 0 {
                return None;
            }
            occupants.iter().find(|u| &u.id == id)
        })
        .filter_map(|unit| rule_tables.unit_type(&unit.type_id, None))
        .map(|ut| i64::from(ut.attack))
        .sum()
}

/// Split `total_damage` evenly across `side`'s surviving units, remainder
/// going to the lowest-id units first (deterministic tie-break, spec.md
/// §5 "All sorts, scans, and tie-breaks must therefore use total
/// orderings").
fn apply_damage(side: &[UnitPk], total_damage: i64, organization: &mut BTreeMap<UnitPk, i64>) {
    let alive: Vec<UnitPk> = side
        .iter()
        .copied()
        .filter(|id| organization.get(id).copied().unwrap_or(0) > 0)
        .collect();
    if alive.is_empty() || total_damage <= 0 {
        return;
    }
    let count = i64::try_from(alive.len()).unwrap_or(1).max(1);
    let base = total_damage / count;
    let remainder = total_damage % count;
    for (index, unit_id) in alive.iter().enumerate() {
        let index = i64::try_from(index).unwrap_or(i64::MAX);
        let extra = i64::from(index < remainder);
        if let Some(org) = organization.get_mut(unit_id) {
            *org -= base + extra;
        }
    }
}

fn affected_characters(occupants: &[Unit], side_a: &[UnitPk], side_b: &[UnitPk]) -> Vec<i64> {
    let mut ids = Vec::new();
    for unit in occupants {
        if !side_a.contains(&unit.id) && !side_b.contains(&unit.id) {
            continue;
        }
        if let Some(commander) = unit.commander_character_id {
            ids.push(commander.into_inner());
        }
        if let Some(Owner::Character(owner)) = unit.owner {
            ids.push(owner.into_inner());
        }
    }
    ids.sort_unstable();
    ids.dedup();
    ids
}

fn combat_started_event(
    turn_number: u32,
    territory_pk: TerritoryPk,
    occupants: &[Unit],
    homes: &BTreeMap<UnitPk, FactionId>,
) -> Event {
    let guild_id = occupants
        .first()
        .map(|u| u.guild_id)
        .unwrap_or_else(|| wargame_types::ids::GuildId::new(0));
    let participants: Vec<i64> = occupants
        .iter()
        .filter(|u| homes.contains_key(&u.id))
        .map(|u| u.id.into_inner())
        .collect();
    let affected: Vec<CharacterId> = occupants
        .iter()
        .filter_map(|u| u.commander_character_id)
        .collect();
    Event::new(
        turn_number,
        Phase::Combat,
        evt::COMBAT_STARTED,
        "territory",
        territory_pk.into_inner(),
        guild_id,
        EventDataBuilder::new()
            .field("participant_unit_ids", participants)
            .affected(affected.into_iter().map(CharacterId::into_inner))
            .build(),
    )
}

/// Hand `territory` to `winner` and emit `TERRITORY_CAPTURED`. Writes the
/// new controller back to the store so the capture actually sticks for
/// the rest of this turn and every later one -- Resource Collection
/// (spec.md §4.5), Organization's recovery check (§4.9), and
/// Encirclement's friendly-territory check (§4.7) all read
/// `territory.controller` off the store, not off the combat event.
async fn capture_territory(
    store: &dyn Store,
    turn_number: u32,
    guild_id: GuildId,
    territory: &wargame_types::Territory,
    winner: FactionId,
) -> OrderResult<Event> {
    let mut updated = territory.clone();
    updated.controller = Some(Owner::Faction(winner));
    store.upsert_territory(&updated).await?;

    Ok(Event::new(
        turn_number,
        Phase::Combat,
        evt::TERRITORY_CAPTURED,
        "territory",
        territory.id.into_inner(),
        guild_id,
        EventDataBuilder::new()
            .field("territory_id", territory.territory_id.to_string())
            .field("new_controller_faction_id", winner.into_inner())
            .build(),
    ))
}

fn retreat_event(
    turn_number: u32,
    guild_id: GuildId,
    territory_pk: TerritoryPk,
    occupants: &[Unit],
    side_a: &[UnitPk],
    side_b: &[UnitPk],
) -> Event {
    Event::new(
        turn_number,
        Phase::Combat,
        evt::RETREAT,
        "territory",
        territory_pk.into_inner(),
        guild_id,
        EventDataBuilder::new()
            .field("reason", "round_cap_reached_without_elimination")
            .affected(affected_characters(occupants, side_a, side_b))
            .build(),
    )
}

/// Buildings standing in a contested territory take siege damage
/// proportional to the rounds actually fought (spec.md §4.4
/// `BUILDING_COMBAT_DAMAGE`).
async fn damage_buildings(
    store: &dyn Store,
    guild_id: GuildId,
    turn_number: u32,
    territory_pk: TerritoryPk,
    territory_id: &TerritoryKey,
    rounds_fought: u32,
) -> OrderResult<Vec<Event>> {
    if rounds_fought == 0 {
        return Ok(Vec::new());
    }
    let mut events = Vec::new();
    let mut buildings = store.list_buildings(guild_id).await?;
    buildings.sort_by_key(|b| b.id.into_inner());
    for mut building in buildings {
        if building.status != BuildingStatus::Active {
            continue;
        }
        if building.territory_id.as_ref() != Some(territory_id) {
            continue;
        }
        let damage = i32::try_from(rounds_fought).unwrap_or(i32::MAX);
        building.durability -= damage;
        store.upsert_building(&building).await?;
        events.push(Event::new(
            turn_number,
            Phase::Combat,
            evt::BUILDING_COMBAT_DAMAGE,
            "building",
            building.id.into_inner(),
            guild_id,
            EventDataBuilder::new()
                .field("territory_id", territory_pk.into_inner())
                .field("damage", i64::from(damage))
                .field("new_durability", i64::from(building.durability))
                .build(),
        ));
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wargame_store::InMemoryStore;
    use wargame_types::ids::{TerritoryPk, UnitPk, WarId};
    use wargame_types::{ResourceMap, TerrainType, Territory, UnitType, WarParticipant, WarSide};

    fn territory(guild_id: GuildId, key: &str) -> Territory {
        Territory {
            id: TerritoryPk::new(1),
            guild_id,
            territory_id: TerritoryKey::from(key),
            name: key.to_owned(),
            terrain_type: TerrainType::Plains,
            production: ResourceMap::default(),
            victory_points: 0,
            controller: None,
            original_nation: None,
            sacred_land: false,
        }
    }

    fn unit(id: i64, faction_id: FactionId, territory: &str, organization: i32) -> Unit {
        Unit {
            id: UnitPk::new(id),
            guild_id: GuildId::new(1),
            unit_id: wargame_types::ids::UnitKey::from(format!("U{id}").as_str()),
            type_id: "infantry".to_owned(),
            owner: Some(Owner::Faction(faction_id)),
            commander_character_id: None,
            faction_id: Some(faction_id),
            current_territory_id: Some(TerritoryKey::from(territory)),
            organization,
            max_organization: 10,
            status: UnitStatus::Active,
            is_naval: false,
        }
    }

    async fn setup_war(store: &InMemoryStore, guild_id: GuildId, a: FactionId, b: FactionId) {
        store
            .upsert_war_participant(
                guild_id,
                &WarParticipant { war_id: WarId::new(1), faction_id: a, side: WarSide::SideA, joined_turn: 1, is_original_declarer: true },
            )
            .await
            .unwrap();
        store
            .upsert_war_participant(
                guild_id,
                &WarParticipant { war_id: WarId::new(1), faction_id: b, side: WarSide::SideB, joined_turn: 1, is_original_declarer: true },
            )
            .await
            .unwrap();
    }

    fn infantry_type(guild_id: GuildId) -> UnitType {
        UnitType {
            type_id: "infantry".to_owned(),
            guild_id,
            nation: None,
            movement: 1,
            organization_max: 10,
            attack: 5,
            defense: 1,
            siege_attack: 0,
            siege_defense: 0,
            costs: ResourceMap::default(),
            upkeep: ResourceMap::default(),
            is_naval: false,
        }
    }

    #[tokio::test]
    async fn two_hostile_stacks_fight_until_one_exhausted() {
        let store = InMemoryStore::new();
        let guild_id = GuildId::new(1);
        let faction_a = FactionId::new(1);
        let faction_b = FactionId::new(2);
        setup_war(&store, guild_id, faction_a, faction_b).await;
        store.seed_unit_type(infantry_type(guild_id)).await;
        store.upsert_territory(&territory(guild_id, "T1")).await.unwrap();
        store.upsert_unit(&unit(1, faction_a, "T1", 10)).await.unwrap();
        store.upsert_unit(&unit(2, faction_b, "T1", 1)).await.unwrap();

        let events = execute_combat_phase(&store, guild_id, 1).await.unwrap();
        assert!(events.iter().any(|e| e.event_type == evt::COMBAT_STARTED));
        assert!(events.iter().any(|e| e.event_type == evt::COMBAT_ENDED));

        let survivor = store.fetch_unit(UnitPk::new(1)).await.unwrap().unwrap();
        assert_eq!(survivor.organization, 10);
        let loser = store.fetch_unit(UnitPk::new(2)).await.unwrap().unwrap();
        assert!(loser.organization <= 0);
    }

    #[tokio::test]
    async fn uncontested_territory_produces_no_events() {
        let store = InMemoryStore::new();
        let guild_id = GuildId::new(1);
        let faction_a = FactionId::new(1);
        store.upsert_territory(&territory(guild_id, "T1")).await.unwrap();
        store.upsert_unit(&unit(1, faction_a, "T1", 10)).await.unwrap();

        let events = execute_combat_phase(&store, guild_id, 1).await.unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn decisive_victory_captures_the_territory_in_the_store() {
        let store = InMemoryStore::new();
        let guild_id = GuildId::new(1);
        let faction_a = FactionId::new(1);
        let faction_b = FactionId::new(2);
        setup_war(&store, guild_id, faction_a, faction_b).await;
        store.seed_unit_type(infantry_type(guild_id)).await;
        store.upsert_territory(&territory(guild_id, "T1")).await.unwrap();
        store.upsert_unit(&unit(1, faction_a, "T1", 10)).await.unwrap();
        store.upsert_unit(&unit(2, faction_b, "T1", 1)).await.unwrap();

        let events = execute_combat_phase(&store, guild_id, 1).await.unwrap();
        let capture = events
            .iter()
            .find(|e| e.event_type == evt::TERRITORY_CAPTURED)
            .expect("decisive combat emits TERRITORY_CAPTURED");
        assert_eq!(
            capture.event_data.get("new_controller_faction_id"),
            Some(&serde_json::json!(faction_a.into_inner())),
        );

        let stored = store.list_territories(guild_id).await.unwrap();
        let t1 = stored.iter().find(|t| t.territory_id == TerritoryKey::from("T1")).unwrap();
        assert_eq!(t1.controller, Some(Owner::Faction(faction_a)));
    }

    #[tokio::test]
    async fn allied_units_never_fight() {
        let store = InMemoryStore::new();
        let guild_id = GuildId::new(1);
        let faction_a = FactionId::new(1);
        let faction_c = FactionId::new(3);
        store.upsert_territory(&territory(guild_id, "T1")).await.unwrap();
        store.upsert_unit(&unit(1, faction_a, "T1", 10)).await.unwrap();
        store.upsert_unit(&unit(2, faction_c, "T1", 10)).await.unwrap();

        let events = execute_combat_phase(&store, guild_id, 1).await.unwrap();
        assert!(events.is_empty());
    }
}
