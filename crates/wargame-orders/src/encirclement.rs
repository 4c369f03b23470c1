//! Encirclement phase: for each active land unit, test whether its
//! current territory can reach home-controlled ground without crossing
//! water or hostile territory (spec.md §4.7).

use std::collections::BTreeSet;

use wargame_events::{Event, EventDataBuilder, event_type::encirclement as evt};
use wargame_store::Store;
use wargame_types::ids::{CharacterId, FactionId};
use wargame_types::{GuildId, Owner, Phase, TerritoryKey, UnitStatus};
use wargame_world::{AdjacencyGraph, TerritoryIndex};

use crate::OrderResult;
use crate::hostility::home_faction;

/// Run the Encirclement phase, returning the events it produced and the
/// set of unit ids flagged `ENCIRCLED` (carried into Upkeep).
pub async fn execute_encirclement_phase(
    store: &dyn Store,
    guild_id: GuildId,
    turn_number: u32,
) -> OrderResult<(Vec<Event>, BTreeSet<i64>)> {
    let territories = store.list_territories(guild_id).await?;
    let adjacencies = store.list_adjacencies(guild_id).await?;
    let graph = AdjacencyGraph::build(&adjacencies);
    let index = TerritoryIndex::build(&territories);

    let characters = store.list_characters(guild_id).await?;
    let represented_faction = |character_id: CharacterId| -> Option<FactionId> {
        characters
            .iter()
            .find(|c| c.id == character_id)
            .and_then(|c| c.represented_faction_id)
    };

    let mut allies_cache: std::collections::HashMap<FactionId, Vec<FactionId>> = std::collections::HashMap::new();

    let mut events = Vec::new();
    let mut encircled = BTreeSet::new();

    for unit in store.list_units(guild_id).await? {
        if unit.status != UnitStatus::Active || unit.is_naval {
            continue;
        }
        let Some(territory_key) = unit.current_territory_id.clone() else {
            continue;
        };

        let Some(home_faction) = home_faction(store, unit.faction_id, unit.owner).await? else {
            continue;
        };

        let allies = if let Some(allies) = allies_cache.get(&home_faction) {
            allies.clone()
        } else {
            let allies = allied_factions_sync(store, guild_id, home_faction).await?;
            allies_cache.insert(home_faction, allies.clone());
            allies
        };

        let friendly = |owner: &Owner| -> bool {
            match owner {
                Owner::Faction(f) => *f == home_faction || allies.contains(f),
                Owner::Character(c) => {
                    represented_faction(*c).is_some_and(|f| f == home_faction || allies.contains(&f))
                }
            }
        };

        let passable = |key: &TerritoryKey| -> bool { is_passable(&index, key, &friendly) };
        let goal = |key: &TerritoryKey| -> bool { is_home_controlled(&index, key, &friendly) };

        if !graph.reachable(&territory_key, passable, goal) {
            encircled.insert(unit.id.into_inner());
            let affected = unit
                .commander_character_id
                .map(|c| c.into_inner())
                .into_iter()
                .collect::<Vec<_>>();
            let data = EventDataBuilder::new()
                .field("unit_id", unit.unit_id.to_string())
                .field("home_faction_id", home_faction.into_inner())
                .field("territory_id", territory_key.to_string())
                .affected(affected)
                .build();
            events.push(Event::new(
                turn_number,
                Phase::Encirclement,
                evt::UNIT_ENCIRCLED,
                "unit",
                unit.id.into_inner(),
                guild_id,
                data,
            ));
        }
    }

    Ok((events, encircled))
}

fn is_passable(index: &TerritoryIndex, key: &TerritoryKey, friendly: &impl Fn(&Owner) -> bool) -> bool {
    let Some(territory) = index.get(key) else {
        return false;
    };
    if territory.terrain_type.is_water() {
        return false;
    }
    match &territory.controller {
        None => true,
        Some(owner) => friendly(owner),
    }
}

fn is_home_controlled(index: &TerritoryIndex, key: &TerritoryKey, friendly: &impl Fn(&Owner) -> bool) -> bool {
    let Some(territory) = index.get(key) else {
        return false;
    };
    territory
        .controller
        .as_ref()
        .is_some_and(|owner| friendly(owner))
}

/// Every faction allied (status `ACTIVE`) to `faction_id`, transitively
/// closed (spec.md §4.7: "a faction allied to it").
async fn allied_factions_sync(
    store: &dyn Store,
    guild_id: GuildId,
    faction_id: FactionId,
) -> OrderResult<Vec<FactionId>> {
    let mut seen = BTreeSet::new();
    let mut frontier = vec![faction_id];
    seen.insert(faction_id.into_inner());

    while let Some(current) = frontier.pop() {
        for alliance in store.list_alliances_for_faction(guild_id, current).await? {
            if alliance.status != wargame_types::AllianceStatus::Active {
                continue;
            }
            let other = if alliance.faction_a_id == current {
                alliance.faction_b_id
            } else {
                alliance.faction_a_id
            };
            if seen.insert(other.into_inner()) {
                frontier.push(other);
            }
        }
    }
    seen.remove(&faction_id.into_inner());
    Ok(seen.into_iter().map(FactionId::new).collect())
}
