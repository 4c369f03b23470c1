//! Resource collection phase: character production, territory production,
//! and the first-war production bonus, in that order (spec.md §4.5).

use std::collections::BTreeMap;

use wargame_events::{Event, EventDataBuilder, event_type::resource_collection as evt};
use wargame_ledger::{credit, sum};
use wargame_store::Store;
use wargame_types::ids::{CharacterId, FactionId};
use wargame_types::{GuildId, OrderStatus, OrderType, Owner, PermissionType, Phase, ResourceMap};

use crate::OrderResult;
use crate::dispatch::faction_recipients;

/// Run the Resource Collection phase, crediting character and faction
/// balances and returning the events it produced.
pub async fn execute_resource_collection_phase(
    store: &dyn Store,
    guild_id: GuildId,
    turn_number: u32,
) -> OrderResult<Vec<Event>> {
    let characters = store.list_characters(guild_id).await?;
    let territories = store.list_territories(guild_id).await?;

    let mut character_additions: BTreeMap<i64, ResourceMap> = BTreeMap::new();
    let mut character_war_bonus: BTreeMap<i64, ResourceMap> = BTreeMap::new();
    let mut faction_additions: BTreeMap<i64, ResourceMap> = BTreeMap::new();

    // Step 1: character production.
    for character in &characters {
        if !character.production.is_empty() {
            add_to(&mut character_additions, character.id.into_inner(), &character.production);
        }
    }

    // Step 2: territory production, skipping sacred land.
    for territory in &territories {
        if territory.sacred_land || territory.production.is_empty() {
            continue;
        }
        match territory.controller {
            Some(Owner::Character(character_id)) => {
                add_to(&mut character_additions, character_id.into_inner(), &territory.production);
            }
            Some(Owner::Faction(faction_id)) => {
                add_to(&mut faction_additions, faction_id.into_inner(), &territory.production);
            }
            None => {}
        }
    }

    // Step 3: first-war production bonus, for each DECLARE_WAR order that
    // succeeded this turn and was flagged by the Beginning phase.
    for order in store.list_orders_for_phase(guild_id, Phase::Beginning).await? {
        if order.order_type != OrderType::DeclareWar
            || order.status != OrderStatus::Success
            || order.updated_turn != turn_number
        {
            continue;
        }
        let flagged = order
            .result_data
            .as_ref()
            .and_then(|data| data.get("first_war_bonus"))
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);
        if !flagged {
            continue;
        }
        let Some(declaring_faction_id) = order.submitting_faction_id.or_else(|| {
            order
                .order_data
                .get("faction_id")
                .and_then(serde_json::Value::as_i64)
                .map(FactionId::new)
        }) else {
            continue;
        };

        for member in store.list_faction_members(guild_id, declaring_faction_id).await? {
            let Some(character) = store.fetch_character(member.character_id).await? else {
                continue;
            };
            let mut bonus = character.production;
            for territory in &territories {
                if territory.sacred_land {
                    continue;
                }
                if territory.controller == Some(Owner::Character(member.character_id)) {
                    bonus = sum(&bonus, &territory.production);
                }
            }
            if bonus.is_empty() {
                continue;
            }
            add_to(&mut character_additions, member.character_id.into_inner(), &bonus);
            add_to(&mut character_war_bonus, member.character_id.into_inner(), &bonus);
        }
    }

    // Step 4: credit balances and emit one event per affected entity.
    let mut events = Vec::new();
    for (character_id, addition) in &character_additions {
        let character_id = CharacterId::new(*character_id);
        let mut resources = store.fetch_player_resources(character_id).await?;
        credit(&mut resources.balance, addition);
        store.upsert_player_resources(&resources).await?;

        let mut builder = EventDataBuilder::new()
            .field("production", addition.to_json_map())
            .affected([character_id.into_inner()]);
        if let Some(war_bonus) = character_war_bonus.get(&character_id.into_inner()) {
            builder = builder.field("war_bonus", war_bonus.to_json_map());
        }
        events.push(Event::new(
            turn_number,
            Phase::ResourceCollection,
            evt::CHARACTER_PRODUCTION,
            "character",
            character_id.into_inner(),
            guild_id,
            builder.build(),
        ));
    }

    for (faction_id, addition) in &faction_additions {
        let faction_id = FactionId::new(*faction_id);
        let mut resources = store.fetch_faction_resources(faction_id).await?;
        credit(&mut resources.balance, addition);
        store.upsert_faction_resources(&resources).await?;

        let affected = faction_recipients(store, guild_id, faction_id, PermissionType::Financial).await?;
        let data = EventDataBuilder::new()
            .field("production", addition.to_json_map())
            .affected(affected)
            .build();
        events.push(Event::new(
            turn_number,
            Phase::ResourceCollection,
            evt::FACTION_TERRITORY_PRODUCTION,
            "faction",
            faction_id.into_inner(),
            guild_id,
            data,
        ));
    }

    Ok(events)
}

fn add_to(totals: &mut BTreeMap<i64, ResourceMap>, key: i64, amount: &ResourceMap) {
    totals
        .entry(key)
        .and_modify(|total| *total = sum(total, amount))
        .or_insert(*amount);
}
