//! Beginning phase: faction membership, commanders, victory-point
//! assignments, alliances, and war declarations (spec.md §4.2).
//!
//! Every handler produces events sharing `affected_character_ids`, which
//! drives per-character report filtering downstream. A handler never
//! returns an `Err` for a bad order -- invalid input becomes a `FAILED`
//! status plus an `ORDER_FAILED` event (spec.md §7).

use serde_json::json;
use wargame_events::{Event, EventDataBuilder, event_type::beginning as evt};
use wargame_store::Store;
use wargame_types::ids::{FactionId, OrderId};
use wargame_types::{
    Alliance, AllianceStatus, Faction, FactionMember, GuildId, Order, OrderType, PermissionType,
    Phase, War, WarParticipant, WarSide,
};

use crate::OrderResult;
use crate::dispatch::{eligible_orders, fail_order, faction_recipients};

/// Run every Beginning-phase order, in `(priority, submitted_at, id)`
/// order, and return the events they produced.
pub async fn execute_beginning_phase(
    store: &dyn Store,
    guild_id: GuildId,
    turn_number: u32,
) -> OrderResult<Vec<Event>> {
    let orders = eligible_orders(store, guild_id, Phase::Beginning).await?;
    let mut events = Vec::new();

    for mut order in orders {
        let produced = match order.order_type {
            OrderType::LeaveFaction => {
                handle_leave_faction(store, guild_id, turn_number, &mut order).await?
            }
            OrderType::KickFromFaction => {
                handle_kick_from_faction(store, guild_id, turn_number, &mut order).await?
            }
            OrderType::JoinFaction => {
                handle_join_faction(store, guild_id, turn_number, &mut order).await?
            }
            OrderType::AssignCommander => {
                handle_assign_commander(store, guild_id, turn_number, &mut order).await?
            }
            OrderType::AssignVictoryPoints => {
                handle_assign_victory_points(turn_number, &mut order)
            }
            OrderType::MakeAlliance => {
                handle_make_alliance(store, guild_id, turn_number, &mut order).await?
            }
            OrderType::DissolveAlliance => {
                handle_dissolve_alliance(store, guild_id, turn_number, &mut order).await?
            }
            OrderType::DeclareWar => {
                handle_declare_war(store, guild_id, turn_number, &mut order).await?
            }
            other => {
                let data = fail_order(&mut order, format!("no handler found for {other:?}"));
                vec![Event::new(
                    turn_number,
                    Phase::Beginning,
                    evt::ORDER_FAILED,
                    "order",
                    order.id.into_inner(),
                    guild_id,
                    to_map(data),
                )]
            }
        };
        store.upsert_order(&order).await?;
        events.extend(produced);
    }

    Ok(events)
}

fn to_map(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    match value {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    }
}

fn order_failed_event(
    turn_number: u32,
    guild_id: GuildId,
    order: &mut Order,
    reason: impl Into<String>,
) -> Event {
    let data = fail_order(order, reason);
    Event::new(
        turn_number,
        Phase::Beginning,
        evt::ORDER_FAILED,
        "order",
        order.id.into_inner(),
        guild_id,
        to_map(data),
    )
}

async fn handle_leave_faction(
    store: &dyn Store,
    guild_id: GuildId,
    turn_number: u32,
    order: &mut Order,
) -> OrderResult<Vec<Event>> {
    let Some(character_id) = order.character_id else {
        return Ok(vec![order_failed_event(turn_number, guild_id, order, "order has no character")]);
    };
    let Some(faction_id) = order
        .order_data
        .get("faction_id")
        .and_then(serde_json::Value::as_i64)
        .map(FactionId::new)
    else {
        return Ok(vec![order_failed_event(turn_number, guild_id, order, "order_data missing faction_id")]);
    };
    let Some(faction) = store.fetch_faction(faction_id).await? else {
        return Ok(vec![order_failed_event(turn_number, guild_id, order, "faction not found")]);
    };
    if faction.leader_character_id == Some(character_id) {
        return Ok(vec![order_failed_event(
            turn_number,
            guild_id,
            order,
            "assign a new leader first",
        )]);
    }

    let event = leave_faction_impl(
        store,
        guild_id,
        turn_number,
        &faction,
        character_id,
        evt::FACTION_LEFT,
        "character",
        character_id.into_inner(),
    )
    .await?;
    order.status = wargame_types::OrderStatus::Success;
    Ok(vec![event])
}

async fn handle_kick_from_faction(
    store: &dyn Store,
    guild_id: GuildId,
    turn_number: u32,
    order: &mut Order,
) -> OrderResult<Vec<Event>> {
    let Some(faction_id) = order
        .order_data
        .get("faction_id")
        .and_then(serde_json::Value::as_i64)
        .map(FactionId::new)
    else {
        return Ok(vec![order_failed_event(turn_number, guild_id, order, "order_data missing faction_id")]);
    };
    let Some(target_character_id) = order
        .order_data
        .get("target_character_id")
        .and_then(serde_json::Value::as_i64)
        .map(wargame_types::ids::CharacterId::new)
    else {
        return Ok(vec![order_failed_event(
            turn_number,
            guild_id,
            order,
            "order_data missing target_character_id",
        )]);
    };
    let Some(faction) = store.fetch_faction(faction_id).await? else {
        return Ok(vec![order_failed_event(turn_number, guild_id, order, "faction not found")]);
    };
    if faction.leader_character_id == Some(target_character_id) {
        return Ok(vec![order_failed_event(
            turn_number,
            guild_id,
            order,
            "assign a new leader first",
        )]);
    }

    let event = leave_faction_impl(
        store,
        guild_id,
        turn_number,
        &faction,
        target_character_id,
        evt::FACTION_KICKED,
        "character",
        target_character_id.into_inner(),
    )
    .await?;
    order.status = wargame_types::OrderStatus::Success;
    Ok(vec![event])
}

/// Shared body of LEAVE_FACTION/KICK_FROM_FACTION: delete the membership
/// row, re-point `represented_faction_id` if it was this faction, and
/// reassign faction-scoped unit ownership.
async fn leave_faction_impl(
    store: &dyn Store,
    guild_id: GuildId,
    turn_number: u32,
    faction: &Faction,
    character_id: wargame_types::ids::CharacterId,
    event_type: &str,
    entity_type: &str,
    entity_id: i64,
) -> OrderResult<Event> {
    store
        .delete_faction_member(guild_id, faction.id, character_id)
        .await?;

    if let Some(mut character) = store.fetch_character(character_id).await? {
        if character.represented_faction_id == Some(faction.id) {
            let remaining = store
                .list_memberships_for_character(guild_id, character_id)
                .await?;
            character.represented_faction_id = remaining
                .iter()
                .max_by_key(|m| m.joined_turn)
                .map(|m| m.faction_id);
            store.upsert_character(&character).await?;
        }
    }

    reassign_units_on_faction_departure(store, guild_id, faction.id, character_id).await?;

    let data = EventDataBuilder::new()
        .field("faction_id", faction.id.into_inner())
        .affected([character_id.into_inner()])
        .build();
    Ok(Event::new(turn_number, Phase::Beginning, event_type, entity_type, entity_id, guild_id, data))
}

/// Units personally owned by a departing character but assigned to the
/// faction they're leaving lose that faction assignment (spec.md §4.2
/// "reassign faction-scoped unit ownership").
async fn reassign_units_on_faction_departure(
    store: &dyn Store,
    guild_id: GuildId,
    faction_id: FactionId,
    character_id: wargame_types::ids::CharacterId,
) -> OrderResult<()> {
    for mut unit in store.list_units(guild_id).await? {
        let owned_by_character = matches!(unit.owner, Some(wargame_types::Owner::Character(c)) if c == character_id);
        if owned_by_character && unit.faction_id == Some(faction_id) {
            unit.faction_id = None;
            store.upsert_unit(&unit).await?;
        }
    }
    Ok(())
}

async fn handle_join_faction(
    store: &dyn Store,
    guild_id: GuildId,
    turn_number: u32,
    order: &mut Order,
) -> OrderResult<Vec<Event>> {
    let Some(character_id) = order.character_id else {
        return Ok(vec![order_failed_event(turn_number, guild_id, order, "order has no character")]);
    };
    let Some(faction_id) = order
        .order_data
        .get("faction_id")
        .and_then(serde_json::Value::as_i64)
        .map(FactionId::new)
    else {
        return Ok(vec![order_failed_event(turn_number, guild_id, order, "order_data missing faction_id")]);
    };
    if store.fetch_faction(faction_id).await?.is_none() {
        return Ok(vec![order_failed_event(turn_number, guild_id, order, "faction not found")]);
    }

    let existing_memberships = store
        .list_memberships_for_character(guild_id, character_id)
        .await?;
    let is_first_faction = existing_memberships.is_empty();

    store
        .upsert_faction_member(&FactionMember {
            faction_id,
            character_id,
            joined_turn: turn_number + 1,
            guild_id,
        })
        .await?;

    if is_first_faction {
        if let Some(mut character) = store.fetch_character(character_id).await? {
            character.represented_faction_id = Some(faction_id);
            store.upsert_character(&character).await?;
        }
    }

    order.status = wargame_types::OrderStatus::Success;
    let data = EventDataBuilder::new()
        .field("faction_id", faction_id.into_inner())
        .affected([character_id.into_inner()])
        .build();
    Ok(vec![Event::new(
        turn_number,
        Phase::Beginning,
        evt::FACTION_JOINED,
        "character",
        character_id.into_inner(),
        guild_id,
        data,
    )])
}

async fn handle_assign_commander(
    store: &dyn Store,
    guild_id: GuildId,
    turn_number: u32,
    order: &mut Order,
) -> OrderResult<Vec<Event>> {
    let Some(unit_key) = order
        .order_data
        .get("unit_id")
        .and_then(serde_json::Value::as_str)
        .map(wargame_types::ids::UnitKey::from)
    else {
        return Ok(vec![order_failed_event(turn_number, guild_id, order, "order_data missing unit_id")]);
    };
    let Some(commander_id) = order
        .order_data
        .get("commander_character_id")
        .and_then(serde_json::Value::as_i64)
        .map(wargame_types::ids::CharacterId::new)
    else {
        return Ok(vec![order_failed_event(
            turn_number,
            guild_id,
            order,
            "order_data missing commander_character_id",
        )]);
    };
    let Some(mut unit) = store.fetch_unit_by_key(guild_id, &unit_key).await? else {
        return Ok(vec![order_failed_event(turn_number, guild_id, order, "unit not found")]);
    };

    if let Some(faction_id) = unit.faction_id {
        let members = store.list_faction_members(guild_id, faction_id).await?;
        let is_member = members.iter().any(|m| m.character_id == commander_id);
        if !is_member {
            return Ok(vec![order_failed_event(
                turn_number,
                guild_id,
                order,
                "commander is not a member of the unit's faction",
            )]);
        }
    }

    unit.commander_character_id = Some(commander_id);
    store.upsert_unit(&unit).await?;

    order.status = wargame_types::OrderStatus::Success;
    let data = EventDataBuilder::new()
        .field("unit_id", unit.unit_id.to_string())
        .field("commander_character_id", commander_id.into_inner())
        .affected([commander_id.into_inner()])
        .build();
    Ok(vec![Event::new(
        turn_number,
        Phase::Beginning,
        evt::COMMANDER_ASSIGNED,
        "unit",
        unit.id.into_inner(),
        guild_id,
        data,
    )])
}

/// `ASSIGN_VICTORY_POINTS` is a standing order: its only effect is its
/// own status (spec.md §4.2 "VP totals are computed at read time"). A
/// `CANCELLED` status clears the assignment; anything else marks it
/// `ONGOING` so later turns keep re-reading it.
fn handle_assign_victory_points(turn_number: u32, order: &mut Order) -> Vec<Event> {
    let Some(faction_id) = order
        .order_data
        .get("target_faction_id")
        .and_then(serde_json::Value::as_i64)
        .map(FactionId::new)
    else {
        let data = fail_order(order, "order_data missing target_faction_id");
        return vec![Event::new(
            turn_number,
            Phase::Beginning,
            evt::ORDER_FAILED,
            "order",
            order.id.into_inner(),
            order.guild_id,
            to_map(data),
        )];
    };

    order.status = wargame_types::OrderStatus::Ongoing;
    let affected = order.character_id.map(|c| c.into_inner()).into_iter().collect::<Vec<_>>();
    let data = EventDataBuilder::new()
        .field("target_faction_id", faction_id.into_inner())
        .affected(affected)
        .build();
    vec![Event::new(
        turn_number,
        Phase::Beginning,
        evt::VICTORY_POINTS_ASSIGNED,
        "order",
        order.id.into_inner(),
        order.guild_id,
        data,
    )]
}

async fn handle_make_alliance(
    store: &dyn Store,
    guild_id: GuildId,
    turn_number: u32,
    order: &mut Order,
) -> OrderResult<Vec<Event>> {
    let Some(proposing_faction_id) = order
        .submitting_faction_id
        .or_else(|| order.order_data.get("faction_id").and_then(serde_json::Value::as_i64).map(FactionId::new))
    else {
        return Ok(vec![order_failed_event(turn_number, guild_id, order, "order has no submitting faction")]);
    };
    let Some(other_faction_id) = order
        .order_data
        .get("target_faction_id")
        .and_then(serde_json::Value::as_i64)
        .map(FactionId::new)
    else {
        return Ok(vec![order_failed_event(
            turn_number,
            guild_id,
            order,
            "order_data missing target_faction_id",
        )]);
    };

    let (a, b) = Alliance::canonical_pair(proposing_faction_id, other_faction_id);
    let existing = store.fetch_alliance(guild_id, a, b).await?;

    let (alliance, event_type) = match existing {
        None => {
            let status = if proposing_faction_id == a {
                AllianceStatus::PendingFactionA
            } else {
                AllianceStatus::PendingFactionB
            };
            (
                Alliance {
                    faction_a_id: a,
                    faction_b_id: b,
                    status,
                    initiated_by_faction_id: proposing_faction_id,
                    created_at: order.submitted_at,
                    activated_at: None,
                    guild_id,
                },
                evt::ALLIANCE_PROPOSED,
            )
        }
        Some(mut alliance) => {
            let other_side_already_proposed = match alliance.status {
                AllianceStatus::PendingFactionA => proposing_faction_id == b,
                AllianceStatus::PendingFactionB => proposing_faction_id == a,
                AllianceStatus::Active => false,
            };
            if !other_side_already_proposed {
                return Ok(vec![order_failed_event(
                    turn_number,
                    guild_id,
                    order,
                    "alliance already pending or active",
                )]);
            }
            alliance.status = AllianceStatus::Active;
            alliance.activated_at = Some(order.submitted_at);
            (alliance, evt::ALLIANCE_ACTIVATED)
        }
    };
    store.upsert_alliance(&alliance).await?;

    order.status = wargame_types::OrderStatus::Success;
    let affected = faction_recipients(store, guild_id, a, PermissionType::Command).await?;
    let mut affected = affected;
    affected.extend(faction_recipients(store, guild_id, b, PermissionType::Command).await?);
    let data = EventDataBuilder::new()
        .field("faction_a_id", a.into_inner())
        .field("faction_b_id", b.into_inner())
        .affected(affected)
        .build();
    Ok(vec![Event::new(
        turn_number,
        Phase::Beginning,
        event_type,
        "alliance",
        a.into_inner(),
        guild_id,
        data,
    )])
}

async fn handle_dissolve_alliance(
    store: &dyn Store,
    guild_id: GuildId,
    turn_number: u32,
    order: &mut Order,
) -> OrderResult<Vec<Event>> {
    let Some(proposing_faction_id) = order
        .submitting_faction_id
        .or_else(|| order.order_data.get("faction_id").and_then(serde_json::Value::as_i64).map(FactionId::new))
    else {
        return Ok(vec![order_failed_event(turn_number, guild_id, order, "order has no submitting faction")]);
    };
    let Some(other_faction_id) = order
        .order_data
        .get("target_faction_id")
        .and_then(serde_json::Value::as_i64)
        .map(FactionId::new)
    else {
        return Ok(vec![order_failed_event(
            turn_number,
            guild_id,
            order,
            "order_data missing target_faction_id",
        )]);
    };
    let (a, b) = Alliance::canonical_pair(proposing_faction_id, other_faction_id);
    if store.fetch_alliance(guild_id, a, b).await?.is_none() {
        return Ok(vec![order_failed_event(turn_number, guild_id, order, "alliance not found")]);
    }
    store.delete_alliance(guild_id, a, b).await?;

    order.status = wargame_types::OrderStatus::Success;
    let mut affected = faction_recipients(store, guild_id, a, PermissionType::Command).await?;
    affected.extend(faction_recipients(store, guild_id, b, PermissionType::Command).await?);
    let data = EventDataBuilder::new()
        .field("faction_a_id", a.into_inner())
        .field("faction_b_id", b.into_inner())
        .affected(affected)
        .build();
    Ok(vec![Event::new(
        turn_number,
        Phase::Beginning,
        evt::ALLIANCE_DISSOLVED,
        "alliance",
        a.into_inner(),
        guild_id,
        data,
    )])
}

async fn handle_declare_war(
    store: &dyn Store,
    guild_id: GuildId,
    turn_number: u32,
    order: &mut Order,
) -> OrderResult<Vec<Event>> {
    let Some(declaring_faction_id) = order
        .submitting_faction_id
        .or_else(|| order.order_data.get("faction_id").and_then(serde_json::Value::as_i64).map(FactionId::new))
    else {
        return Ok(vec![order_failed_event(turn_number, guild_id, order, "order has no submitting faction")]);
    };
    let Some(target_faction_id) = order
        .order_data
        .get("target_faction_id")
        .and_then(serde_json::Value::as_i64)
        .map(FactionId::new)
    else {
        return Ok(vec![order_failed_event(
            turn_number,
            guild_id,
            order,
            "order_data missing target_faction_id",
        )]);
    };
    let war_id_str = order
        .order_data
        .get("war_id")
        .and_then(serde_json::Value::as_str)
        .map_or_else(
            || format!("war-{}-{}", declaring_faction_id.into_inner(), order.id.into_inner()),
            str::to_owned,
        );
    let objective = order
        .order_data
        .get("objective")
        .and_then(serde_json::Value::as_str)
        .map(str::to_owned);

    let side_a_allies = allied_factions(store, guild_id, declaring_faction_id).await?;
    let side_b_allies = allied_factions(store, guild_id, target_faction_id).await?;

    let war_id = store
        .insert_war(&War {
            id: wargame_types::ids::WarId::new(0),
            guild_id,
            war_id: war_id_str.clone(),
            objective,
            declared_turn: turn_number,
        })
        .await?;

    let mut participants = Vec::new();
    for faction_id in std::iter::once(declaring_faction_id).chain(side_a_allies) {
        participants.push(WarParticipant {
            war_id,
            faction_id,
            side: WarSide::SideA,
            joined_turn: turn_number,
            is_original_declarer: faction_id == declaring_faction_id,
        });
    }
    for faction_id in std::iter::once(target_faction_id).chain(side_b_allies) {
        participants.push(WarParticipant {
            war_id,
            faction_id,
            side: WarSide::SideB,
            joined_turn: turn_number,
            is_original_declarer: faction_id == target_faction_id,
        });
    }
    for participant in &participants {
        store.upsert_war_participant(guild_id, participant).await?;
    }

    let prior_wars = store.list_wars(guild_id).await?;
    let is_first_war = {
        let prior_participants = store.list_war_participants(guild_id).await?;
        let declared_before = prior_wars
            .iter()
            .any(|w| w.id != war_id && prior_participants.iter().any(|p| p.war_id == w.id && p.faction_id == declaring_faction_id));
        !declared_before
    };
    if is_first_war {
        order.result_data = Some(json!({ "first_war_bonus": true }));
    }

    order.status = wargame_types::OrderStatus::Success;
    let mut affected = faction_recipients(store, guild_id, declaring_faction_id, PermissionType::Command).await?;
    affected.extend(faction_recipients(store, guild_id, target_faction_id, PermissionType::Command).await?);
    let data = EventDataBuilder::new()
        .field("war_id", war_id_str)
        .field("side_a_faction_id", declaring_faction_id.into_inner())
        .field("side_b_faction_id", target_faction_id.into_inner())
        .field("first_war_bonus", is_first_war)
        .affected(affected)
        .build();
    Ok(vec![Event::new(
        turn_number,
        Phase::Beginning,
        evt::WAR_DECLARED,
        "war",
        war_id.into_inner(),
        guild_id,
        data,
    )])
}

/// Every faction allied (status `ACTIVE`) to `faction_id`, transitively
/// closed once at declaration time (spec.md §4.2 "drags in allies of both
/// sides (transitively at declaration only)").
async fn allied_factions(
    store: &dyn Store,
    guild_id: GuildId,
    faction_id: FactionId,
) -> OrderResult<Vec<FactionId>> {
    let mut seen = std::collections::BTreeSet::new();
    let mut frontier = vec![faction_id];
    seen.insert(faction_id.into_inner());

    while let Some(current) = frontier.pop() {
        for alliance in store.list_alliances_for_faction(guild_id, current).await? {
            if alliance.status != AllianceStatus::Active {
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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use wargame_store::InMemoryStore;
    use wargame_types::ids::CharacterId;
    use wargame_types::{Character, FactionResources, PlayerResources, ResourceMap};

    fn base_order(order_type: OrderType, order_data: serde_json::Value) -> Order {
        Order {
            id: OrderId::new(1),
            guild_id: GuildId::new(1),
            order_type,
            status: wargame_types::OrderStatus::Pending,
            priority: order_type.priority(),
            submitted_at: Utc::now(),
            character_id: Some(CharacterId::new(1)),
            submitting_faction_id: None,
            order_data,
            result_data: None,
            turn_submitted: 1,
            updated_at: Utc::now(),
            updated_turn: 1,
        }
    }

    #[tokio::test]
    async fn join_faction_sets_representation_on_first_faction() {
        let store = InMemoryStore::new();
        let guild_id = GuildId::new(1);
        store
            .upsert_character(&Character {
                id: CharacterId::new(1),
                guild_id,
                identifier: "char-1".to_owned(),
                user_id: None,
                represented_faction_id: None,
                representation_changed_turn: None,
                victory_points: 0,
                production: ResourceMap::default(),
            })
            .await
            .expect("seed character");
        store
            .upsert_faction(&Faction {
                id: FactionId::new(1),
                guild_id,
                faction_id: "fac-1".to_owned(),
                leader_character_id: None,
                nation: None,
                created_turn: 1,
                starting_territory_count: 0,
                spending: ResourceMap::default(),
            })
            .await
            .expect("seed faction");

        let mut order = base_order(OrderType::JoinFaction, json!({ "faction_id": 1 }));
        let events = handle_join_faction(&store, guild_id, 1, &mut order).await.expect("handle");

        assert_eq!(order.status, wargame_types::OrderStatus::Success);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, evt::FACTION_JOINED);
        let character = store.fetch_character(CharacterId::new(1)).await.expect("fetch").expect("exists");
        assert_eq!(character.represented_faction_id, Some(FactionId::new(1)));
    }

    #[tokio::test]
    async fn leave_faction_fails_for_leader() {
        let store = InMemoryStore::new();
        let guild_id = GuildId::new(1);
        store
            .upsert_faction(&Faction {
                id: FactionId::new(1),
                guild_id,
                faction_id: "fac-1".to_owned(),
                leader_character_id: Some(CharacterId::new(1)),
                nation: None,
                created_turn: 1,
                starting_territory_count: 0,
                spending: ResourceMap::default(),
            })
            .await
            .expect("seed faction");

        let mut order = base_order(OrderType::LeaveFaction, json!({ "faction_id": 1 }));
        let events = handle_leave_faction(&store, guild_id, 1, &mut order).await.expect("handle");

        assert_eq!(order.status, wargame_types::OrderStatus::Failed);
        assert_eq!(events[0].event_type, evt::ORDER_FAILED);
    }

    #[tokio::test]
    async fn make_alliance_requires_two_submissions() {
        let store = InMemoryStore::new();
        let guild_id = GuildId::new(1);

        let mut first = base_order(OrderType::MakeAlliance, json!({ "target_faction_id": 2 }));
        first.submitting_faction_id = Some(FactionId::new(1));
        let events = handle_make_alliance(&store, guild_id, 1, &mut first).await.expect("handle");
        assert_eq!(events[0].event_type, evt::ALLIANCE_PROPOSED);

        let mut second = base_order(OrderType::MakeAlliance, json!({ "target_faction_id": 1 }));
        second.submitting_faction_id = Some(FactionId::new(2));
        let events = handle_make_alliance(&store, guild_id, 1, &mut second).await.expect("handle");
        assert_eq!(events[0].event_type, evt::ALLIANCE_ACTIVATED);
    }

    #[tokio::test]
    async fn declare_war_flags_first_war_bonus() {
        let store = InMemoryStore::new();
        let guild_id = GuildId::new(1);
        store
            .upsert_faction_resources(&FactionResources { faction_id: FactionId::new(1), guild_id, balance: ResourceMap::default() })
            .await
            .expect("seed faction resources");
        store
            .upsert_faction_resources(&FactionResources { faction_id: FactionId::new(2), guild_id, balance: ResourceMap::default() })
            .await
            .expect("seed faction resources");

        let mut order = base_order(OrderType::DeclareWar, json!({ "target_faction_id": 2 }));
        order.submitting_faction_id = Some(FactionId::new(1));
        let events = handle_declare_war(&store, guild_id, 1, &mut order).await.expect("handle");

        assert_eq!(order.status, wargame_types::OrderStatus::Success);
        assert_eq!(events[0].event_type, evt::WAR_DECLARED);
        assert_eq!(order.result_data.as_ref().and_then(|d| d.get("first_war_bonus")), Some(&json!(true)));

        let wars = store.list_wars(guild_id).await.expect("list");
        assert_eq!(wars.len(), 1);
        let participants = store.list_war_participants(guild_id).await.expect("list");
        assert_eq!(participants.len(), 2);
    }

    #[tokio::test]
    async fn assign_victory_points_is_ongoing_by_default() {
        let mut order = base_order(OrderType::AssignVictoryPoints, json!({ "target_faction_id": 1 }));
        let events = handle_assign_victory_points(1, &mut order);
        assert_eq!(order.status, wargame_types::OrderStatus::Ongoing);
        assert_eq!(events[0].event_type, evt::VICTORY_POINTS_ASSIGNED);
    }

    #[tokio::test]
    async fn unknown_order_type_is_unreachable_in_beginning_phase() {
        // Every OrderType routed to Beginning is handled explicitly above;
        // the catch-all arm in `execute_beginning_phase` exists only to
        // guard against a future OrderType being routed here without a
        // handler.
        for order_type in [
            OrderType::LeaveFaction,
            OrderType::KickFromFaction,
            OrderType::JoinFaction,
            OrderType::AssignCommander,
            OrderType::AssignVictoryPoints,
            OrderType::MakeAlliance,
            OrderType::DissolveAlliance,
            OrderType::DeclareWar,
        ] {
            assert_eq!(order_type.phase(), Phase::Beginning);
        }
    }
}
