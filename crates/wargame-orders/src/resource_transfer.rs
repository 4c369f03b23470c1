//! Resource transfer phase: cancellations, then one-time transfers, then
//! recurring transfers, in that order (spec.md §4.6).
//!
//! A transfer's `from`/`to` endpoints are carried in `order_data` as
//! `{"kind": "character" | "faction", "id": i64}`, matching the tagged
//! [`Owner`] union used everywhere else ownership is opaque over the two
//! kinds. `amounts` is a `{resource: amount}` map; a recurring transfer
//! additionally carries `turns_remaining` (absent means unbounded).

use serde_json::Value;
use wargame_events::{Event, EventDataBuilder, event_type::resource_transfer as evt};
use wargame_ledger::{credit, deduct};
use wargame_store::Store;
use wargame_types::ids::{CharacterId, FactionId, OrderId};
use wargame_types::{
    FactionResources, GuildId, Order, OrderStatus, OrderType, Owner, PermissionType, Phase,
    PlayerResources, Resource, ResourceMap,
};

use crate::OrderResult;
use crate::dispatch::{eligible_orders, fail_order, faction_recipients};

/// Run the Resource Transfer phase: all CANCEL_TRANSFER orders, then all
/// PENDING RESOURCE_TRANSFER orders, then all ONGOING ones (spec.md §4.6).
pub async fn execute_resource_transfer_phase(
    store: &dyn Store,
    guild_id: GuildId,
    turn_number: u32,
) -> OrderResult<Vec<Event>> {
    let orders = eligible_orders(store, guild_id, Phase::ResourceTransfer).await?;
    let (cancels, transfers): (Vec<Order>, Vec<Order>) =
        orders.into_iter().partition(|o| o.order_type == OrderType::CancelTransfer);
    let (pending, ongoing): (Vec<Order>, Vec<Order>) =
        transfers.into_iter().partition(|o| o.status == OrderStatus::Pending);

    let mut events = Vec::new();

    for mut order in cancels {
        let produced = handle_cancel_transfer(store, guild_id, turn_number, &mut order).await?;
        store.upsert_order(&order).await?;
        events.extend(produced);
    }
    for mut order in pending {
        let produced = execute_transfer(store, guild_id, turn_number, &mut order).await?;
        store.upsert_order(&order).await?;
        events.extend(produced);
    }
    for mut order in ongoing {
        let produced = execute_transfer(store, guild_id, turn_number, &mut order).await?;
        store.upsert_order(&order).await?;
        events.extend(produced);
    }

    Ok(events)
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

fn parse_amounts(value: &Value) -> ResourceMap {
    let mut map = ResourceMap::default();
    for resource in Resource::ALL {
        if let Some(amount) = value.get(resource.as_str()).and_then(Value::as_u64) {
            map.set(resource, amount);
        }
    }
    map
}

async fn entity_exists(store: &dyn Store, owner: Owner) -> OrderResult<bool> {
    Ok(match owner {
        Owner::Character(id) => store.fetch_character(id).await?.is_some(),
        Owner::Faction(id) => store.fetch_faction(id).await?.is_some(),
    })
}

async fn owner_balance(store: &dyn Store, owner: Owner) -> OrderResult<ResourceMap> {
    Ok(match owner {
        Owner::Character(id) => store.fetch_player_resources(id).await?.balance,
        Owner::Faction(id) => store.fetch_faction_resources(id).await?.balance,
    })
}

async fn persist_owner_balance(
    store: &dyn Store,
    guild_id: GuildId,
    owner: Owner,
    balance: ResourceMap,
) -> OrderResult<()> {
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

/// The characters an event touching `owner` should be visible to: the
/// character itself, or a faction's FINANCIAL-permission holders.
async fn owner_affected(store: &dyn Store, guild_id: GuildId, owner: Owner) -> OrderResult<Vec<i64>> {
    match owner {
        Owner::Character(id) => Ok(vec![id.into_inner()]),
        Owner::Faction(id) => Ok(faction_recipients(store, guild_id, id, PermissionType::Financial).await?),
    }
}

fn transfer_failed(turn_number: u32, guild_id: GuildId, order: &mut Order, reason: impl Into<String>) -> Event {
    let reason = reason.into();
    fail_order(order, reason.clone());
    let data = EventDataBuilder::new()
        .field("reason", reason)
        .field("order_id", order.id.into_inner())
        .build();
    Event::new(
        turn_number,
        Phase::ResourceTransfer,
        evt::RESOURCE_TRANSFER_FAILED,
        "order",
        order.id.into_inner(),
        guild_id,
        data,
    )
}

/// Execute one RESOURCE_TRANSFER order, whether a one-time (PENDING) or
/// recurring (ONGOING) transfer; both share the same deduct/credit body.
async fn execute_transfer(
    store: &dyn Store,
    guild_id: GuildId,
    turn_number: u32,
    order: &mut Order,
) -> OrderResult<Vec<Event>> {
    let Some(from) = order.order_data.get("from").and_then(parse_owner) else {
        return Ok(vec![transfer_failed(turn_number, guild_id, order, "order_data missing from")]);
    };
    let Some(to) = order.order_data.get("to").and_then(parse_owner) else {
        return Ok(vec![transfer_failed(turn_number, guild_id, order, "order_data missing to")]);
    };
    if !entity_exists(store, from).await? || !entity_exists(store, to).await? {
        return Ok(vec![transfer_failed(turn_number, guild_id, order, "sender or recipient no longer exists")]);
    }
    let requested = order.order_data.get("amounts").map_or_else(ResourceMap::default, parse_amounts);

    let is_ongoing_order = order.status == OrderStatus::Ongoing;
    let turns_remaining = order.order_data.get("turns_remaining").and_then(Value::as_i64);

    let mut sender_balance = owner_balance(store, from).await?;
    let outcome = deduct(&mut sender_balance, &requested);
    persist_owner_balance(store, guild_id, from, sender_balance).await?;

    let mut recipient_balance = owner_balance(store, to).await?;
    credit(&mut recipient_balance, &outcome.paid);
    persist_owner_balance(store, guild_id, to, recipient_balance).await?;

    let mut affected = owner_affected(store, guild_id, from).await?;
    affected.extend(owner_affected(store, guild_id, to).await?);
    if let Some(submitter) = order.character_id {
        affected.push(submitter.into_inner());
    }
    affected.sort_unstable();
    affected.dedup();

    let (term_completed, next_turns_remaining) = if is_ongoing_order {
        turns_remaining.map_or((false, None), |remaining| {
            let next = (remaining - 1).max(0);
            (next <= 0, Some(next))
        })
    } else {
        (false, None)
    };

    if let Some(next) = next_turns_remaining {
        if let Value::Object(map) = &mut order.order_data {
            map.insert("turns_remaining".to_owned(), Value::from(next));
        }
    }
    let still_ongoing = is_ongoing_order && !term_completed;
    order.status = if still_ongoing { OrderStatus::Ongoing } else { OrderStatus::Success };

    let event_type = if outcome.is_full() { evt::RESOURCE_TRANSFER_SUCCESS } else { evt::RESOURCE_TRANSFER_PARTIAL };
    let data = EventDataBuilder::new()
        .field("requested_resources", requested.to_json_map())
        .field("transferred_resources", outcome.paid.to_json_map())
        .field("is_ongoing", still_ongoing)
        .field("term_completed", term_completed)
        .field("turns_remaining", next_turns_remaining.unwrap_or(0))
        .affected(affected)
        .build();
    Ok(vec![Event::new(
        turn_number,
        Phase::ResourceTransfer,
        event_type,
        "order",
        order.id.into_inner(),
        guild_id,
        data,
    )])
}

async fn handle_cancel_transfer(
    store: &dyn Store,
    guild_id: GuildId,
    turn_number: u32,
    order: &mut Order,
) -> OrderResult<Vec<Event>> {
    let Some(target_id) = order
        .order_data
        .get("transfer_order_id")
        .and_then(Value::as_i64)
        .map(OrderId::new)
    else {
        return Ok(vec![transfer_failed(turn_number, guild_id, order, "order_data missing transfer_order_id")]);
    };
    let Some(mut target) = store.fetch_order(target_id).await? else {
        return Ok(vec![transfer_failed(turn_number, guild_id, order, "transfer order not found")]);
    };
    if !target.status.is_eligible() {
        return Ok(vec![transfer_failed(turn_number, guild_id, order, "transfer already terminal")]);
    }

    target.status = OrderStatus::Cancelled;
    store.upsert_order(&target).await?;
    order.status = OrderStatus::Success;

    let mut affected = Vec::new();
    if let Some(from) = target.order_data.get("from").and_then(parse_owner) {
        affected.extend(owner_affected(store, guild_id, from).await?);
    }
    if let Some(to) = target.order_data.get("to").and_then(parse_owner) {
        affected.extend(owner_affected(store, guild_id, to).await?);
    }
    affected.sort_unstable();
    affected.dedup();

    let data = EventDataBuilder::new()
        .field("transfer_order_id", target_id.into_inner())
        .affected(affected)
        .build();
    Ok(vec![Event::new(
        turn_number,
        Phase::ResourceTransfer,
        evt::TRANSFER_CANCELLED,
        "order",
        target_id.into_inner(),
        guild_id,
        data,
    )])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use wargame_store::InMemoryStore;
    use wargame_types::{Character, Faction};

    fn transfer_order(id: i64, status: OrderStatus, order_data: Value) -> Order {
        Order {
            id: OrderId::new(id),
            guild_id: GuildId::new(1),
            order_type: OrderType::ResourceTransfer,
            status,
            priority: OrderType::ResourceTransfer.priority(),
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

    async fn seed_characters(store: &InMemoryStore, guild_id: GuildId) {
        for id in [1, 2] {
            store
                .upsert_character(&Character {
                    id: CharacterId::new(id),
                    guild_id,
                    identifier: format!("char-{id}"),
                    user_id: None,
                    represented_faction_id: None,
                    representation_changed_turn: None,
                    victory_points: 0,
                    production: ResourceMap::default(),
                })
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn full_transfer_moves_full_amount() {
        let store = InMemoryStore::new();
        let guild_id = GuildId::new(1);
        seed_characters(&store, guild_id).await;
        store
            .upsert_player_resources(&PlayerResources {
                character_id: CharacterId::new(1),
                guild_id,
                balance: ResourceMap { ore: 10, ..Default::default() },
            })
            .await
            .unwrap();

        let order_data = serde_json::json!({
            "from": {"kind": "character", "id": 1},
            "to": {"kind": "character", "id": 2},
            "amounts": {"ore": 4},
        });
        store.upsert_order(&transfer_order(1, OrderStatus::Pending, order_data)).await.unwrap();

        let events = execute_resource_transfer_phase(&store, guild_id, 1).await.unwrap();
        assert_eq!(events[0].event_type, evt::RESOURCE_TRANSFER_SUCCESS);

        let sender = store.fetch_player_resources(CharacterId::new(1)).await.unwrap();
        let recipient = store.fetch_player_resources(CharacterId::new(2)).await.unwrap();
        assert_eq!(sender.balance.ore, 6);
        assert_eq!(recipient.balance.ore, 4);

        let order = store.fetch_order(OrderId::new(1)).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Success);
    }

    #[tokio::test]
    async fn partial_transfer_carries_requested_and_transferred() {
        let store = InMemoryStore::new();
        let guild_id = GuildId::new(1);
        seed_characters(&store, guild_id).await;
        store
            .upsert_player_resources(&PlayerResources {
                character_id: CharacterId::new(1),
                guild_id,
                balance: ResourceMap { ore: 5, ..Default::default() },
            })
            .await
            .unwrap();

        let order_data = serde_json::json!({
            "from": {"kind": "character", "id": 1},
            "to": {"kind": "character", "id": 2},
            "amounts": {"ore": 10},
        });
        store.upsert_order(&transfer_order(1, OrderStatus::Pending, order_data)).await.unwrap();

        let events = execute_resource_transfer_phase(&store, guild_id, 1).await.unwrap();
        assert_eq!(events[0].event_type, evt::RESOURCE_TRANSFER_PARTIAL);
        assert_eq!(events[0].event_data.get("requested_resources").and_then(|v| v.get("ore")), Some(&serde_json::json!(10)));
        assert_eq!(events[0].event_data.get("transferred_resources").and_then(|v| v.get("ore")), Some(&serde_json::json!(5)));
    }

    #[tokio::test]
    async fn ongoing_transfer_decrements_and_completes_on_final_tick() {
        let store = InMemoryStore::new();
        let guild_id = GuildId::new(1);
        seed_characters(&store, guild_id).await;

        let order_data = serde_json::json!({
            "from": {"kind": "character", "id": 1},
            "to": {"kind": "character", "id": 2},
            "amounts": {},
            "turns_remaining": 1,
        });
        store.upsert_order(&transfer_order(1, OrderStatus::Ongoing, order_data)).await.unwrap();

        let events = execute_resource_transfer_phase(&store, guild_id, 1).await.unwrap();
        assert_eq!(events[0].event_data.get("term_completed"), Some(&serde_json::json!(true)));
        let order = store.fetch_order(OrderId::new(1)).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Success);
    }

    #[tokio::test]
    async fn cancel_transfer_marks_target_cancelled() {
        let store = InMemoryStore::new();
        let guild_id = GuildId::new(1);
        seed_characters(&store, guild_id).await;

        let target_data = serde_json::json!({
            "from": {"kind": "character", "id": 1},
            "to": {"kind": "character", "id": 2},
            "amounts": {"ore": 1},
            "turns_remaining": 5,
        });
        store.upsert_order(&transfer_order(1, OrderStatus::Ongoing, target_data)).await.unwrap();

        let mut cancel = transfer_order(2, OrderStatus::Pending, serde_json::json!({ "transfer_order_id": 1 }));
        cancel.order_type = OrderType::CancelTransfer;
        cancel.priority = OrderType::CancelTransfer.priority();
        store.upsert_order(&cancel).await.unwrap();

        let events = execute_resource_transfer_phase(&store, guild_id, 1).await.unwrap();
        assert!(events.iter().any(|e| e.event_type == evt::TRANSFER_CANCELLED));
        let target = store.fetch_order(OrderId::new(1)).await.unwrap().unwrap();
        assert_eq!(target.status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn transfer_with_missing_recipient_fails() {
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
            .unwrap();

        let order_data = serde_json::json!({
            "from": {"kind": "character", "id": 1},
            "to": {"kind": "character", "id": 99},
            "amounts": {"ore": 1},
        });
        store.upsert_order(&transfer_order(1, OrderStatus::Pending, order_data)).await.unwrap();

        let events = execute_resource_transfer_phase(&store, guild_id, 1).await.unwrap();
        assert_eq!(events[0].event_type, evt::RESOURCE_TRANSFER_FAILED);
        let order = store.fetch_order(OrderId::new(1)).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Failed);
    }

    #[allow(dead_code)]
    fn unused_faction(guild_id: GuildId) -> Faction {
        Faction {
            id: FactionId::new(1),
            guild_id,
            faction_id: "f1".to_owned(),
            leader_character_id: None,
            nation: None,
            created_turn: 1,
            starting_territory_count: 0,
            spending: ResourceMap::default(),
        }
    }
}
