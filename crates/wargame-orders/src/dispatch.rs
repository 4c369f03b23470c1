//! Shared helper for loading a phase's eligible orders in dispatch order.
//!
//! Every phase handler starts the same way: pull every order the store
//! has routed to this phase, drop anything already terminal, and sort by
//! [`wargame_types::Order::sort_key`] (priority, then submission time,
//! then id). This is that one step, factored out so each phase module
//! only has to write its own per-order-type behavior.

use wargame_store::Store;
use wargame_store::error::StoreError;
use wargame_types::ids::FactionId;
use wargame_types::{FactionPermission, GuildId, Order, OrderStatus, PermissionType, Phase};

/// Fetch and sort the orders a phase must consider this turn.
pub async fn eligible_orders(
    store: &dyn Store,
    guild_id: GuildId,
    phase: Phase,
) -> Result<Vec<Order>, StoreError> {
    let mut orders: Vec<Order> = store
        .list_orders_for_phase(guild_id, phase)
        .await?
        .into_iter()
        .filter(|order| order.status.is_eligible())
        .collect();
    orders.sort_by_key(Order::sort_key);
    Ok(orders)
}

/// The `affected_character_ids` set for a faction-scoped event: every
/// holder of `permission_type` plus the faction leader, who holds every
/// permission implicitly (spec.md §3 `FactionPermission`). Shared by
/// Beginning (alliance/war events), Resource Collection, Resource
/// Transfer, Upkeep and Construction instead of each phase recomputing
/// the same join (spec.md §9 `faction_events.py` supplement).
pub async fn faction_recipients(
    store: &dyn Store,
    guild_id: GuildId,
    faction_id: FactionId,
    permission_type: PermissionType,
) -> Result<Vec<i64>, StoreError> {
    let mut holders: Vec<i64> = store
        .list_permissions(guild_id, faction_id)
        .await?
        .into_iter()
        .filter(|p: &FactionPermission| p.permission_type == permission_type)
        .map(|p| p.character_id.into_inner())
        .collect();
    if let Some(faction) = store.fetch_faction(faction_id).await? {
        if let Some(leader) = faction.leader_character_id {
            holders.push(leader.into_inner());
        }
    }
    holders.sort_unstable();
    holders.dedup();
    Ok(holders)
}

/// Mark an order `FAILED` with a single `error` string in `result_data`
/// and persist it, returning the `ORDER_FAILED` event (spec.md §4.1:
/// "no handler found" / §7 validation-error policy).
pub fn fail_order(order: &mut Order, error: impl Into<String>) -> serde_json::Value {
    let error = error.into();
    order.status = OrderStatus::Failed;
    order.result_data = Some(serde_json::json!({ "error": error }));
    order.result_data.clone().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use wargame_types::OrderType;
    use wargame_types::ids::OrderId;

    fn order(id: i64, order_type: OrderType) -> Order {
        Order {
            id: OrderId::new(id),
            guild_id: GuildId::new(1),
            order_type,
            status: OrderStatus::Pending,
            priority: order_type.priority(),
            submitted_at: Utc::now(),
            character_id: None,
            submitting_faction_id: None,
            order_data: serde_json::json!({}),
            result_data: None,
            turn_submitted: 1,
            updated_at: Utc::now(),
            updated_turn: 1,
        }
    }

    #[test]
    fn fail_order_sets_status_and_error() {
        let mut o = order(1, OrderType::JoinFaction);
        let data = fail_order(&mut o, "faction not found");
        assert_eq!(o.status, OrderStatus::Failed);
        assert_eq!(data["error"], "faction not found");
    }
}
