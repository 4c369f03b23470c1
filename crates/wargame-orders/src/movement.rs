//! Movement phase: tick-based land/naval movement, engagement, transport
//! boarding/disembarkation, and observation (spec.md §4.3).
//!
//! This is the single hardest subsystem in the engine. The structure
//! below follows spec.md §4.3's algorithm outline step for step: parse
//! and validate orders into [`MovementState`]s, resolve naval_transit/
//! naval_patrol/naval_wait up front, run the tick loop from the fastest
//! stack's movement stat down to 1 (pre-tick disembark/board, patrol
//! sweep, transport tick, land tick, engagement check, observation),
//! then a final sweep and per-order finalization.
//!
//! Terrain cost vs. tick budget is implicit in the source (spec.md §9
//! Open Questions); this implementation uses the minimal sufficient
//! semantics the spec names: one step per eligible tick, with costlier
//! terrain consuming a `step_cooldown` of additional ticks before the
//! next step may be taken. Naval transport capacity is modeled as one
//! passenger stack per carrier -- the source's "spare capacity" check
//! collapses to "not already carrying anyone" under that simplification.

use std::collections::BTreeMap;

use wargame_events::{Event, EventDataBuilder, dedupe_observations, event_type::movement as evt};
use wargame_store::Store;
use wargame_types::ids::{CharacterId, FactionId, UnitPk};
use wargame_types::{
    Character, GuildId, MovementAction, MovementOrderData, MovementStatus, Order, OrderStatus,
    OrderType, Owner, Phase, TerritoryKey, Unit, UnitStatus, ids::UnitKey,
};
use wargame_world::{AdjacencyGraph, NavalTrack, TerritoryIndex};

use crate::OrderResult;
use crate::dispatch::{eligible_orders, fail_order};
use crate::hostility::{WarMap, units_hostile};

/// Static facts about a unit, snapshotted once at phase start. Movement
/// never changes ownership or commander, only position -- so this can be
/// read-only for the whole phase.
#[derive(Debug, Clone)]
struct UnitMeta {
    key: UnitKey,
    owner: Option<Owner>,
    commander: Option<CharacterId>,
    faction_id: Option<FactionId>,
    is_naval: bool,
}

/// One `UNIT` order's progress through the tick loop (spec.md §4.3
/// `MovementState`).
struct MovementState {
    order: Order,
    unit_ids: Vec<UnitPk>,
    path: Vec<TerritoryKey>,
    cursor: usize,
    status: MovementStatus,
    action: MovementAction,
    movement_points: u32,
    step_cooldown: u32,
    /// Index of the `NavalTransport` state carrying this land state, if
    /// any (spec.md §4.3 step 4 "Pre-tick boarding").
    carried_by: Option<usize>,
    /// Index of the land state this `NavalTransport` state is carrying,
    /// if any. Capacity is one passenger stack (see module docs).
    carrying: Option<usize>,
    engaged_this_turn: bool,
}

impl MovementState {
    fn current_territory(&self) -> Option<TerritoryKey> {
        self.path.get(self.cursor).cloned()
    }

    fn next_territory(&self) -> Option<TerritoryKey> {
        self.path.get(self.cursor + 1).cloned()
    }

    fn at_end(&self) -> bool {
        self.cursor + 1 >= self.path.len()
    }

    fn affected(&self, meta_by_pk: &BTreeMap<UnitPk, UnitMeta>) -> Vec<i64> {
        let mut ids: Vec<i64> = self.order.character_id.map(CharacterId::into_inner).into_iter().collect();
        for unit_id in &self.unit_ids {
            if let Some(meta) = meta_by_pk.get(unit_id) {
                if let Some(commander) = meta.commander {
                    ids.push(commander.into_inner());
                }
            }
        }
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

/// Run the Movement phase, returning every event it produced (already
/// deduplicated for `UNIT_OBSERVED`, spec.md §4.3 step 8).
pub async fn execute_movement_phase(
    store: &dyn Store,
    guild_id: GuildId,
    turn_number: u32,
) -> OrderResult<Vec<Event>> {
    let orders = eligible_orders(store, guild_id, Phase::Movement).await?;
    let territories = store.list_territories(guild_id).await?;
    let adjacencies = store.list_adjacencies(guild_id).await?;
    let graph = AdjacencyGraph::build(&adjacencies);
    let index = TerritoryIndex::build(&territories);
    let rule_tables = store.load_rule_tables(guild_id).await?;
    let characters = store.list_characters(guild_id).await?;
    let war_map = WarMap::load(store, guild_id).await?;

    let units = store.list_units(guild_id).await?;
    let pk_by_key: BTreeMap<UnitKey, UnitPk> =
        units.iter().map(|u| (u.unit_id.clone(), u.id)).collect();
    let mut meta_by_pk: BTreeMap<UnitPk, UnitMeta> = BTreeMap::new();
    let mut positions: BTreeMap<UnitPk, TerritoryKey> = BTreeMap::new();
    for unit in &units {
        meta_by_pk.insert(
            unit.id,
            UnitMeta {
                key: unit.unit_id.clone(),
                owner: unit.owner,
                commander: unit.commander_character_id,
                faction_id: unit.faction_id,
                is_naval: unit.is_naval,
            },
        );
        if unit.status == UnitStatus::Active {
            if let Some(territory) = &unit.current_territory_id {
                positions.insert(unit.id, territory.clone());
            }
        }
    }

    let mut naval_tracks: BTreeMap<UnitPk, NavalTrack> = BTreeMap::new();
    for unit in &units {
        if unit.is_naval {
            let rows = store.list_naval_positions(guild_id, unit.id).await?;
            naval_tracks.insert(unit.id, NavalTrack::from_rows(unit.id, rows));
        }
    }

    let mut events = Vec::new();
    let mut states: Vec<MovementState> = Vec::new();

    for mut order in orders {
        if order.order_type != OrderType::Unit {
            let data = fail_order(&mut order, format!("no handler found for {:?}", order.order_type));
            events.push(order_event(turn_number, guild_id, evt::MOVEMENT_BLOCKED, &order, data));
            store.upsert_order(&order).await?;
            continue;
        }

        let Ok(parsed) = serde_json::from_value::<MovementOrderData>(order.order_data.clone()) else {
            let data = fail_order(&mut order, "order_data does not match UNIT order shape");
            events.push(order_event(turn_number, guild_id, evt::MOVEMENT_BLOCKED, &order, data));
            store.upsert_order(&order).await?;
            continue;
        };

        if parsed.path.is_empty() || parsed.unit_ids.is_empty() {
            let data = fail_order(&mut order, "path or unit_ids is empty");
            events.push(order_event(turn_number, guild_id, evt::MOVEMENT_BLOCKED, &order, data));
            store.upsert_order(&order).await?;
            continue;
        }
        if parsed.path.windows(2).any(|pair| !graph.is_adjacent(&pair[0], &pair[1])) {
            let data = fail_order(&mut order, "path contains non-adjacent territories");
            events.push(order_event(turn_number, guild_id, evt::MOVEMENT_BLOCKED, &order, data));
            store.upsert_order(&order).await?;
            continue;
        }

        let mut unit_ids = Vec::with_capacity(parsed.unit_ids.len());
        let mut invalid = false;
        for key in &parsed.unit_ids {
            match pk_by_key.get(key) {
                Some(pk) if units.iter().any(|u| u.id == *pk && u.status == UnitStatus::Active) => {
                    unit_ids.push(*pk);
                }
                _ => {
                    invalid = true;
                    break;
                }
            }
        }
        if invalid {
            let data = fail_order(&mut order, "unit_ids reference a missing or disbanded unit");
            events.push(order_event(turn_number, guild_id, evt::MOVEMENT_BLOCKED, &order, data));
            store.upsert_order(&order).await?;
            continue;
        }

        let movement_points = unit_ids
            .iter()
            .filter_map(|pk| units.iter().find(|u| u.id == *pk))
            .filter_map(|u| rule_tables.unit_type(&u.type_id, None).map(|ut| ut.movement))
            .min()
            .unwrap_or(0);

        states.push(MovementState {
            order,
            unit_ids,
            path: parsed.path,
            cursor: 0,
            status: MovementStatus::Moving,
            action: parsed.action,
            movement_points,
            step_cooldown: 0,
            carried_by: None,
            carrying: None,
            engaged_this_turn: false,
        });
    }

    // Tie-breaking: faster stacks first, then older orders (spec.md §4.3
    // "Tie-breaking").
    states.sort_by(|a, b| {
        b.movement_points
            .cmp(&a.movement_points)
            .then_with(|| a.order.id.into_inner().cmp(&b.order.id.into_inner()))
    });

    // Step 2: naval phase. naval_transit/naval_patrol/naval_wait resolve
    // in full before any land tick runs.
    for i in 0..states.len() {
        if !matches!(
            states[i].action,
            MovementAction::NavalTransit | MovementAction::NavalPatrol | MovementAction::NavalWait
        ) {
            continue;
        }
        resolve_naval_upfront(i, &mut states, &mut positions, &mut naval_tracks, turn_number, guild_id, &meta_by_pk, &mut events);
    }
    for (unit_id, track) in &naval_tracks {
        store.set_naval_positions(guild_id, *unit_id, &track.to_rows(guild_id)).await?;
    }

    // Step 3/4: pre-tick disembark and boarding for `transit` land orders.
    for i in 0..states.len() {
        if states[i].action != MovementAction::Transit {
            continue;
        }
        pre_tick_disembark(i, &mut states, &index);
    }
    for i in 0..states.len() {
        if states[i].action != MovementAction::Transit || states[i].status == MovementStatus::Transported {
            continue;
        }
        try_board(i, &mut states, &index);
    }

    // Step 5: initial engagement check.
    for i in 0..states.len() {
        initial_engagement_check(i, &mut states, &positions, &meta_by_pk, &characters, &war_map, &index, turn_number, guild_id, &mut events);
    }

    let max_mp = states.iter().map(|s| s.movement_points).max().unwrap_or(0);
    for tick in (1..=max_mp).rev() {
        patrol_sweep(tick, &mut states, &positions, &meta_by_pk, &characters, &war_map, &graph, turn_number, guild_id, &mut events);
        transport_tick(tick, &mut states, &mut positions, &mut naval_tracks, &index);
        land_tick(tick, &mut states, &mut positions, &meta_by_pk, &characters, &war_map, &index, turn_number, guild_id, &mut events);
        observe(&positions, &meta_by_pk, &graph, i64::from(tick), turn_number, guild_id, &mut events);
    }
    // Step 7: post-loop extra sweep at tick 0.
    observe(&positions, &meta_by_pk, &graph, 0, turn_number, guild_id, &mut events);

    events = dedupe_observations(events);

    // Step 9: finalize. Write back positions/org for moved units, update
    // order status and remaining path, emit the terminal event.
    let mut unit_writebacks: BTreeMap<UnitPk, Unit> = units.into_iter().map(|u| (u.id, u)).collect();
    for (unit_id, territory) in &positions {
        if let Some(unit) = unit_writebacks.get_mut(unit_id) {
            unit.current_territory_id = Some(territory.clone());
        }
    }

    for mut state in states {
        for unit_id in &state.unit_ids {
            if let Some(unit) = unit_writebacks.get(unit_id) {
                store.upsert_unit(unit).await?;
            }
        }

        let affected = state.affected(&meta_by_pk);
        if state.action.is_patrol() {
            state.order.status = OrderStatus::Ongoing;
            let data = EventDataBuilder::new()
                .field("unit_ids", state.unit_ids.iter().filter_map(|pk| meta_by_pk.get(pk)).map(|m| m.key.to_string()).collect::<Vec<_>>())
                .field("territory_id", state.current_territory().map(|t| t.to_string()).unwrap_or_default())
                .affected(affected)
                .build();
            events.push(Event::new(turn_number, Phase::Movement, evt::TRANSIT_PROGRESS, "order", state.order.id.into_inner(), guild_id, data));
        } else if state.status == MovementStatus::StoppedEngaged {
            state.order.status = OrderStatus::Ongoing;
            state.order.order_data = remaining_path_payload(&state);
            let data = EventDataBuilder::new()
                .field("territory_id", state.current_territory().map(|t| t.to_string()).unwrap_or_default())
                .affected(affected)
                .build();
            events.push(Event::new(turn_number, Phase::Movement, evt::MOVEMENT_BLOCKED, "order", state.order.id.into_inner(), guild_id, data));
        } else if state.at_end() {
            state.order.status = OrderStatus::Success;
            let data = EventDataBuilder::new()
                .field("territory_id", state.current_territory().map(|t| t.to_string()).unwrap_or_default())
                .affected(affected)
                .build();
            events.push(Event::new(turn_number, Phase::Movement, evt::TRANSIT_COMPLETE, "order", state.order.id.into_inner(), guild_id, data));
        } else {
            state.order.status = OrderStatus::Ongoing;
            state.order.order_data = remaining_path_payload(&state);
            let data = EventDataBuilder::new()
                .field("territory_id", state.current_territory().map(|t| t.to_string()).unwrap_or_default())
                .field("remaining_steps", (state.path.len() - state.cursor - 1) as i64)
                .affected(affected)
                .build();
            events.push(Event::new(turn_number, Phase::Movement, evt::TRANSIT_PROGRESS, "order", state.order.id.into_inner(), guild_id, data));
        }
        store.upsert_order(&state.order).await?;
    }

    Ok(events)
}

fn remaining_path_payload(state: &MovementState) -> serde_json::Value {
    let remaining: Vec<&TerritoryKey> = state.path.iter().skip(state.cursor).collect();
    serde_json::json!({
        "action": state.action,
        "unit_ids": state.unit_ids.len(),
        "path": remaining,
    })
}

fn order_event(turn_number: u32, guild_id: GuildId, event_type: &'static str, order: &Order, data: serde_json::Value) -> Event {
    let map = match data {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    };
    let affected = order.character_id.map(CharacterId::into_inner).into_iter().collect::<Vec<_>>();
    let mut builder = EventDataBuilder::new();
    for (key, value) in map {
        builder = builder.field(&key, value);
    }
    Event::new(turn_number, Phase::Movement, event_type, "order", order.id.into_inner(), guild_id, builder.affected(affected).build())
}

fn home_faction_of(meta: &UnitMeta, characters: &[Character]) -> Option<FactionId> {
    meta.faction_id.or_else(|| match meta.owner {
        Some(Owner::Character(character_id)) => characters
            .iter()
            .find(|c| c.id == character_id)
            .and_then(|c| c.represented_faction_id),
        _ => None,
    })
}

fn territory_controller(index: &TerritoryIndex, territory: &TerritoryKey) -> Option<Owner> {
    index.get(territory).and_then(|t| t.controller)
}

/// True iff `a` and `b` are hostile, given their unit metadata.
fn units_are_hostile(a: &UnitMeta, b: &UnitMeta, characters: &[Character], war_map: &WarMap, controller: Option<Owner>) -> bool {
    units_hostile(war_map, home_faction_of(a, characters), home_faction_of(b, characters), controller)
}

fn resolve_naval_upfront(
    i: usize,
    states: &mut [MovementState],
    positions: &mut BTreeMap<UnitPk, TerritoryKey>,
    naval_tracks: &mut BTreeMap<UnitPk, NavalTrack>,
    turn_number: u32,
    guild_id: GuildId,
    meta_by_pk: &BTreeMap<UnitPk, UnitMeta>,
    events: &mut Vec<Event>,
) {
    let action = states[i].action;
    let budget = states[i].movement_points;
    if action == MovementAction::NavalWait {
        let affected = states[i].affected(meta_by_pk);
        let data = EventDataBuilder::new().affected(affected).build();
        events.push(Event::new(turn_number, Phase::Movement, evt::NAVAL_WAITING, "order", states[i].order.id.into_inner(), guild_id, data));
        states[i].status = MovementStatus::Done;
        return;
    }

    let mut steps_taken = 0u32;
    while steps_taken < budget && !states[i].at_end() {
        let Some(next) = states[i].next_territory() else { break };
        states[i].cursor += 1;
        for unit_id in states[i].unit_ids.clone() {
            positions.insert(unit_id, next.clone());
            if let Some(track) = naval_tracks.get_mut(&unit_id) {
                track.advance_to(next.clone());
            }
        }
        steps_taken += 1;
    }

    states[i].status = MovementStatus::Done;
    let affected = states[i].affected(meta_by_pk);
    let event_type = if states[i].at_end() { evt::NAVAL_TRANSIT_COMPLETE } else { evt::NAVAL_TRANSIT_PROGRESS };
    let data = EventDataBuilder::new()
        .field("territory_id", states[i].current_territory().map(|t| t.to_string()).unwrap_or_default())
        .affected(affected)
        .build();
    events.push(Event::new(turn_number, Phase::Movement, event_type, "order", states[i].order.id.into_inner(), guild_id, data));
}

/// Disembark a carried land state if its carrier no longer shares a
/// territory with the land state's next planned step (spec.md §4.3 step
/// 3).
fn pre_tick_disembark(i: usize, states: &mut [MovementState], index: &TerritoryIndex) {
    let Some(carrier_index) = states[i].carried_by else { return };
    let carrier_territory = states.get(carrier_index).and_then(MovementState::current_territory);
    let own_current = states[i].current_territory();
    if carrier_territory.is_some() && carrier_territory == own_current {
        return;
    }
    if let Some(next) = states[i].next_territory() {
        if let Some(current) = own_current {
            let coastal = index
                .get(&current)
                .is_some_and(|t| !t.terrain_type.is_water())
                && index.get(&next).is_some_and(|t| t.terrain_type.is_water());
            if coastal {
                return;
            }
        }
    }
    states[i].status = MovementStatus::Moving;
    states[i].carried_by = None;
    if let Some(carrier) = states.get_mut(carrier_index) {
        carrier.carrying = None;
    }
}

/// Board a naval_transport carrier at the same territory if the land
/// order's next step crosses water (spec.md §4.3 step 4).
fn try_board(i: usize, states: &mut [MovementState], index: &TerritoryIndex) {
    let Some(next) = states[i].next_territory() else { return };
    let Some(current) = states[i].current_territory() else { return };
    let crosses_water = index.get(&next).is_some_and(|t| t.terrain_type.is_water());
    if !crosses_water {
        return;
    }
    let carrier_index = states.iter().position(|s| {
        s.action == MovementAction::NavalTransport
            && s.carrying.is_none()
            && s.current_territory().as_ref() == Some(&current)
    });
    if let Some(carrier_index) = carrier_index {
        states[i].status = MovementStatus::Transported;
        states[i].carried_by = Some(carrier_index);
        states[carrier_index].carrying = Some(i);
    }
}

#[allow(clippy::too_many_arguments)]
fn initial_engagement_check(
    i: usize,
    states: &mut [MovementState],
    positions: &BTreeMap<UnitPk, TerritoryKey>,
    meta_by_pk: &BTreeMap<UnitPk, UnitMeta>,
    characters: &[Character],
    war_map: &WarMap,
    index: &TerritoryIndex,
    turn_number: u32,
    guild_id: GuildId,
    events: &mut Vec<Event>,
) {
    if states[i].status == MovementStatus::Transported {
        return;
    }
    let Some(territory) = states[i].current_territory() else { return };
    if hostile_present(i, states, positions, meta_by_pk, characters, war_map, index, &territory) {
        states[i].status = MovementStatus::StoppedEngaged;
        states[i].engaged_this_turn = true;
        let affected = states[i].affected(meta_by_pk);
        let data = EventDataBuilder::new()
            .field("territory_id", territory.to_string())
            .affected(affected)
            .build();
        events.push(Event::new(turn_number, Phase::Movement, evt::UNIT_ENGAGED, "order", states[i].order.id.into_inner(), guild_id, data));
    }
}

#[allow(clippy::too_many_arguments)]
fn hostile_present(
    exclude: usize,
    states: &[MovementState],
    positions: &BTreeMap<UnitPk, TerritoryKey>,
    meta_by_pk: &BTreeMap<UnitPk, UnitMeta>,
    characters: &[Character],
    war_map: &WarMap,
    index: &TerritoryIndex,
    territory: &TerritoryKey,
) -> bool {
    let controller = territory_controller(index, territory);
    let own_units: Vec<UnitPk> = states[exclude].unit_ids.clone();
    let own_transported = states[exclude].status == MovementStatus::Transported;
    if own_transported {
        return false;
    }
    for (unit_id, pos) in positions {
        if own_units.contains(unit_id) || pos != territory {
            continue;
        }
        // Skip units currently riding a transport -- they are not
        // present as a combatant stack until they disembark.
        if states
            .iter()
            .any(|s| s.unit_ids.contains(unit_id) && s.status == MovementStatus::Transported)
        {
            continue;
        }
        let Some(other_meta) = meta_by_pk.get(unit_id) else { continue };
        let Some(own_meta) = own_units.first().and_then(|pk| meta_by_pk.get(pk)) else { continue };
        if units_are_hostile(own_meta, other_meta, characters, war_map, controller) {
            return true;
        }
    }
    false
}

#[allow(clippy::too_many_arguments)]
fn patrol_sweep(
    tick: u32,
    states: &mut [MovementState],
    positions: &BTreeMap<UnitPk, TerritoryKey>,
    meta_by_pk: &BTreeMap<UnitPk, UnitMeta>,
    characters: &[Character],
    war_map: &WarMap,
    graph: &AdjacencyGraph,
    turn_number: u32,
    guild_id: GuildId,
    events: &mut Vec<Event>,
) {
    for i in 0..states.len() {
        if !states[i].action.is_patrol() || tick > states[i].movement_points {
            continue;
        }
        let Some(territory) = states[i].current_territory() else { continue };
        let range = graph.patrol_range(&territory);
        let own_units = states[i].unit_ids.clone();
        let own_meta = own_units.first().and_then(|pk| meta_by_pk.get(pk)).cloned();
        let Some(own_meta) = own_meta else { continue };

        for (unit_id, pos) in positions {
            if own_units.contains(unit_id) || !range.contains(pos) {
                continue;
            }
            let Some(other_meta) = meta_by_pk.get(unit_id) else { continue };
            let controller = None;
            if !units_are_hostile(&own_meta, other_meta, characters, war_map, controller) {
                continue;
            }
            if !states[i].engaged_this_turn {
                states[i].engaged_this_turn = true;
                let affected = states[i].affected(meta_by_pk);
                let data = EventDataBuilder::new()
                    .field("territory_id", territory.to_string())
                    .field("tick", i64::from(tick))
                    .affected(affected)
                    .build();
                events.push(Event::new(turn_number, Phase::Movement, evt::UNIT_ENGAGED, "order", states[i].order.id.into_inner(), guild_id, data));
            }
            if let Some(entrant_index) = states.iter().position(|s| s.unit_ids.contains(unit_id)) {
                if states[entrant_index].status == MovementStatus::Moving {
                    states[entrant_index].status = MovementStatus::StoppedEngaged;
                    states[entrant_index].engaged_this_turn = true;
                }
            }
        }
    }
}

fn transport_tick(
    tick: u32,
    states: &mut [MovementState],
    positions: &mut BTreeMap<UnitPk, TerritoryKey>,
    naval_tracks: &mut BTreeMap<UnitPk, NavalTrack>,
    index: &TerritoryIndex,
) {
    for i in 0..states.len() {
        if states[i].action != MovementAction::NavalTransport || states[i].status != MovementStatus::Moving {
            continue;
        }
        if tick > states[i].movement_points || states[i].at_end() {
            continue;
        }
        if states[i].step_cooldown > 0 {
            states[i].step_cooldown -= 1;
            continue;
        }
        let Some(next) = states[i].next_territory() else { continue };
        let cost = index.get(&next).map_or(1, |t| t.terrain_type.movement_cost());
        states[i].cursor += 1;
        states[i].step_cooldown = cost.saturating_sub(1);
        for unit_id in states[i].unit_ids.clone() {
            positions.insert(unit_id, next.clone());
            if let Some(track) = naval_tracks.get_mut(&unit_id) {
                track.advance_to(next.clone());
            }
        }
        if let Some(passenger_index) = states[i].carrying {
            if let Some(passenger) = states.get_mut(passenger_index) {
                for unit_id in passenger.unit_ids.clone() {
                    positions.insert(unit_id, next.clone());
                }
            }
        }
        if states[i].at_end() {
            states[i].status = MovementStatus::Done;
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn land_tick(
    tick: u32,
    states: &mut [MovementState],
    positions: &mut BTreeMap<UnitPk, TerritoryKey>,
    meta_by_pk: &BTreeMap<UnitPk, UnitMeta>,
    characters: &[Character],
    war_map: &WarMap,
    index: &TerritoryIndex,
    turn_number: u32,
    guild_id: GuildId,
    events: &mut Vec<Event>,
) {
    for i in 0..states.len() {
        if states[i].action != MovementAction::Transit || states[i].status != MovementStatus::Moving {
            continue;
        }
        if tick > states[i].movement_points || states[i].at_end() {
            continue;
        }
        if states[i].step_cooldown > 0 {
            states[i].step_cooldown -= 1;
            continue;
        }
        let Some(next) = states[i].next_territory() else { continue };
        if hostile_present(i, states, positions, meta_by_pk, characters, war_map, index, &next) {
            states[i].status = MovementStatus::StoppedEngaged;
            let affected = states[i].affected(meta_by_pk);
            let data = EventDataBuilder::new()
                .field("territory_id", next.to_string())
                .field("tick", i64::from(tick))
                .affected(affected)
                .build();
            events.push(Event::new(turn_number, Phase::Movement, evt::MOVEMENT_BLOCKED, "order", states[i].order.id.into_inner(), guild_id, data));
            continue;
        }
        let cost = index.get(&next).map_or(1, |t| t.terrain_type.movement_cost());
        states[i].cursor += 1;
        states[i].step_cooldown = cost.saturating_sub(1);
        for unit_id in states[i].unit_ids.clone() {
            positions.insert(unit_id, next.clone());
        }
        if states[i].at_end() {
            states[i].status = MovementStatus::Done;
        }
    }
}

/// Step 6e/7: every unit observes every other unit sharing its territory
/// or an adjacent one (spec.md §4.3 step 6e, §9 "Observation dedup").
/// Raw, undeduplicated events are emitted here; [`dedupe_observations`]
/// collapses them after the loop.
fn observe(
    positions: &BTreeMap<UnitPk, TerritoryKey>,
    meta_by_pk: &BTreeMap<UnitPk, UnitMeta>,
    graph: &AdjacencyGraph,
    tick: i64,
    turn_number: u32,
    guild_id: GuildId,
    events: &mut Vec<Event>,
) {
    let by_territory: BTreeMap<&TerritoryKey, Vec<&UnitPk>> = {
        let mut map: BTreeMap<&TerritoryKey, Vec<&UnitPk>> = BTreeMap::new();
        for (unit_id, territory) in positions {
            map.entry(territory).or_default().push(unit_id);
        }
        map
    };

    for (observer_id, observer_territory) in positions {
        let Some(observer_meta) = meta_by_pk.get(observer_id) else { continue };
        let mut visible_territories = vec![observer_territory.clone()];
        visible_territories.extend(graph.neighbors(observer_territory));

        let mut recipients: Vec<i64> = Vec::new();
        if let Some(Owner::Character(c)) = observer_meta.owner {
            recipients.push(c.into_inner());
        }
        if let Some(commander) = observer_meta.commander {
            recipients.push(commander.into_inner());
        }
        if recipients.is_empty() {
            continue;
        }

        for territory in &visible_territories {
            let Some(units_here) = by_territory.get(territory) else { continue };
            for observed_id in units_here {
                if *observed_id == observer_id {
                    continue;
                }
                for recipient in &recipients {
                    let data = EventDataBuilder::new()
                        .field("recipient_character_id", *recipient)
                        .field("observed_unit_id", observed_id.into_inner())
                        .field("tick", tick)
                        .affected([*recipient])
                        .build();
                    events.push(Event::new(
                        turn_number,
                        Phase::Movement,
                        evt::UNIT_OBSERVED,
                        "unit",
                        observed_id.into_inner(),
                        guild_id,
                        data,
                    ));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use wargame_store::InMemoryStore;
    use wargame_types::ids::{OrderId, TerritoryPk, UnitPk as UnitPkTy};
    use wargame_types::{ResourceMap, TerrainType, Territory, TerritoryAdjacency, UnitType};

    fn guild() -> GuildId {
        GuildId::new(1)
    }

    fn territory(key: &str) -> Territory {
        Territory {
            id: TerritoryPk::new(key.len() as i64),
            guild_id: guild(),
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

    fn unit_type(movement: u32) -> UnitType {
        UnitType {
            type_id: "infantry".to_owned(),
            guild_id: guild(),
            nation: None,
            movement,
            organization_max: 10,
            attack: 1,
            defense: 1,
            siege_attack: 0,
            siege_defense: 0,
            costs: ResourceMap::default(),
            upkeep: ResourceMap::default(),
            is_naval: false,
        }
    }

    fn unit(id: i64, key: &str, territory: &str) -> Unit {
        Unit {
            id: UnitPkTy::new(id),
            guild_id: guild(),
            unit_id: UnitKey::from(key),
            type_id: "infantry".to_owned(),
            owner: Some(Owner::Character(CharacterId::new(1))),
            commander_character_id: None,
            faction_id: None,
            current_territory_id: Some(TerritoryKey::from(territory)),
            organization: 10,
            max_organization: 10,
            status: UnitStatus::Active,
            is_naval: false,
        }
    }

    async fn seed_chain(store: &InMemoryStore) {
        for key in ["T1", "T2", "T3", "T4", "T5"] {
            store.upsert_territory(&territory(key)).await.unwrap();
        }
        for pair in [("T1", "T2"), ("T2", "T3"), ("T3", "T4"), ("T4", "T5")] {
            store
                .seed_adjacency(TerritoryAdjacency { guild_id: guild(), a: TerritoryKey::from(pair.0), b: TerritoryKey::from(pair.1) })
                .await;
        }
        store.seed_unit_type(unit_type(4)).await;
    }

    fn order(id: i64, unit_key: &str, path: &[&str]) -> Order {
        Order {
            id: OrderId::new(id),
            guild_id: guild(),
            order_type: OrderType::Unit,
            status: OrderStatus::Pending,
            priority: OrderType::Unit.priority(),
            submitted_at: Utc::now(),
            character_id: Some(CharacterId::new(1)),
            submitting_faction_id: None,
            order_data: serde_json::json!({
                "action": "transit",
                "unit_ids": [unit_key],
                "path": path,
            }),
            result_data: None,
            turn_submitted: 1,
            updated_at: Utc::now(),
            updated_turn: 1,
        }
    }

    #[tokio::test]
    async fn unit_reaching_end_of_path_completes_transit() {
        let store = InMemoryStore::new();
        seed_chain(&store).await;
        store.upsert_unit(&unit(1, "U1", "T1")).await.unwrap();
        store.upsert_order(&order(1, "U1", &["T1", "T2", "T3", "T4", "T5"])).await.unwrap();

        let events = execute_movement_phase(&store, guild(), 1).await.unwrap();
        assert!(events.iter().any(|e| e.event_type == evt::TRANSIT_COMPLETE));

        let stored = store.fetch_unit_by_key(guild(), &UnitKey::from("U1")).await.unwrap().unwrap();
        assert_eq!(stored.current_territory_id, Some(TerritoryKey::from("T5")));
    }

    #[tokio::test]
    async fn slower_stack_lags_behind_faster_stack() {
        let store = InMemoryStore::new();
        seed_chain(&store).await;
        store.seed_unit_type(unit_type(2)).await;
        store
            .seed_unit_type(UnitType { type_id: "slow".to_owned(), movement: 2, ..unit_type(2) })
            .await;
        store.upsert_unit(&unit(1, "FAST", "T1")).await.unwrap();
        let mut slow = unit(2, "SLOW", "T1");
        slow.type_id = "slow".to_owned();
        store.upsert_unit(&slow).await.unwrap();

        store.upsert_order(&order(1, "FAST", &["T1", "T2", "T3", "T4", "T5"])).await.unwrap();
        let mut slow_order = order(2, "SLOW", &["T1", "T2", "T3"]);
        slow_order.order_data = serde_json::json!({
            "action": "transit",
            "unit_ids": ["SLOW"],
            "path": ["T1", "T2", "T3"],
        });
        store.upsert_order(&slow_order).await.unwrap();

        let _events = execute_movement_phase(&store, guild(), 1).await.unwrap();

        let fast = store.fetch_unit_by_key(guild(), &UnitKey::from("FAST")).await.unwrap().unwrap();
        let slow = store.fetch_unit_by_key(guild(), &UnitKey::from("SLOW")).await.unwrap().unwrap();
        assert_eq!(fast.current_territory_id, Some(TerritoryKey::from("T5")));
        assert_eq!(slow.current_territory_id, Some(TerritoryKey::from("T3")));
    }

    #[tokio::test]
    async fn hostile_unit_at_destination_blocks_movement() {
        let store = InMemoryStore::new();
        seed_chain(&store).await;

        let mover_faction = FactionId::new(1);
        let blocker_faction = FactionId::new(2);
        let mut mover = unit(1, "MOVER", "T1");
        mover.faction_id = Some(mover_faction);
        store.upsert_unit(&mover).await.unwrap();
        let mut blocker = unit(2, "BLOCKER", "T2");
        blocker.faction_id = Some(blocker_faction);
        store.upsert_unit(&blocker).await.unwrap();

        store
            .insert_war(&wargame_types::War { id: wargame_types::ids::WarId::new(1), guild_id: guild(), war_id: "W1".to_owned(), objective: None, declared_turn: 1 })
            .await
            .unwrap();
        store
            .upsert_war_participant(guild(), &wargame_types::WarParticipant { war_id: wargame_types::ids::WarId::new(1), faction_id: mover_faction, side: wargame_types::WarSide::SideA, joined_turn: 1, is_original_declarer: true })
            .await
            .unwrap();
        store
            .upsert_war_participant(guild(), &wargame_types::WarParticipant { war_id: wargame_types::ids::WarId::new(1), faction_id: blocker_faction, side: wargame_types::WarSide::SideB, joined_turn: 1, is_original_declarer: false })
            .await
            .unwrap();

        store.upsert_order(&order(1, "MOVER", &["T1", "T2", "T3"])).await.unwrap();

        let events = execute_movement_phase(&store, guild(), 1).await.unwrap();
        assert!(events.iter().any(|e| e.event_type == evt::MOVEMENT_BLOCKED));

        let mover = store.fetch_unit_by_key(guild(), &UnitKey::from("MOVER")).await.unwrap().unwrap();
        assert_eq!(mover.current_territory_id, Some(TerritoryKey::from("T1")));
    }

    #[tokio::test]
    async fn observation_is_deduplicated_per_recipient_and_unit() {
        let store = InMemoryStore::new();
        seed_chain(&store).await;
        let mut a = unit(1, "A", "T1");
        a.commander_character_id = Some(CharacterId::new(9));
        store.upsert_unit(&a).await.unwrap();
        store.upsert_unit(&unit(2, "B", "T2")).await.unwrap();

        store.upsert_order(&order(1, "A", &["T1", "T2", "T3"])).await.unwrap();

        let events = execute_movement_phase(&store, guild(), 1).await.unwrap();
        let observations: Vec<_> = events.iter().filter(|e| e.event_type == evt::UNIT_OBSERVED).collect();
        let mut seen = std::collections::BTreeSet::new();
        for event in &observations {
            let recipient = event.data_i64("recipient_character_id").unwrap();
            let observed = event.data_i64("observed_unit_id").unwrap();
            assert!(seen.insert((recipient, observed)), "duplicate observation for {recipient}/{observed}");
        }
    }

    #[tokio::test]
    async fn invalid_path_fails_order() {
        let store = InMemoryStore::new();
        seed_chain(&store).await;
        store.upsert_unit(&unit(1, "U1", "T1")).await.unwrap();
        store.upsert_order(&order(1, "U1", &["T1", "T5"])).await.unwrap();

        let events = execute_movement_phase(&store, guild(), 1).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, evt::MOVEMENT_BLOCKED);
        let stored = store.fetch_order(OrderId::new(1)).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Failed);
    }
}
