//! The turn engine: runs the nine fixed phases for one guild, in order,
//! and commits the resulting event batch (spec.md §2.6 "Turn Engine",
//! §5 "Concurrency & Resource Model").
//!
//! `resolve_turn` is the engine's single entry point. It is not
//! cancellable mid-way (spec.md §5 "Cancellation and timeouts"): a phase
//! runs to completion before the next one starts, and either every phase
//! succeeds and the whole batch of events is appended plus `current_turn`
//! advanced, or the first phase that hits a store failure aborts the
//! whole turn and nothing is committed.

use std::collections::BTreeSet;

use tracing::{debug, info, instrument};
use wargame_events::Event;
use wargame_orders::{
    beginning::execute_beginning_phase, combat::execute_combat_phase,
    construction::execute_construction_phase, encirclement::execute_encirclement_phase,
    movement::execute_movement_phase, organization::execute_organization_phase,
    resource_collection::execute_resource_collection_phase,
    resource_transfer::execute_resource_transfer_phase, upkeep::execute_upkeep_phase,
};
use wargame_store::Store;
use wargame_types::ids::GuildId;
use wargame_types::Phase;

use crate::error::TurnError;

/// The outcome of one `resolve_turn` call (spec.md §6 "Outputs: Return:
/// `(success, message, events[])`").
#[derive(Debug, Clone, serde::Serialize)]
pub struct TurnOutcome {
    /// Whether the turn committed. `false` means nothing was persisted
    /// and `current_turn` did not advance.
    pub success: bool,
    /// A short human-readable summary, for the caller's log/response.
    pub message: String,
    /// Every event the turn produced, in phase-then-append order
    /// (spec.md §5 "Ordering guarantees"). Empty when `success` is
    /// `false`.
    pub events: Vec<Event>,
    /// The turn number that was just resolved (the guild's
    /// `current_turn` before this call).
    pub turn_number: u32,
}

/// Resolve exactly one turn for `guild_id`: run the fixed phase sequence
/// from spec.md §2 (Beginning, Movement, Combat, Resource Collection,
/// Resource Transfer, Encirclement, Upkeep, Organization, Construction),
/// commit the accumulated events, and advance `current_turn`.
///
/// A store failure inside any phase aborts the entire turn: no events
/// are appended and `current_turn` is not advanced (spec.md §5, §7
/// "Fatal"). Every other failure mode -- a bad order, a resource
/// shortfall, an integrity fault on one unit or building -- is handled
/// inside the phase itself and shows up as an event, never as an `Err`
/// here.
#[instrument(skip(store), fields(guild_id = guild_id.into_inner()))]
pub async fn resolve_turn(store: &dyn Store, guild_id: GuildId) -> Result<TurnOutcome, TurnError> {
    let guild = store
        .fetch_guild(guild_id)
        .await?
        .ok_or(TurnError::GuildNotFound(guild_id.into_inner()))?;
    let turn_number = guild.current_turn;

    info!(turn_number, "starting turn resolution");

    let mut events = Vec::new();

    events.extend(phase_events(Phase::Beginning, execute_beginning_phase(store, guild_id, turn_number).await)?);
    events.extend(phase_events(Phase::Movement, execute_movement_phase(store, guild_id, turn_number).await)?);
    events.extend(phase_events(Phase::Combat, execute_combat_phase(store, guild_id, turn_number).await)?);
    events.extend(phase_events(
        Phase::ResourceCollection,
        execute_resource_collection_phase(store, guild_id, turn_number).await,
    )?);
    events.extend(phase_events(
        Phase::ResourceTransfer,
        execute_resource_transfer_phase(store, guild_id, turn_number).await,
    )?);

    let (encirclement_events, encircled_unit_ids) = phase_events(
        Phase::Encirclement,
        execute_encirclement_phase(store, guild_id, turn_number).await,
    )?;
    events.extend(encirclement_events);

    let upkeep_events = phase_events(
        Phase::Upkeep,
        execute_upkeep_phase(store, guild_id, turn_number, &encircled_unit_ids).await,
    )?;
    events.extend(upkeep_events);

    events.extend(phase_events(Phase::Organization, execute_organization_phase(store, guild_id, turn_number).await)?);
    events.extend(phase_events(Phase::Construction, execute_construction_phase(store, guild_id, turn_number).await)?);

    store.append_events(&events).await?;
    let new_turn = store.advance_turn(guild_id).await?;

    info!(new_turn, total_events = events.len(), "turn committed");

    Ok(TurnOutcome {
        success: true,
        message: format!("turn {turn_number} resolved, advanced to {new_turn}"),
        events,
        turn_number,
    })
}

/// Wraps a phase handler's result, logging completion and mapping its
/// error into [`TurnError::Phase`] with the phase attached. Generic over
/// the handler's success payload so Encirclement's `(events, encircled)`
/// tuple and every other phase's bare `Vec<Event>` share one call site.
fn phase_events<T: PhaseEvents>(
    phase: Phase,
    result: Result<T, wargame_orders::OrderError>,
) -> Result<T, TurnError> {
    debug!(?phase, "running phase");
    let value = result.map_err(|source| TurnError::Phase { phase, source })?;
    info!(?phase, emitted = value.event_count(), "phase complete");
    Ok(value)
}

/// Lets [`phase_events`] log an emitted-event count for both a phase's
/// bare `Vec<Event>` return and Encirclement's `(Vec<Event>, BTreeSet<i64>)`.
trait PhaseEvents {
    fn event_count(&self) -> usize;
}

impl PhaseEvents for Vec<Event> {
    fn event_count(&self) -> usize {
        self.len()
    }
}

impl PhaseEvents for (Vec<Event>, BTreeSet<i64>) {
    fn event_count(&self) -> usize {
        self.0.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wargame_store::InMemoryStore;
    use wargame_types::Guild;

    #[tokio::test]
    async fn resolve_turn_on_empty_guild_advances_turn_with_no_events() {
        let store = InMemoryStore::new();
        let guild_id = GuildId::new(1);
        store
            .seed_guild(Guild { id: guild_id, current_turn: 0, max_movement_stat: 10 })
            .await;

        let outcome = resolve_turn(&store, guild_id).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.turn_number, 0);
        assert!(outcome.events.is_empty());

        let guild = store.fetch_guild(guild_id).await.unwrap().unwrap();
        assert_eq!(guild.current_turn, 1);
    }

    #[tokio::test]
    async fn resolve_turn_missing_guild_errors() {
        let store = InMemoryStore::new();
        let result = resolve_turn(&store, GuildId::new(999)).await;
        assert!(matches!(result, Err(TurnError::GuildNotFound(999))));
    }
}
