//! In-memory accumulator for one turn's events.
//!
//! Phase handlers append to an [`EventLog`] as they run; the turn engine
//! concatenates each phase's log and commits the whole batch at the end
//! of `resolve_turn` (spec.md §5 "Event insertion order within a phase is
//! the order in which handlers appended").

use crate::types::Event;

/// An append-only accumulator, scoped to one phase invocation or one
/// whole turn.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one event, preserving append order.
    pub fn push(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Append every event from another log, in order.
    pub fn extend(&mut self, other: EventLog) {
        self.events.extend(other.events);
    }

    /// Consume the log, returning events in append order.
    #[must_use]
    pub fn into_events(self) -> Vec<Event> {
        self.events
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Event] {
        &self.events
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wargame_types::{GuildId, Phase};

    fn dummy(entity_id: i64) -> Event {
        Event::new(
            1,
            Phase::Beginning,
            "ORDER_FAILED",
            "order",
            entity_id,
            GuildId::new(1),
            serde_json::Map::new(),
        )
    }

    #[test]
    fn push_preserves_append_order() {
        let mut log = EventLog::new();
        log.push(dummy(1));
        log.push(dummy(2));
        let events = log.into_events();
        assert_eq!(events[0].entity_id, 1);
        assert_eq!(events[1].entity_id, 2);
    }

    #[test]
    fn extend_concatenates_in_order() {
        let mut a = EventLog::new();
        a.push(dummy(1));
        let mut b = EventLog::new();
        b.push(dummy(2));
        a.extend(b);
        let events = a.into_events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].entity_id, 2);
    }
}
