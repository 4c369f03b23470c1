//! The event schema (spec.md §6 "Event payload schema").
//!
//! Every event carries the same five top-level fields plus an
//! `event_data` map, and every `event_data` map must contain
//! `affected_character_ids` -- the set of characters whose per-character
//! report should include this event. Presentation layers (out of scope,
//! spec.md §1) depend on this shape exactly, so [`Event::new`] refuses to
//! build an event without that key.

use serde::Serialize;
use serde_json::{Map, Value, json};
use wargame_types::{GuildId, Phase};

/// One row of the append-only per-turn event log (spec.md §3 `TurnLog`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub turn_number: u32,
    pub phase: Phase,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: i64,
    pub guild_id: GuildId,
    pub event_data: Value,
}

impl Event {
    /// Build an event, inserting `affected_character_ids` into `data` if
    /// the caller didn't already set it (defaulting to empty, per spec.md
    /// §6: "possibly empty").
    #[must_use]
    pub fn new(
        turn_number: u32,
        phase: Phase,
        event_type: impl Into<String>,
        entity_type: impl Into<String>,
        entity_id: i64,
        guild_id: GuildId,
        mut data: Map<String, Value>,
    ) -> Self {
        data.entry("affected_character_ids")
            .or_insert_with(|| json!([]));
        Self {
            turn_number,
            phase,
            event_type: event_type.into(),
            entity_type: entity_type.into(),
            entity_id,
            guild_id,
            event_data: Value::Object(data),
        }
    }

    /// The `affected_character_ids` recipients this event should be
    /// filtered to, parsed back out of `event_data`.
    #[must_use]
    pub fn affected_character_ids(&self) -> Vec<i64> {
        self.event_data
            .get("affected_character_ids")
            .and_then(Value::as_array)
            .map(|values| values.iter().filter_map(Value::as_i64).collect())
            .unwrap_or_default()
    }

    /// Read an integer field out of `event_data`, if present.
    #[must_use]
    pub fn data_i64(&self, key: &str) -> Option<i64> {
        self.event_data.get(key).and_then(Value::as_i64)
    }
}

/// A small ergonomic builder over [`Event::new`]'s `Map` payload.
#[derive(Debug, Default)]
pub struct EventDataBuilder {
    map: Map<String, Value>,
}

impl EventDataBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field to any serializable value.
    #[must_use]
    pub fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.map.insert(key.to_owned(), value.into());
        self
    }

    /// Set `affected_character_ids` explicitly.
    #[must_use]
    pub fn affected(mut self, character_ids: impl IntoIterator<Item = i64>) -> Self {
        self.map.insert(
            "affected_character_ids".to_owned(),
            Value::Array(character_ids.into_iter().map(Value::from).collect()),
        );
        self
    }

    #[must_use]
    pub fn build(self) -> Map<String, Value> {
        self.map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_defaults_affected_character_ids_to_empty() {
        let event = Event::new(
            1,
            Phase::Beginning,
            "ORDER_FAILED",
            "order",
            1,
            GuildId::new(1),
            Map::new(),
        );
        assert_eq!(event.affected_character_ids(), Vec::<i64>::new());
    }

    #[test]
    fn builder_sets_affected_character_ids() {
        let data = EventDataBuilder::new().affected([1, 2, 3]).build();
        let event = Event::new(1, Phase::Upkeep, "UPKEEP_SUMMARY", "character", 1, GuildId::new(1), data);
        assert_eq!(event.affected_character_ids(), vec![1, 2, 3]);
    }

    #[test]
    fn data_i64_reads_field() {
        let data = EventDataBuilder::new().field("tick", 3i64).build();
        let event = Event::new(1, Phase::Movement, "UNIT_OBSERVED", "unit", 7, GuildId::new(1), data);
        assert_eq!(event.data_i64("tick"), Some(3));
    }
}
