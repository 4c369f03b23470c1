//! Observation deduplication (spec.md §4.3 step 8, §9 "Observation
//! dedup"): collapse all `UNIT_OBSERVED` events raised during a
//! movement tick loop to at most one per `(recipient_character_id,
//! observed_unit_id)` pair, keeping the emission with the highest
//! `tick`. Must run after all ticks, before the events are appended to
//! the log (spec.md §8 "Observation dedup" testable property).

use std::collections::HashMap;

use crate::event_type::movement::UNIT_OBSERVED;
use crate::types::Event;

/// Deduplicate `UNIT_OBSERVED` events in `events`, preserving every other
/// event untouched and in its original relative order.
#[must_use]
pub fn dedupe_observations(events: Vec<Event>) -> Vec<Event> {
    let mut best: HashMap<(i64, i64), Event> = HashMap::new();
    let mut others: Vec<Event> = Vec::new();

    for event in events {
        if event.event_type != UNIT_OBSERVED {
            others.push(event);
            continue;
        }
        let Some(recipient) = event.data_i64("recipient_character_id") else {
            others.push(event);
            continue;
        };
        let Some(observed_unit) = event.data_i64("observed_unit_id") else {
            others.push(event);
            continue;
        };
        let tick = event.data_i64("tick").unwrap_or(0);
        let key = (recipient, observed_unit);
        match best.get(&key) {
            Some(existing) if existing.data_i64("tick").unwrap_or(0) >= tick => {}
            _ => {
                best.insert(key, event);
            }
        }
    }

    others.extend(best.into_values());
    others
}
