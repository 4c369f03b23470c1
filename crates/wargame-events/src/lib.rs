//! The event log and payload schema for the wargame turn-resolution
//! engine (spec.md §2 "Event Log", §6 "Event payload schema").
//!
//! Every phase handler emits [`Event`]s as it runs; the [`EventLog`]
//! accumulates them in append order, and [`dedupe_observations`]
//! collapses the Movement phase's raw `UNIT_OBSERVED` emissions before
//! the turn commits.
//!
//! # Modules
//!
//! - [`types`] -- The [`Event`] struct and [`EventDataBuilder`].
//! - [`event_type`] -- Event type string constants, grouped by phase.
//! - [`log`] -- The [`EventLog`] append-only accumulator.
//! - [`dedup`] -- Observation deduplication.

pub mod dedup;
pub mod event_type;
pub mod log;
pub mod types;

pub use dedup::dedupe_observations;
pub use log::EventLog;
pub use types::{Event, EventDataBuilder};
