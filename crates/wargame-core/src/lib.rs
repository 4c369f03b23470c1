//! The turn engine and its ambient stack for the wargame turn-resolution
//! engine.
//!
//! This crate owns `resolve_turn` (spec.md §2 "Turn Engine"): the single
//! entry point that runs the nine fixed phases in `wargame-orders` for
//! one guild, in order, and commits the resulting event batch. It also
//! carries the config layer every other crate is silent on (SPEC_FULL.md
//! §3 "Config").
//!
//! # Modules
//!
//! - [`turn_engine`] -- [`turn_engine::resolve_turn`], the phase
//!   orchestrator.
//! - [`config`] -- [`config::EngineConfig`], loaded from
//!   `wargame-config.yaml` with environment variable overrides.
//! - [`error`] -- [`error::TurnError`], the only error this crate can
//!   surface past a single `resolve_turn` call.

pub mod config;
pub mod error;
pub mod turn_engine;

pub use config::EngineConfig;
pub use error::TurnError;
pub use turn_engine::{resolve_turn, TurnOutcome};
