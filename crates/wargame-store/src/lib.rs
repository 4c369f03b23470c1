//! Data layer for the wargame turn-resolution engine.
//!
//! `PostgreSQL` is the single system of record: every entity in spec.md §3
//! lives in one relational schema, read and written through the [`Store`]
//! trait so phase handlers and the turn engine never talk to `sqlx` or a
//! pool directly. Two implementations exist: [`pg_store::PgStore`] for
//! production, and [`memory::InMemoryStore`] -- a `tokio::sync::Mutex`-backed
//! double -- for tests that need a full store without a live database.
//!
//! # Modules
//!
//! - [`traits`] -- the [`Store`] trait every phase handler is generic over
//! - [`rules`] -- [`RuleTables`], the immutable-per-turn cache of unit
//!   types, building types, adjacencies, and herbalism recipes
//! - [`postgres`] -- connection pool setup and migration running
//! - [`pg_store`] -- the production `Store` implementation
//! - [`memory`] -- the in-memory `Store` double used by tests
//! - [`error`] -- shared error types

pub mod error;
pub mod memory;
pub mod pg_store;
pub mod postgres;
pub mod rules;
pub mod traits;

pub use error::StoreError;
pub use memory::InMemoryStore;
pub use pg_store::PgStore;
pub use postgres::{PostgresConfig, PostgresPool};
pub use rules::RuleTables;
pub use traits::Store;
