//! Shared data model for the wargame turn-resolution engine.
//!
//! This crate is the single source of truth for the entity and enum types
//! every other crate in the workspace builds on: the store persists these
//! shapes, the phase handlers in `wargame-orders` mutate them, and the
//! event log in `wargame-events` references them by id.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe integer/string identifier wrappers
//! - [`enums`] -- Closed vocabularies (resources, phases, statuses, ...)
//! - [`structs`] -- Core entity structs (guild, faction, unit, territory, ...)

pub mod enums;
pub mod ids;
pub mod structs;

pub use enums::{
    AllianceStatus, BuildingStatus, ChakraValence, MovementAction, MovementStatus, OrderStatus,
    OrderType, Owner, PermissionType, Phase, ProductType, Resource, UnitStatus, WarSide,
};
pub use ids::{
    BuildingPk, CharacterId, EventId, FactionId, FactionKey, GuildId, OrderId, TaskId,
    TerritoryKey, TerritoryPk, UnitKey, UnitPk, WarId,
};
pub use structs::{
    Alliance, Building, BuildingType, Character, ConstraintRecipe, FactionMember,
    FactionPermission, FactionResources, FailedBlend, Faction, Guild, Ingredient,
    MovementOrderData, NavalUnitPosition, Order, PlayerResources, Product, ResourceMap,
    ScheduledTask, SpiritNexus, SubsetRecipe, TerrainType, Territory, TerritoryAdjacency, Unit,
    UnitType, War, WarParticipant,
};
