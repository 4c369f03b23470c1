//! Type-safe identifier wrappers around `i64`.
//!
//! Every entity in the store has a strongly-typed internal id to prevent
//! accidental mixing of identifiers at compile time. These wrap the
//! relational store's serial/bigint primary keys (not UUIDs) -- the source
//! system keys every table off a Postgres `id: Optional[int]` column that
//! is assigned at first insert.
//!
//! Some entities are additionally addressed by a user-facing *business key*
//! (`faction_id`, `unit_id`, `territory_id`, ...): a `String` unique within
//! a guild. Those business keys are modeled as plain `String` newtypes
//! alongside the opaque integer id, since movement, adjacency and order
//! payloads all address entities by business key rather than internal id.

use serde::{Deserialize, Serialize};

/// Generates a newtype wrapper around `i64` with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl $name {
            /// Wrap a raw store-assigned id.
            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            /// Return the inner `i64` value.
            #[must_use]
            pub const fn into_inner(self) -> i64 {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Internal id of a game instance (Discord guild in the source system).
    GuildId
}

define_id! {
    /// Internal id of a `Character`.
    CharacterId
}

define_id! {
    /// Internal id of a `Faction`.
    FactionId
}

define_id! {
    /// Internal id of a `War`.
    WarId
}

define_id! {
    /// Internal id of a `Territory`.
    TerritoryPk
}

define_id! {
    /// Internal id of a `Unit`.
    UnitPk
}

define_id! {
    /// Internal id of a `Building`.
    BuildingPk
}

define_id! {
    /// Internal id of an `Order`.
    OrderId
}

define_id! {
    /// Internal id of a `TurnLog` (event) row.
    EventId
}

define_id! {
    /// Internal id of a `ScheduledTask` (Hawky) row.
    TaskId
}

/// User-facing business key for a territory, unique within a guild.
///
/// Movement paths, adjacency, and naval positions all address territories
/// by this key rather than the internal [`TerritoryPk`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TerritoryKey(pub String);

impl core::fmt::Display for TerritoryKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TerritoryKey {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for TerritoryKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// User-facing business key for a unit, unique within a guild.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitKey(pub String);

impl core::fmt::Display for UnitKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UnitKey {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// User-facing business key for a faction, unique within a guild.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FactionKey(pub String);

impl core::fmt::Display for FactionKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for FactionKey {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types() {
        let character = CharacterId::new(1);
        let faction = FactionId::new(1);
        assert_eq!(character.into_inner(), faction.into_inner());
        // Different types -- the compiler enforces no mixing even though
        // the underlying i64 values coincide.
    }

    #[test]
    fn id_roundtrip_serde() {
        let original = UnitPk::new(42);
        let json = serde_json::to_string(&original).expect("serialize");
        let restored: UnitPk = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(original, restored);
    }

    #[test]
    fn territory_key_display() {
        let key = TerritoryKey::from("T1");
        assert_eq!(key.to_string(), "T1");
    }
}
