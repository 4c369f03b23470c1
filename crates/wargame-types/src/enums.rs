//! Enumeration types for the wargame turn-resolution engine.
//!
//! These mirror the closed vocabularies spec.md §3/§4 pin down: resource
//! kinds, order/phase/status tags, ownership discriminants, and the
//! terminology used by the movement and herbalism subsystems.

use serde::{Deserialize, Serialize};

/// One of the six tradeable resource kinds. Every balance (character,
/// faction, unit upkeep, building upkeep, territory production) is shaped
/// over this fixed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Ore,
    Lumber,
    Coal,
    Rations,
    Cloth,
    Platinum,
}

impl Resource {
    /// All resource kinds, in the fixed canonical order used for iteration
    /// and payload rendering.
    pub const ALL: [Resource; 6] = [
        Resource::Ore,
        Resource::Lumber,
        Resource::Coal,
        Resource::Rations,
        Resource::Cloth,
        Resource::Platinum,
    ];

    /// The lowercase wire name, matching event payload keys (`"ore"`, ...).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Resource::Ore => "ore",
            Resource::Lumber => "lumber",
            Resource::Coal => "coal",
            Resource::Rations => "rations",
            Resource::Cloth => "cloth",
            Resource::Platinum => "platinum",
        }
    }
}

impl core::fmt::Display for Resource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The nine fixed turn-resolution phases, executed strictly in this order
/// (spec.md §5 "Ordering guarantees"). The engine never reorders them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Beginning,
    Movement,
    Combat,
    ResourceCollection,
    ResourceTransfer,
    Encirclement,
    Upkeep,
    Organization,
    Construction,
}

impl Phase {
    /// The fixed phase sequence, leaves-first in execution order.
    pub const SEQUENCE: [Phase; 9] = [
        Phase::Beginning,
        Phase::Movement,
        Phase::Combat,
        Phase::ResourceCollection,
        Phase::ResourceTransfer,
        Phase::Encirclement,
        Phase::Upkeep,
        Phase::Organization,
        Phase::Construction,
    ];

    /// The wire name, matching `TurnLog.phase` and event payload `phase`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Phase::Beginning => "BEGINNING",
            Phase::Movement => "MOVEMENT",
            Phase::Combat => "COMBAT",
            Phase::ResourceCollection => "RESOURCE_COLLECTION",
            Phase::ResourceTransfer => "RESOURCE_TRANSFER",
            Phase::Encirclement => "ENCIRCLEMENT",
            Phase::Upkeep => "UPKEEP",
            Phase::Organization => "ORGANIZATION",
            Phase::Construction => "CONSTRUCTION",
        }
    }
}

impl core::fmt::Display for Phase {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Order lifecycle status (spec.md §3 Order, §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Ongoing,
    Success,
    Failed,
    Cancelled,
}

impl OrderStatus {
    /// True for statuses a phase driver must still consider this turn
    /// (spec.md §4.1: "Statuses PENDING and ONGOING are eligible per phase").
    #[must_use]
    pub const fn is_eligible(self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Ongoing)
    }

    /// True for a status that will never be revisited by a later turn
    /// (spec.md §8 idempotency property).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Success | OrderStatus::Failed | OrderStatus::Cancelled
        )
    }
}

/// The distinct order kinds the queue dispatches, mapped 1:1 to a
/// `(Phase, priority)` pair by [`Self::routing`] (spec.md §4.1 mapping
/// table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    LeaveFaction,
    KickFromFaction,
    JoinFaction,
    AssignCommander,
    AssignVictoryPoints,
    MakeAlliance,
    DissolveAlliance,
    DeclareWar,
    Unit,
    CancelTransfer,
    ResourceTransfer,
    Mobilization,
    Construction,
}

impl OrderType {
    /// The fixed `(phase, priority)` this order type always routes to
    /// (spec.md §4.1 "Mapping (design-level, complete)"). Priority is
    /// lower-runs-first within the phase; orders with no documented
    /// priority default to `0`.
    #[must_use]
    pub const fn routing(self) -> (Phase, u8) {
        match self {
            OrderType::LeaveFaction | OrderType::KickFromFaction => (Phase::Beginning, 0),
            OrderType::JoinFaction => (Phase::Beginning, 1),
            OrderType::AssignCommander => (Phase::Beginning, 2),
            OrderType::AssignVictoryPoints
            | OrderType::MakeAlliance
            | OrderType::DissolveAlliance
            | OrderType::DeclareWar => (Phase::Beginning, 3),
            OrderType::Unit => (Phase::Movement, 0),
            OrderType::CancelTransfer => (Phase::ResourceTransfer, 0),
            OrderType::ResourceTransfer => (Phase::ResourceTransfer, 1),
            OrderType::Mobilization | OrderType::Construction => (Phase::Construction, 0),
        }
    }

    /// The phase half of [`Self::routing`].
    #[must_use]
    pub const fn phase(self) -> Phase {
        self.routing().0
    }

    /// The priority half of [`Self::routing`].
    #[must_use]
    pub const fn priority(self) -> u8 {
        self.routing().1
    }
}

/// The land/naval movement action carried by a `UNIT` order's `order_data`
/// (spec.md §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementAction {
    Transit,
    Patrol,
    NavalTransport,
    NavalTransit,
    NavalPatrol,
    NavalWait,
}

impl MovementAction {
    /// True for the three `naval_*` actions (spec.md §4.3 step 1: "split
    /// into land orders and naval orders by action prefix").
    #[must_use]
    pub const fn is_naval(self) -> bool {
        matches!(
            self,
            MovementAction::NavalTransport
                | MovementAction::NavalTransit
                | MovementAction::NavalPatrol
                | MovementAction::NavalWait
        )
    }

    /// True for a patrol variant (land or naval).
    #[must_use]
    pub const fn is_patrol(self) -> bool {
        matches!(self, MovementAction::Patrol | MovementAction::NavalPatrol)
    }
}

/// Per-state progress in the movement tick loop (spec.md §4.3
/// `MovementState.status`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementStatus {
    Moving,
    StoppedEngaged,
    Transported,
    WaitingTransport,
    Done,
}

/// A faction permission grant (spec.md §3 `FactionPermission`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionType {
    Command,
    Financial,
}

/// Alliance negotiation state (spec.md §3 `Alliance`). The two `Pending`
/// variants carry which side initiated, matching the source's
/// `PENDING_FACTION_<other>` sentinel string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AllianceStatus {
    /// Faction A proposed; waiting on faction B.
    PendingFactionA,
    /// Faction B proposed; waiting on faction A.
    PendingFactionB,
    /// Both sides have confirmed.
    Active,
}

/// Which side of a [`crate::structs::War`] a faction has joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarSide {
    SideA,
    SideB,
}

impl WarSide {
    /// The opposing side -- any two units on opposite sides of the same
    /// active war are hostile (spec.md §4.3 "Engagement policy").
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            WarSide::SideA => WarSide::SideB,
            WarSide::SideB => WarSide::SideA,
        }
    }
}

/// Lifecycle status of a [`crate::structs::Unit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitStatus {
    Active,
    Disbanded,
}

/// Lifecycle status of a [`crate::structs::Building`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildingStatus {
    Active,
    Destroyed,
}

/// Mutually-exclusive owner discriminant, replacing the source's nullable
/// twin-column pattern (`owner_character_id` XOR `owner_faction_id`) with a
/// tagged union per spec.md §9 "Dynamic row mapping".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Owner {
    Character(crate::ids::CharacterId),
    Faction(crate::ids::FactionId),
}

/// Herbalism product family. A `Product` is keyed by `(item_number,
/// product_type)`; a recipe's `product_type` constrains which products it
/// can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductType {
    Tea,
    Salve,
    Tincture,
    Decoction,
    Bath,
    Incense,
}

impl ProductType {
    /// The lowercase wire name, matching `Product.product_type` rows.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ProductType::Tea => "tea",
            ProductType::Salve => "salve",
            ProductType::Tincture => "tincture",
            ProductType::Decoction => "decoction",
            ProductType::Bath => "bath",
            ProductType::Incense => "incense",
        }
    }
}

impl core::fmt::Display for ProductType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether a chakra's net strength in a blend is a boon (positive) or a
/// bane (negative); `ConstraintRecipe.primary_is_boon` /
/// `secondary_is_boon` constrain against this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChakraValence {
    Boon,
    Bane,
}

impl ChakraValence {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ChakraValence::Boon => "boon",
            ChakraValence::Bane => "bane",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_sequence_is_fixed_and_complete() {
        assert_eq!(Phase::SEQUENCE.len(), 9);
        assert_eq!(Phase::SEQUENCE[0], Phase::Beginning);
        assert_eq!(Phase::SEQUENCE[8], Phase::Construction);
    }

    #[test]
    fn order_status_eligibility() {
        assert!(OrderStatus::Pending.is_eligible());
        assert!(OrderStatus::Ongoing.is_eligible());
        assert!(!OrderStatus::Success.is_eligible());
        assert!(OrderStatus::Failed.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::Pending.is_terminal());
    }

    #[test]
    fn war_side_opposite_is_involutive() {
        assert_eq!(WarSide::SideA.opposite(), WarSide::SideB);
        assert_eq!(WarSide::SideB.opposite().opposite(), WarSide::SideB);
    }

    #[test]
    fn movement_action_naval_detection() {
        assert!(MovementAction::NavalTransit.is_naval());
        assert!(!MovementAction::Transit.is_naval());
        assert!(MovementAction::Patrol.is_patrol());
        assert!(MovementAction::NavalPatrol.is_patrol());
    }

    #[test]
    fn resource_all_has_six_members() {
        assert_eq!(Resource::ALL.len(), 6);
        assert_eq!(Resource::Ore.as_str(), "ore");
    }
}
