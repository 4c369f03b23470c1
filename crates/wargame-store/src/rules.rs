//! Rule table caches: the immutable-per-turn snapshots the phase handlers
//! read against (spec.md §2 "Rule Tables"). Loaded once per guild at the
//! start of `resolve_turn` via [`crate::Store::load_rule_tables`] and
//! never re-queried mid-turn -- a handler that needs a unit type, building
//! type, recipe, or adjacency edge reads it out of this snapshot.

use wargame_types::{
    BuildingType, ConstraintRecipe, FailedBlend, SubsetRecipe, TerritoryAdjacency, UnitType,
};

/// The rule tables for one guild, as of the start of the current turn.
#[derive(Debug, Clone, Default)]
pub struct RuleTables {
    pub unit_types: Vec<UnitType>,
    pub building_types: Vec<BuildingType>,
    pub adjacencies: Vec<TerritoryAdjacency>,
    pub subset_recipes: Vec<SubsetRecipe>,
    pub constraint_recipes: Vec<ConstraintRecipe>,
    pub failed_blends: Vec<FailedBlend>,
}

impl RuleTables {
    /// Look up a unit type by `(type_id, nation)`, falling back to the
    /// nation-less row if no nation-specific override exists (spec.md §3
    /// `UnitType`: "(type_id, nation, guild_id) unique").
    #[must_use]
    pub fn unit_type(&self, type_id: &str, nation: Option<&str>) -> Option<&UnitType> {
        self.unit_types
            .iter()
            .find(|ut| ut.type_id == type_id && ut.nation.as_deref() == nation)
            .or_else(|| {
                self.unit_types
                    .iter()
                    .find(|ut| ut.type_id == type_id && ut.nation.is_none())
            })
    }

    /// Look up a building type by its `type_id`.
    #[must_use]
    pub fn building_type(&self, type_id: &str) -> Option<&BuildingType> {
        self.building_types.iter().find(|bt| bt.type_id == type_id)
    }
}
