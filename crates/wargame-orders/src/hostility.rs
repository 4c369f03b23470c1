//! Shared hostility resolution for Movement and Combat (spec.md §4.3
//! "Engagement policy": "Two units are hostile iff their faction_ids are
//! in opposite sides of an ACTIVE War, or one is faction-less and the
//! other claims the territory. Allied units are never hostile.").
//!
//! Alliance-widening is already folded into war-side membership at
//! DECLARE_WAR time (spec.md §4.2: allies are dragged onto the same side
//! when a war is declared), so a plain same-war/opposite-side test here
//! is sufficient without re-walking the alliance graph.

use std::collections::BTreeMap;

use wargame_store::Store;
use wargame_types::ids::{CharacterId, FactionId};
use wargame_types::{GuildId, Owner, WarSide};

use crate::OrderResult;

/// Snapshot of every faction's war-side memberships for one guild, built
/// once per phase invocation rather than re-queried per unit pair.
#[derive(Debug, Default)]
pub struct WarMap {
    sides: BTreeMap<i64, Vec<(i64, WarSide)>>,
}

impl WarMap {
    /// Load every `WarParticipant` row in the guild.
    pub async fn load(store: &dyn Store, guild_id: GuildId) -> OrderResult<Self> {
        let mut sides: BTreeMap<i64, Vec<(i64, WarSide)>> = BTreeMap::new();
        for participant in store.list_war_participants(guild_id).await? {
            sides
                .entry(participant.faction_id.into_inner())
                .or_default()
                .push((participant.war_id.into_inner(), participant.side));
        }
        Ok(Self { sides })
    }

    /// True iff `a` and `b` are on opposite sides of at least one shared
    /// war.
    #[must_use]
    pub fn at_war(&self, a: FactionId, b: FactionId) -> bool {
        if a == b {
            return false;
        }
        let (Some(a_sides), Some(b_sides)) = (self.sides.get(&a.into_inner()), self.sides.get(&b.into_inner())) else {
            return false;
        };
        a_sides
            .iter()
            .any(|(war, side)| b_sides.iter().any(|(war2, side2)| war == war2 && side.opposite() == *side2))
    }
}

/// A unit's home faction, resolved from its own `faction_id` or its
/// owning character's represented faction (spec.md §4.7, reused here for
/// engagement since the two notions of "home faction" coincide).
pub async fn home_faction(
    store: &dyn Store,
    own_faction_id: Option<FactionId>,
    owner: Option<Owner>,
) -> OrderResult<Option<FactionId>> {
    if own_faction_id.is_some() {
        return Ok(own_faction_id);
    }
    let Some(Owner::Character(character_id)) = owner else {
        return Ok(None);
    };
    Ok(represented_faction(store, character_id).await?)
}

async fn represented_faction(store: &dyn Store, character_id: CharacterId) -> OrderResult<Option<FactionId>> {
    Ok(store
        .fetch_character(character_id)
        .await?
        .and_then(|c| c.represented_faction_id))
}

/// Whether two units -- identified only by home faction -- are hostile in
/// `territory_controller`'s context (spec.md §4.3 "Engagement policy").
#[must_use]
pub fn units_hostile(
    war_map: &WarMap,
    home_a: Option<FactionId>,
    home_b: Option<FactionId>,
    territory_controller: Option<Owner>,
) -> bool {
    match (home_a, home_b) {
        (Some(a), Some(b)) => war_map.at_war(a, b),
        (None, Some(b)) => matches!(territory_controller, Some(Owner::Faction(f)) if f == b),
        (Some(a), None) => matches!(territory_controller, Some(Owner::Faction(f)) if f == a),
        (None, None) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wargame_types::ids::WarId;

    fn war_map(pairs: &[(i64, i64, WarSide, WarSide)]) -> WarMap {
        let mut sides: BTreeMap<i64, Vec<(i64, WarSide)>> = BTreeMap::new();
        for (war, faction_a, side_a, _) in pairs {
            sides.entry(*faction_a).or_default().push((*war, *side_a));
        }
        WarMap { sides }
    }

    #[test]
    fn same_war_opposite_sides_are_hostile() {
        let mut sides: BTreeMap<i64, Vec<(i64, WarSide)>> = BTreeMap::new();
        sides.insert(1, vec![(WarId::new(1).into_inner(), WarSide::SideA)]);
        sides.insert(2, vec![(WarId::new(1).into_inner(), WarSide::SideB)]);
        let map = WarMap { sides };
        assert!(map.at_war(FactionId::new(1), FactionId::new(2)));
    }

    #[test]
    fn same_war_same_side_is_not_hostile() {
        let mut sides: BTreeMap<i64, Vec<(i64, WarSide)>> = BTreeMap::new();
        sides.insert(1, vec![(WarId::new(1).into_inner(), WarSide::SideA)]);
        sides.insert(2, vec![(WarId::new(1).into_inner(), WarSide::SideA)]);
        let map = WarMap { sides };
        assert!(!map.at_war(FactionId::new(1), FactionId::new(2)));
        let _ = war_map(&[]);
    }

    #[test]
    fn factionless_unit_is_hostile_to_claimed_territory_owner() {
        let map = WarMap::default();
        let hostile = units_hostile(&map, None, Some(FactionId::new(5)), Some(Owner::Faction(FactionId::new(5))));
        assert!(hostile);
    }

    #[test]
    fn factionless_units_are_never_hostile_to_each_other() {
        let map = WarMap::default();
        assert!(!units_hostile(&map, None, None, None));
    }
}
