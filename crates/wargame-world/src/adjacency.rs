//! The territory adjacency graph and reachability queries.
//!
//! Adjacency is stored as unordered `{a, b}` pairs (spec.md §3
//! `TerritoryAdjacency`); this module builds the per-guild neighbor index
//! once per turn (spec.md §2 "Rule Tables: immutable-per-turn caches") and
//! exposes the two traversal queries the Movement and Encirclement phases
//! need: plain neighbor lookup, and a filtered breadth-first reachability
//! check.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use wargame_types::{Territory, TerritoryAdjacency, TerritoryKey};

/// A guild's territory graph, built once per turn from the adjacency rows
/// and territory rows the rule tables cache loaded.
#[derive(Debug, Clone, Default)]
pub struct AdjacencyGraph {
    neighbors: BTreeMap<TerritoryKey, BTreeSet<TerritoryKey>>,
}

impl AdjacencyGraph {
    /// Build the graph from the guild's adjacency rows.
    #[must_use]
    pub fn build(edges: &[TerritoryAdjacency]) -> Self {
        let mut neighbors: BTreeMap<TerritoryKey, BTreeSet<TerritoryKey>> = BTreeMap::new();
        for edge in edges {
            neighbors
                .entry(edge.a.clone())
                .or_default()
                .insert(edge.b.clone());
            neighbors
                .entry(edge.b.clone())
                .or_default()
                .insert(edge.a.clone());
        }
        Self { neighbors }
    }

    /// The direct neighbors of a territory (empty if it has none or is
    /// unknown).
    #[must_use]
    pub fn neighbors(&self, territory: &TerritoryKey) -> Vec<TerritoryKey> {
        self.neighbors
            .get(territory)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// True iff `a` and `b` are directly adjacent (spec.md §4.3 step 1:
    /// "each consecutive pair is adjacent").
    #[must_use]
    pub fn is_adjacent(&self, a: &TerritoryKey, b: &TerritoryKey) -> bool {
        self.neighbors.get(a).is_some_and(|set| set.contains(b))
    }

    /// Patrol range: a territory plus its direct neighbors (spec.md §4.3
    /// "Patrol range = self + neighbors").
    #[must_use]
    pub fn patrol_range(&self, territory: &TerritoryKey) -> BTreeSet<TerritoryKey> {
        let mut range: BTreeSet<TerritoryKey> = self.neighbors(territory).into_iter().collect();
        range.insert(territory.clone());
        range
    }

    /// Breadth-first search from `start` over territories satisfying
    /// `passable`, stopping as soon as any territory satisfying `goal` is
    /// reached. Used by the Encirclement phase (spec.md §4.7): `passable`
    /// excludes water and hostile-controlled territories, `goal` is
    /// "directly controlled by the home faction or an ally".
    ///
    /// Returns `true` if such a path exists (including the trivial case
    /// where `start` itself satisfies `goal`).
    pub fn reachable<P, G>(&self, start: &TerritoryKey, passable: P, goal: G) -> bool
    where
        P: Fn(&TerritoryKey) -> bool,
        G: Fn(&TerritoryKey) -> bool,
    {
        if goal(start) {
            return true;
        }
        if !passable(start) {
            return false;
        }

        let mut visited: BTreeSet<TerritoryKey> = BTreeSet::new();
        let mut queue: VecDeque<TerritoryKey> = VecDeque::new();
        visited.insert(start.clone());
        queue.push_back(start.clone());

        while let Some(current) = queue.pop_front() {
            for next in self.neighbors(&current) {
                if visited.contains(&next) {
                    continue;
                }
                if goal(&next) {
                    return true;
                }
                if passable(&next) {
                    visited.insert(next.clone());
                    queue.push_back(next);
                }
            }
        }
        false
    }
}

/// Lookup table from territory key to its terrain/controller row, built
/// alongside [`AdjacencyGraph`] for the same turn.
#[derive(Debug, Clone, Default)]
pub struct TerritoryIndex {
    by_key: BTreeMap<TerritoryKey, Territory>,
}

impl TerritoryIndex {
    /// Build the index from the guild's territory rows.
    #[must_use]
    pub fn build(territories: &[Territory]) -> Self {
        let by_key = territories
            .iter()
            .map(|t| (t.territory_id.clone(), t.clone()))
            .collect();
        Self { by_key }
    }

    /// Look up a territory by its business key.
    #[must_use]
    pub fn get(&self, key: &TerritoryKey) -> Option<&Territory> {
        self.by_key.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wargame_types::GuildId;

    fn edge(a: &str, b: &str) -> TerritoryAdjacency {
        TerritoryAdjacency {
            guild_id: GuildId::new(1),
            a: TerritoryKey::from(a),
            b: TerritoryKey::from(b),
        }
    }

    #[test]
    fn neighbors_are_symmetric() {
        let graph = AdjacencyGraph::build(&[edge("T1", "T2")]);
        assert_eq!(graph.neighbors(&TerritoryKey::from("T1")), vec![TerritoryKey::from("T2")]);
        assert_eq!(graph.neighbors(&TerritoryKey::from("T2")), vec![TerritoryKey::from("T1")]);
    }

    #[test]
    fn is_adjacent_checks_both_directions() {
        let graph = AdjacencyGraph::build(&[edge("T1", "T2")]);
        assert!(graph.is_adjacent(&TerritoryKey::from("T1"), &TerritoryKey::from("T2")));
        assert!(graph.is_adjacent(&TerritoryKey::from("T2"), &TerritoryKey::from("T1")));
        assert!(!graph.is_adjacent(&TerritoryKey::from("T1"), &TerritoryKey::from("T3")));
    }

    #[test]
    fn reachable_finds_path_through_uncontrolled_land() {
        // T1 -- T2 -- T3, all passable, T3 is the goal.
        let graph = AdjacencyGraph::build(&[edge("T1", "T2"), edge("T2", "T3")]);
        let reached = graph.reachable(
            &TerritoryKey::from("T1"),
            |_| true,
            |t| t == &TerritoryKey::from("T3"),
        );
        assert!(reached);
    }

    #[test]
    fn reachable_blocked_by_impassable_territory() {
        let graph = AdjacencyGraph::build(&[edge("T1", "T2"), edge("T2", "T3")]);
        let reached = graph.reachable(
            &TerritoryKey::from("T1"),
            |t| t != &TerritoryKey::from("T2"),
            |t| t == &TerritoryKey::from("T3"),
        );
        assert!(!reached);
    }

    #[test]
    fn patrol_range_includes_self() {
        let graph = AdjacencyGraph::build(&[edge("T1", "T2")]);
        let range = graph.patrol_range(&TerritoryKey::from("T1"));
        assert!(range.contains(&TerritoryKey::from("T1")));
        assert!(range.contains(&TerritoryKey::from("T2")));
    }
}
