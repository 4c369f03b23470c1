//! Ordered naval unit position sequences (spec.md §9 "Naval unit
//! positions"): the only entity with ordered multi-row state. A naval unit
//! occupies a sequence of territories; the table is the path it has
//! traced, re-written wholesale each time it advances.

use wargame_types::{GuildId, NavalUnitPosition, TerritoryKey, UnitPk};

/// An in-memory projection of a naval unit's ordered territory sequence,
/// as `set_positions` would leave it in the store: delete-then-reinsert,
/// so the vector here is always the authoritative full sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavalTrack {
    pub unit_id: UnitPk,
    pub territories: Vec<TerritoryKey>,
}

impl NavalTrack {
    /// Build a track from the store rows for one unit, ordered by
    /// `position_index`.
    #[must_use]
    pub fn from_rows(unit_id: UnitPk, mut rows: Vec<NavalUnitPosition>) -> Self {
        rows.sort_by_key(|r| r.position_index);
        Self {
            unit_id,
            territories: rows.into_iter().map(|r| r.territory_id).collect(),
        }
    }

    /// The current (most recently occupied) territory, if any.
    #[must_use]
    pub fn current(&self) -> Option<&TerritoryKey> {
        self.territories.last()
    }

    /// Append one more territory to the track (one tick of naval
    /// advancement).
    pub fn advance_to(&mut self, territory: TerritoryKey) {
        self.territories.push(territory);
    }

    /// Render as the atomic `set_positions(unit, [ids])` row set: delete
    /// prior rows, re-insert this full sequence (spec.md §9).
    #[must_use]
    pub fn to_rows(&self, guild_id: GuildId) -> Vec<NavalUnitPosition> {
        self.territories
            .iter()
            .enumerate()
            .map(|(index, territory)| NavalUnitPosition {
                unit_id: self.unit_id,
                #[allow(clippy::cast_possible_truncation)]
                position_index: index as u32,
                territory_id: territory.clone(),
                guild_id,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_appends_and_tracks_current() {
        let mut track = NavalTrack {
            unit_id: UnitPk::new(1),
            territories: vec![TerritoryKey::from("SEA1")],
        };
        track.advance_to(TerritoryKey::from("SEA2"));
        assert_eq!(track.current(), Some(&TerritoryKey::from("SEA2")));
        assert_eq!(track.territories.len(), 2);
    }

    #[test]
    fn to_rows_preserves_order() {
        let track = NavalTrack {
            unit_id: UnitPk::new(1),
            territories: vec![TerritoryKey::from("A"), TerritoryKey::from("B")],
        };
        let rows = track.to_rows(GuildId::new(1));
        assert_eq!(rows[0].position_index, 0);
        assert_eq!(rows[1].position_index, 1);
        assert_eq!(rows[1].territory_id, TerritoryKey::from("B"));
    }

    #[test]
    fn from_rows_sorts_by_index() {
        let rows = vec![
            NavalUnitPosition {
                unit_id: UnitPk::new(1),
                territory_id: TerritoryKey::from("B"),
                position_index: 1,
                guild_id: GuildId::new(1),
            },
            NavalUnitPosition {
                unit_id: UnitPk::new(1),
                territory_id: TerritoryKey::from("A"),
                position_index: 0,
                guild_id: GuildId::new(1),
            },
        ];
        let track = NavalTrack::from_rows(UnitPk::new(1), rows);
        assert_eq!(track.territories[0], TerritoryKey::from("A"));
    }
}
