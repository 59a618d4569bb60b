use std::collections::BTreeMap;

use serde::Serialize;

use crate::entity::{Entity, EntityKind, SinglePositioned};
use crate::grid::{CellKey, GridPosition};
use crate::ids::EntityUuid;
use crate::model::CemeteryData;

/// Groups non-deleted entities by cell and keeps only cells holding two or
/// more of them.
pub fn detect_spatial_conflicts<'a, T, I>(entities: I) -> BTreeMap<CellKey, Vec<&'a T>>
where
    T: SinglePositioned + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut by_cell: BTreeMap<CellKey, Vec<&'a T>> = BTreeMap::new();
    for entity in entities {
        if entity.is_deleted() {
            continue;
        }
        by_cell.entry(entity.position().key()).or_default().push(entity);
    }
    by_cell.retain(|_, occupants| occupants.len() > 1);
    by_cell
}

/// Kind-erased view of something sitting in a cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Occupant {
    pub kind: EntityKind,
    pub uuid: EntityUuid,
    pub name: String,
    pub position: GridPosition,
}

impl Occupant {
    pub fn of<T: SinglePositioned>(entity: &T) -> Self {
        Self {
            kind: T::KIND,
            uuid: entity.uuid(),
            name: entity.display_name(),
            position: entity.position(),
        }
    }
}

/// Overlaps across graves and landmarks together.
pub fn detect_occupancy_conflicts(data: &CemeteryData) -> BTreeMap<CellKey, Vec<Occupant>> {
    let mut by_cell: BTreeMap<CellKey, Vec<Occupant>> = BTreeMap::new();
    let graves = data.graves.iter().filter(|g| !g.is_deleted()).map(Occupant::of);
    let landmarks = data.landmarks.iter().filter(|l| !l.is_deleted()).map(Occupant::of);
    for occupant in graves.chain(landmarks) {
        by_cell.entry(occupant.position.key()).or_default().push(occupant);
    }
    by_cell.retain(|_, occupants| occupants.len() > 1);
    by_cell
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Cemetery, Grave, Landmark, LandmarkType};
    use crate::timestamp::Timestamp;

    fn at() -> Timestamp {
        Timestamp::parse("2024-03-01T10:00:00.000Z").unwrap()
    }

    fn grave(row: i64, col: i64) -> Grave {
        Grave::new(EntityUuid::new(), GridPosition::new(row, col), at(), "Alice")
    }

    #[test]
    fn empty_input_has_no_conflicts() {
        let graves: Vec<Grave> = Vec::new();
        assert!(detect_spatial_conflicts(&graves).is_empty());
    }

    #[test]
    fn two_graves_in_one_cell_conflict() {
        let graves = vec![grave(1, 1), grave(1, 1), grave(2, 2)];
        let conflicts = detect_spatial_conflicts(&graves);
        assert_eq!(conflicts.len(), 1);
        let key = CellKey::from(GridPosition::new(1, 1));
        assert_eq!(conflicts[&key].len(), 2);
    }

    #[test]
    fn soft_deleted_graves_are_ignored() {
        let mut gone = grave(4, 4);
        gone.set_deleted(true);
        let graves = vec![grave(4, 4), gone];
        assert!(detect_spatial_conflicts(&graves).is_empty());
    }

    #[test]
    fn grave_and_landmark_overlap_across_kinds() {
        let mut data = CemeteryData::new(Cemetery::new("Hill", 5, 5, at(), "Alice"));
        data.graves.push(grave(0, 3));
        data.landmarks.push(Landmark::new(
            EntityUuid::new(),
            LandmarkType::Tree,
            GridPosition::new(0, 3),
            at(),
            "Alice",
        ));
        let conflicts = detect_occupancy_conflicts(&data);
        let occupants = &conflicts[&CellKey::from(GridPosition::new(0, 3))];
        assert_eq!(occupants.len(), 2);
        assert_eq!(occupants[1].name, "tree landmark");
    }
}
