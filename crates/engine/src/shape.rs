use serde::Serialize;
use tracing::{debug, warn};

use stonebystone_core::{
    Cemetery, CemeteryData, EditContext, Entity, EntityKind, EntityUuid, GridPosition, Positioned,
    ValidCells,
};

/// A live element sitting on cells outside the new shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidElement {
    pub kind: EntityKind,
    pub uuid: EntityUuid,
    pub name: String,
    /// Only the offending cells, which for roads may be a subset of the path.
    pub positions: Vec<GridPosition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShapeOutcome {
    pub cemetery: Cemetery,
    pub invalid_elements: Vec<InvalidElement>,
}

/// Replaces the set of valid cells and reports live elements on cells
/// missing from it. Nothing is moved or deleted.
///
/// Elements are checked against the supplied cells clipped to the grid, so
/// an empty outline flags every live element. An empty outline is stored as
/// no outline at all.
pub fn update_cemetery_shape(data: &CemeteryData, cells: ValidCells, ctx: &EditContext) -> ShapeOutcome {
    let mut cemetery = data.cemetery.clone();
    let clipped = cells.clipped(cemetery.rows(), cemetery.cols());

    let mut invalid_elements = Vec::new();
    flag_invalid(&clipped, &data.graves, &mut invalid_elements);
    flag_invalid(&clipped, &data.landmarks, &mut invalid_elements);
    flag_invalid(&clipped, &data.roads, &mut invalid_elements);

    cemetery.grid.valid_cells = (!clipped.is_empty()).then_some(clipped);
    cemetery.set_stamp(ctx.now(), ctx.user());

    debug!(
        cells = cemetery.grid.valid_cells.as_ref().map_or(0, ValidCells::len),
        invalid = invalid_elements.len(),
        "computed shape edit"
    );
    ShapeOutcome {
        cemetery,
        invalid_elements,
    }
}

fn flag_invalid<T: Positioned>(outline: &ValidCells, items: &[T], out: &mut Vec<InvalidElement>) {
    for item in items.iter().filter(|i| !i.is_deleted()) {
        let positions: Vec<GridPosition> = item
            .positions()
            .into_iter()
            .filter(|p| !outline.contains(p))
            .collect();
        if positions.is_empty() {
            continue;
        }
        warn!(kind = %T::KIND, uuid = %item.uuid(), cells = positions.len(), "element outside cemetery shape");
        out.push(InvalidElement {
            kind: T::KIND,
            uuid: item.uuid(),
            name: item.display_name(),
            positions,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use stonebystone_core::{FixedClock, Grave, Landmark, LandmarkType, Road, Timestamp, DEFAULT_ROAD_COLOR};

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    fn sample() -> CemeteryData {
        let at = ts("2024-01-01T00:00:00Z");
        let mut data = CemeteryData::new(Cemetery::new("Hill", 4, 4, at.clone(), "Alice"));
        data.graves.push(Grave::new(EntityUuid::new(), GridPosition::new(0, 0), at.clone(), "Alice"));
        data.graves.push(Grave::new(EntityUuid::new(), GridPosition::new(3, 3), at.clone(), "Alice"));
        data.landmarks.push(Landmark::new(
            EntityUuid::new(),
            LandmarkType::Building,
            GridPosition::new(3, 0),
            at.clone(),
            "Alice",
        ));
        data.roads.push(Road::new(
            EntityUuid::new(),
            vec![GridPosition::new(1, 0), GridPosition::new(1, 1), GridPosition::new(1, 2)],
            DEFAULT_ROAD_COLOR,
            at,
            "Alice",
        ));
        data
    }

    fn ctx() -> EditContext {
        EditContext::new("Dana", Arc::new(FixedClock::new(ts("2024-06-01T00:00:00Z"))))
    }

    #[test]
    fn flags_elements_outside_the_shape() {
        let data = sample();
        let mut cells = data.cemetery.all_cells();
        cells.remove(&GridPosition::new(3, 3));
        cells.remove(&GridPosition::new(3, 0));
        cells.remove(&GridPosition::new(1, 2));

        let out = update_cemetery_shape(&data, cells, &ctx());
        let kinds: Vec<_> = out.invalid_elements.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EntityKind::Grave, EntityKind::Landmark, EntityKind::Road]);
        assert_eq!(out.invalid_elements[1].name, "building landmark");
        assert_eq!(out.invalid_elements[2].positions, vec![GridPosition::new(1, 2)]);
        assert_eq!(out.cemetery.modified_by, "Dana");
        assert_eq!(out.cemetery.grid.valid_cells.as_ref().map(ValidCells::len), Some(13));
    }

    #[test]
    fn deleted_elements_are_not_flagged() {
        let mut data = sample();
        for g in &mut data.graves {
            g.set_deleted(true);
        }
        let only_centre: ValidCells = [GridPosition::new(2, 2)].into_iter().collect();
        let out = update_cemetery_shape(&data, only_centre, &ctx());
        assert!(out.invalid_elements.iter().all(|e| e.kind != EntityKind::Grave));
    }

    #[test]
    fn empty_outline_flags_every_live_element() {
        let mut data = sample();
        data.graves[1].set_deleted(true);
        for cells in [ValidCells::new(), [GridPosition::new(7, 7)].into_iter().collect()] {
            let out = update_cemetery_shape(&data, cells, &ctx());
            assert_eq!(out.cemetery.grid.valid_cells, None);
            let flagged: Vec<_> = out.invalid_elements.iter().map(|e| e.uuid).collect();
            assert_eq!(flagged, vec![data.graves[0].uuid, data.landmarks[0].uuid, data.roads[0].uuid]);
            assert_eq!(out.invalid_elements[2].positions.len(), 3);
        }
    }
}
