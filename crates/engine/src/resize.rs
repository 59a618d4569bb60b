use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use stonebystone_core::{
    Cemetery, CemeteryData, EditContext, Entity, EntityKind, EntityUuid, GridPosition, Grave,
    Landmark, Positioned, Road, Timestamp, ValidCells,
};

use crate::error::EngineError;

/// The edge of the grid where rows or columns are added or removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridDirection {
    Top,
    Bottom,
    Left,
    Right,
}

impl GridDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::Bottom => "bottom",
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

impl fmt::Display for GridDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GridDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top" => Ok(Self::Top),
            "bottom" => Ok(Self::Bottom),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            other => Err(format!("unknown grid direction: {other}")),
        }
    }
}

/// An element a resize could not move without leaving the grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResizeConflict {
    pub kind: EntityKind,
    pub uuid: EntityUuid,
    pub name: String,
    /// The element's current cell; the first cell for roads.
    pub position: GridPosition,
}

/// A proposed resize. Nothing is stored until the caller commits it.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeOutcome {
    pub direction: GridDirection,
    pub count: i64,
    pub cemetery: Cemetery,
    pub graves: Vec<Grave>,
    pub landmarks: Vec<Landmark>,
    pub roads: Vec<Road>,
    pub conflicts: Vec<ResizeConflict>,
    /// Elements whose coordinates changed.
    pub moved: Vec<EntityUuid>,
}

impl ResizeOutcome {
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

struct Relocation {
    shift_rows: i64,
    shift_cols: i64,
    rows: i64,
    cols: i64,
    at: Timestamp,
    user: String,
}

impl Relocation {
    fn shift(&self, p: GridPosition) -> Option<GridPosition> {
        p.checked_offset(self.shift_rows, self.shift_cols)
    }

    /// Moves every element, except live ones that would leave the grid.
    /// Roads move or stay as a whole. A shift past the coordinate range
    /// counts as leaving the grid.
    fn apply<T: Positioned>(
        &self,
        items: &[T],
        conflicts: &mut Vec<ResizeConflict>,
        moved: &mut Vec<EntityUuid>,
    ) -> Vec<T> {
        items
            .iter()
            .map(|item| {
                let current = item.positions();
                let shifted: Option<Vec<GridPosition>> = current.iter().map(|p| self.shift(*p)).collect();
                let fits = shifted
                    .as_ref()
                    .is_some_and(|cells| cells.iter().all(|p| p.within(self.rows, self.cols)));

                if let Some(&position) = current.first().filter(|_| !fits && !item.is_deleted()) {
                    warn!(kind = %T::KIND, uuid = %item.uuid(), %position, "element would leave the grid");
                    conflicts.push(ResizeConflict {
                        kind: T::KIND,
                        uuid: item.uuid(),
                        name: item.display_name(),
                        position,
                    });
                    return item.clone();
                }
                if shifted.is_none_or(|cells| cells == current) {
                    return item.clone();
                }

                let mut next = item.map_positions(&|p| self.shift(p).unwrap_or(p));
                debug!(kind = %T::KIND, uuid = %item.uuid(), "moved");
                next.set_stamp(self.at.clone(), &self.user);
                moved.push(item.uuid());
                next
            })
            .collect()
    }
}

/// Grows (`count > 0`) or shrinks (`count < 0`) the grid at one edge.
///
/// Changes at the top or left shift existing coordinates by `count`; changes
/// at the bottom or right leave them in place. Live elements that would end
/// up outside the new bounds stay where they are and are reported; the result
/// is returned either way. Fails before touching anything if a dimension
/// would drop below 1.
pub fn resize_grid(
    data: &CemeteryData,
    direction: GridDirection,
    count: i64,
    ctx: &EditContext,
) -> Result<ResizeOutcome, EngineError> {
    let old_rows = data.cemetery.rows();
    let old_cols = data.cemetery.cols();
    // saturated sums are never valid dimensions and fail below
    let (rows, cols) = match direction {
        GridDirection::Top | GridDirection::Bottom => (old_rows.saturating_add(count), old_cols),
        GridDirection::Left | GridDirection::Right => (old_rows, old_cols.saturating_add(count)),
    };
    if rows < 1 || cols < 1 {
        return Err(EngineError::InvalidDimensions { rows, cols });
    }
    let (Ok(new_rows), Ok(new_cols)) = (u32::try_from(rows), u32::try_from(cols)) else {
        return Err(EngineError::InvalidDimensions { rows, cols });
    };

    let (shift_rows, shift_cols) = match direction {
        GridDirection::Top => (count, 0),
        GridDirection::Left => (0, count),
        GridDirection::Bottom | GridDirection::Right => (0, 0),
    };
    let relocation = Relocation {
        shift_rows,
        shift_cols,
        rows,
        cols,
        at: ctx.now(),
        user: ctx.user().to_string(),
    };

    let mut conflicts = Vec::new();
    let mut moved = Vec::new();
    let graves = relocation.apply(&data.graves, &mut conflicts, &mut moved);
    let landmarks = relocation.apply(&data.landmarks, &mut conflicts, &mut moved);
    let roads = relocation.apply(&data.roads, &mut conflicts, &mut moved);

    let mut cemetery = data.cemetery.clone();
    cemetery.grid.rows = new_rows;
    cemetery.grid.cols = new_cols;
    cemetery.grid.valid_cells = data
        .cemetery
        .grid
        .valid_cells
        .as_ref()
        .map(|cells| resize_valid_cells(cells, &relocation, direction, count, (old_rows, old_cols)));
    cemetery.set_stamp(relocation.at.clone(), &relocation.user);

    debug!(%direction, count, rows, cols, moved = moved.len(), conflicts = conflicts.len(), "computed resize");
    Ok(ResizeOutcome {
        direction,
        count,
        cemetery,
        graves,
        landmarks,
        roads,
        conflicts,
        moved,
    })
}

/// Translates and clips the shape. Growth marks the new band fully valid;
/// shrinking never adds cells.
fn resize_valid_cells(
    cells: &ValidCells,
    relocation: &Relocation,
    direction: GridDirection,
    count: i64,
    (old_rows, old_cols): (i64, i64),
) -> ValidCells {
    let (rows, cols) = (relocation.rows, relocation.cols);
    let mut next: ValidCells = cells
        .iter()
        .filter_map(|p| relocation.shift(*p))
        .filter(|p| p.within(rows, cols))
        .collect();

    if count > 0 {
        let (row_band, col_band) = match direction {
            GridDirection::Top => (0..count, 0..cols),
            GridDirection::Bottom => (old_rows..rows, 0..cols),
            GridDirection::Left => (0..rows, 0..count),
            GridDirection::Right => (0..rows, old_cols..cols),
        };
        for row in row_band {
            for col in col_band.clone() {
                next.insert(GridPosition::new(row, col));
            }
        }
    }
    next
}
