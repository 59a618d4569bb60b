use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityKind, Positioned, SinglePositioned};
use crate::grid::{empty_cells_as_none, GeoPoint, GridPosition, ValidCells};
use crate::ids::EntityUuid;
use crate::timestamp::Timestamp;

/// Key of the single cemetery record.
pub const CEMETERY_ID: &str = "current";

pub const DEFAULT_ROAD_COLOR: &str = "#9ca3af";

pub const SCHEMA_VERSION: &str = "1.0.0";

fn default_road_color() -> String {
    DEFAULT_ROAD_COLOR.to_string()
}

// ============================================================================
// Graves
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraveProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// `YYYY-MM-DD`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth: Option<String>,
    /// `YYYY-MM-DD`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub death: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inscription: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Groups this grave belongs to. Groups never list their members.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_ids: Vec<EntityUuid>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deleted: bool,
    pub last_modified: Timestamp,
    pub modified_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grave {
    pub uuid: EntityUuid,
    pub grid: GridPosition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<GeoPoint>,
    pub properties: GraveProperties,
}

impl Grave {
    pub fn new(uuid: EntityUuid, grid: GridPosition, last_modified: Timestamp, modified_by: &str) -> Self {
        Self {
            uuid,
            grid,
            geometry: None,
            properties: GraveProperties {
                name: None,
                birth: None,
                death: None,
                inscription: None,
                notes: None,
                group_ids: Vec::new(),
                deleted: false,
                last_modified,
                modified_by: modified_by.to_string(),
            },
        }
    }
}

impl Entity for Grave {
    const KIND: EntityKind = EntityKind::Grave;
    const MERGE_FIELDS: &'static [&'static str] = &[
        "grid",
        "geometry",
        "properties.name",
        "properties.birth",
        "properties.death",
        "properties.inscription",
        "properties.notes",
        "properties.group_ids",
        "properties.deleted",
    ];

    fn uuid(&self) -> EntityUuid {
        self.uuid
    }

    fn is_deleted(&self) -> bool {
        self.properties.deleted
    }

    fn set_deleted(&mut self, deleted: bool) {
        self.properties.deleted = deleted;
    }

    fn last_modified(&self) -> &Timestamp {
        &self.properties.last_modified
    }

    fn modified_by(&self) -> &str {
        &self.properties.modified_by
    }

    fn set_stamp(&mut self, at: Timestamp, by: &str) {
        self.properties.last_modified = at;
        self.properties.modified_by = by.to_string();
    }

    fn display_name(&self) -> String {
        non_empty(&self.properties.name).unwrap_or_else(|| "Unnamed grave".to_string())
    }
}

impl Positioned for Grave {
    fn positions(&self) -> Vec<GridPosition> {
        vec![self.grid]
    }

    fn map_positions(&self, f: &dyn Fn(GridPosition) -> GridPosition) -> Self {
        Self {
            grid: f(self.grid),
            ..self.clone()
        }
    }
}

impl SinglePositioned for Grave {
    fn position(&self) -> GridPosition {
        self.grid
    }
}

// ============================================================================
// Landmarks
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LandmarkType {
    Tree,
    Pine,
    Bench,
    Statue,
    Building,
    Other,
}

impl LandmarkType {
    pub const ALL: [LandmarkType; 6] = [
        Self::Tree,
        Self::Pine,
        Self::Bench,
        Self::Statue,
        Self::Building,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tree => "tree",
            Self::Pine => "pine",
            Self::Bench => "bench",
            Self::Statue => "statue",
            Self::Building => "building",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deleted: bool,
    pub last_modified: Timestamp,
    pub modified_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub uuid: EntityUuid,
    pub landmark_type: LandmarkType,
    pub grid: GridPosition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<GeoPoint>,
    pub properties: LandmarkProperties,
}

impl Landmark {
    pub fn new(
        uuid: EntityUuid,
        landmark_type: LandmarkType,
        grid: GridPosition,
        last_modified: Timestamp,
        modified_by: &str,
    ) -> Self {
        Self {
            uuid,
            landmark_type,
            grid,
            geometry: None,
            properties: LandmarkProperties {
                name: None,
                description: None,
                notes: None,
                deleted: false,
                last_modified,
                modified_by: modified_by.to_string(),
            },
        }
    }
}

impl Entity for Landmark {
    const KIND: EntityKind = EntityKind::Landmark;
    const MERGE_FIELDS: &'static [&'static str] = &[
        "landmark_type",
        "grid",
        "geometry",
        "properties.name",
        "properties.description",
        "properties.notes",
        "properties.deleted",
    ];

    fn uuid(&self) -> EntityUuid {
        self.uuid
    }

    fn is_deleted(&self) -> bool {
        self.properties.deleted
    }

    fn set_deleted(&mut self, deleted: bool) {
        self.properties.deleted = deleted;
    }

    fn last_modified(&self) -> &Timestamp {
        &self.properties.last_modified
    }

    fn modified_by(&self) -> &str {
        &self.properties.modified_by
    }

    fn set_stamp(&mut self, at: Timestamp, by: &str) {
        self.properties.last_modified = at;
        self.properties.modified_by = by.to_string();
    }

    fn display_name(&self) -> String {
        non_empty(&self.properties.name)
            .unwrap_or_else(|| format!("{} landmark", self.landmark_type.as_str()))
    }
}

impl Positioned for Landmark {
    fn positions(&self) -> Vec<GridPosition> {
        vec![self.grid]
    }

    fn map_positions(&self, f: &dyn Fn(GridPosition) -> GridPosition) -> Self {
        Self {
            grid: f(self.grid),
            ..self.clone()
        }
    }
}

impl SinglePositioned for Landmark {
    fn position(&self) -> GridPosition {
        self.grid
    }
}

// ============================================================================
// Roads
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadProperties {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default = "default_road_color")]
    pub color: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deleted: bool,
    pub last_modified: Timestamp,
    pub modified_by: String,
}

/// A path of cells. `cells` is ordered and only empty while being drawn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Road {
    pub uuid: EntityUuid,
    pub cells: Vec<GridPosition>,
    pub properties: RoadProperties,
}

impl Road {
    pub fn new(
        uuid: EntityUuid,
        cells: Vec<GridPosition>,
        color: &str,
        last_modified: Timestamp,
        modified_by: &str,
    ) -> Self {
        Self {
            uuid,
            cells,
            properties: RoadProperties {
                name: None,
                description: None,
                notes: None,
                color: color.to_string(),
                deleted: false,
                last_modified,
                modified_by: modified_by.to_string(),
            },
        }
    }
}

impl Entity for Road {
    const KIND: EntityKind = EntityKind::Road;
    const MERGE_FIELDS: &'static [&'static str] = &[
        "cells",
        "properties.name",
        "properties.description",
        "properties.notes",
        "properties.color",
        "properties.deleted",
    ];

    fn uuid(&self) -> EntityUuid {
        self.uuid
    }

    fn is_deleted(&self) -> bool {
        self.properties.deleted
    }

    fn set_deleted(&mut self, deleted: bool) {
        self.properties.deleted = deleted;
    }

    fn last_modified(&self) -> &Timestamp {
        &self.properties.last_modified
    }

    fn modified_by(&self) -> &str {
        &self.properties.modified_by
    }

    fn set_stamp(&mut self, at: Timestamp, by: &str) {
        self.properties.last_modified = at;
        self.properties.modified_by = by.to_string();
    }

    fn display_name(&self) -> String {
        non_empty(&self.properties.name).unwrap_or_else(|| "Unnamed road".to_string())
    }
}

impl Positioned for Road {
    fn positions(&self) -> Vec<GridPosition> {
        self.cells.clone()
    }

    fn map_positions(&self, f: &dyn Fn(GridPosition) -> GridPosition) -> Self {
        Self {
            cells: self.cells.iter().map(|c| f(*c)).collect(),
            ..self.clone()
        }
    }
}

// ============================================================================
// Groups
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupProperties {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deleted: bool,
    pub last_modified: Timestamp,
    pub modified_by: String,
}

/// Named set of graves. Membership is recorded on each grave.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub uuid: EntityUuid,
    pub properties: GroupProperties,
}

impl Group {
    pub fn new(uuid: EntityUuid, name: &str, last_modified: Timestamp, modified_by: &str) -> Self {
        Self {
            uuid,
            properties: GroupProperties {
                name: name.to_string(),
                description: None,
                color: None,
                deleted: false,
                last_modified,
                modified_by: modified_by.to_string(),
            },
        }
    }
}

impl Entity for Group {
    const KIND: EntityKind = EntityKind::Group;
    const MERGE_FIELDS: &'static [&'static str] = &[
        "properties.name",
        "properties.description",
        "properties.color",
        "properties.deleted",
    ];

    fn uuid(&self) -> EntityUuid {
        self.uuid
    }

    fn is_deleted(&self) -> bool {
        self.properties.deleted
    }

    fn set_deleted(&mut self, deleted: bool) {
        self.properties.deleted = deleted;
    }

    fn last_modified(&self) -> &Timestamp {
        &self.properties.last_modified
    }

    fn modified_by(&self) -> &str {
        &self.properties.modified_by
    }

    fn set_stamp(&mut self, at: Timestamp, by: &str) {
        self.properties.last_modified = at;
        self.properties.modified_by = by.to_string();
    }

    fn display_name(&self) -> String {
        if self.properties.name.trim().is_empty() {
            "Unnamed group".to_string()
        } else {
            self.properties.name.clone()
        }
    }
}

// ============================================================================
// Cemetery
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CemeteryGrid {
    pub rows: u32,
    pub cols: u32,
    #[serde(rename = "cellSize", default, skip_serializing_if = "Option::is_none")]
    pub cell_size: Option<u32>,
    /// `None` means every in-bounds cell is valid.
    #[serde(
        rename = "validCells",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_cells_as_none"
    )]
    pub valid_cells: Option<ValidCells>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cemetery {
    pub id: String,
    pub name: String,
    pub grid: CemeteryGrid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    pub last_modified: Timestamp,
    pub modified_by: String,
}

impl Cemetery {
    pub fn new(name: &str, rows: u32, cols: u32, last_modified: Timestamp, modified_by: &str) -> Self {
        Self {
            id: CEMETERY_ID.to_string(),
            name: name.to_string(),
            grid: CemeteryGrid {
                rows,
                cols,
                cell_size: None,
                valid_cells: None,
            },
            license: None,
            last_modified,
            modified_by: modified_by.to_string(),
        }
    }

    pub fn rows(&self) -> i64 {
        i64::from(self.grid.rows)
    }

    pub fn cols(&self) -> i64 {
        i64::from(self.grid.cols)
    }

    pub fn set_stamp(&mut self, at: Timestamp, by: &str) {
        self.last_modified = at;
        self.modified_by = by.to_string();
    }

    /// Bounds first, then shape membership when a shape is set.
    pub fn is_cell_valid(&self, position: &GridPosition) -> bool {
        if !position.within(self.rows(), self.cols()) {
            return false;
        }
        match &self.grid.valid_cells {
            Some(cells) if !cells.is_empty() => cells.contains(position),
            _ => true,
        }
    }

    /// Every cell of the rectangle, as a starting point for shape editing.
    pub fn all_cells(&self) -> ValidCells {
        ValidCells::rectangle(self.rows(), self.cols())
    }
}

// ============================================================================
// Change log and the exchange unit
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Set,
    Delete,
}

/// Append-only audit record. Never replayed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeLogEntry {
    pub op: ChangeOp,
    pub uuid: EntityUuid,
    pub changes: serde_json::Map<String, serde_json::Value>,
    pub timestamp: Timestamp,
    pub user: String,
}

/// The unit that is imported, exported and merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CemeteryData {
    pub schema_version: String,
    pub cemetery: Cemetery,
    pub graves: Vec<Grave>,
    #[serde(default)]
    pub landmarks: Vec<Landmark>,
    #[serde(default)]
    pub roads: Vec<Road>,
    #[serde(default)]
    pub groups: Vec<Group>,
    pub change_log: Vec<ChangeLogEntry>,
}

impl CemeteryData {
    pub fn new(cemetery: Cemetery) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            cemetery,
            graves: Vec::new(),
            landmarks: Vec::new(),
            roads: Vec::new(),
            groups: Vec::new(),
            change_log: Vec::new(),
        }
    }

    pub fn grave(&self, uuid: EntityUuid) -> Option<&Grave> {
        self.graves.iter().find(|g| g.uuid == uuid)
    }

    pub fn landmark(&self, uuid: EntityUuid) -> Option<&Landmark> {
        self.landmarks.iter().find(|l| l.uuid == uuid)
    }

    pub fn road(&self, uuid: EntityUuid) -> Option<&Road> {
        self.roads.iter().find(|r| r.uuid == uuid)
    }

    pub fn group(&self, uuid: EntityUuid) -> Option<&Group> {
        self.groups.iter().find(|g| g.uuid == uuid)
    }
}

fn non_empty(s: &Option<String>) -> Option<String> {
    s.as_ref().filter(|s| !s.trim().is_empty()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    #[test]
    fn rectangular_validity_is_bounds_only() {
        let c = Cemetery::new("Old Hill", 3, 4, ts("2024-01-01T00:00:00Z"), "Alice");
        assert!(c.is_cell_valid(&GridPosition::new(0, 0)));
        assert!(c.is_cell_valid(&GridPosition::new(2, 3)));
        assert!(!c.is_cell_valid(&GridPosition::new(3, 0)));
        assert!(!c.is_cell_valid(&GridPosition::new(0, -1)));
    }

    #[test]
    fn shaped_validity_checks_membership() {
        let mut c = Cemetery::new("Old Hill", 3, 3, ts("2024-01-01T00:00:00Z"), "Alice");
        let mut cells = c.all_cells();
        cells.remove(&GridPosition::new(1, 1));
        c.grid.valid_cells = Some(cells);
        assert!(!c.is_cell_valid(&GridPosition::new(1, 1)));
        assert!(c.is_cell_valid(&GridPosition::new(0, 1)));
    }

    #[test]
    fn display_name_fallbacks() {
        let at = ts("2024-01-01T00:00:00Z");
        let grave = Grave::new(EntityUuid::new(), GridPosition::new(0, 0), at.clone(), "a");
        assert_eq!(grave.display_name(), "Unnamed grave");
        let bench = Landmark::new(EntityUuid::new(), LandmarkType::Bench, GridPosition::new(0, 0), at.clone(), "a");
        assert_eq!(bench.display_name(), "bench landmark");
        let road = Road::new(EntityUuid::new(), vec![], DEFAULT_ROAD_COLOR, at, "a");
        assert_eq!(road.display_name(), "Unnamed road");
    }

    #[test]
    fn deleted_false_is_not_deleted() {
        let mut grave = Grave::new(
            EntityUuid::new(),
            GridPosition::new(0, 0),
            ts("2024-01-01T00:00:00Z"),
            "a",
        );
        assert!(!grave.is_deleted());
        grave.set_deleted(false);
        assert!(!grave.is_deleted());
        grave.set_deleted(true);
        assert!(grave.is_deleted());
    }

    #[test]
    fn road_map_positions_moves_every_cell() {
        let road = Road::new(
            EntityUuid::new(),
            vec![GridPosition::new(0, 0), GridPosition::new(0, 1)],
            DEFAULT_ROAD_COLOR,
            ts("2024-01-01T00:00:00Z"),
            "a",
        );
        let moved = road.map_positions(&|p| GridPosition::new(p.row + 2, p.col));
        assert_eq!(moved.cells, vec![GridPosition::new(2, 0), GridPosition::new(2, 1)]);
        assert_eq!(moved.uuid, road.uuid);
    }
}
