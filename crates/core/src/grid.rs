use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::CoreError;

/// A `{row, col}` grid coordinate. Coordinates are signed so that positions
/// pushed outside the grid by a resize can still be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GridPosition {
    pub row: i64,
    pub col: i64,
}

impl GridPosition {
    pub const fn new(row: i64, col: i64) -> Self {
        Self { row, col }
    }

    pub fn key(&self) -> CellKey {
        CellKey(format!("{},{}", self.row, self.col))
    }

    /// `None` when either coordinate would overflow.
    pub fn checked_offset(&self, d_row: i64, d_col: i64) -> Option<Self> {
        Some(Self::new(self.row.checked_add(d_row)?, self.col.checked_add(d_col)?))
    }

    /// Inside `[0, rows) x [0, cols)`.
    pub fn within(&self, rows: i64, cols: i64) -> bool {
        (0..rows).contains(&self.row) && (0..cols).contains(&self.col)
    }
}

impl fmt::Display for GridPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Canonical `"row,col"` form of a coordinate, used for every
/// position-keyed map and set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellKey(String);

impl CellKey {
    /// Accepts only the canonical form, so a key read from a document is
    /// written back byte for byte.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let key = Self::position_of(s)?.key();
        if key.0 != s {
            return Err(CoreError::InvalidCellKey(s.to_string()));
        }
        Ok(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn position(&self) -> Result<GridPosition, CoreError> {
        Self::position_of(&self.0)
    }

    fn position_of(s: &str) -> Result<GridPosition, CoreError> {
        let invalid = || CoreError::InvalidCellKey(s.to_string());
        let (row, col) = s.split_once(',').ok_or_else(invalid)?;
        let row = row.parse::<i64>().map_err(|_| invalid())?;
        let col = col.parse::<i64>().map_err(|_| invalid())?;
        Ok(GridPosition::new(row, col))
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<GridPosition> for CellKey {
    fn from(p: GridPosition) -> Self {
        p.key()
    }
}

/// The set of cells considered inside the cemetery boundary.
///
/// On the wire this is an array of `"row,col"` strings; the conversion is
/// done explicitly in the `Serialize`/`Deserialize` impls below.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidCells(BTreeSet<GridPosition>);

impl ValidCells {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every cell of a `rows x cols` rectangle.
    pub fn rectangle(rows: i64, cols: i64) -> Self {
        (0..rows)
            .flat_map(|row| (0..cols).map(move |col| GridPosition::new(row, col)))
            .collect()
    }

    pub fn contains(&self, position: &GridPosition) -> bool {
        self.0.contains(position)
    }

    pub fn insert(&mut self, position: GridPosition) -> bool {
        self.0.insert(position)
    }

    pub fn remove(&mut self, position: &GridPosition) -> bool {
        self.0.remove(position)
    }

    /// Flip membership of one cell. Returns the new membership.
    pub fn toggle(&mut self, position: GridPosition) -> bool {
        if self.0.remove(&position) {
            false
        } else {
            self.0.insert(position);
            true
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GridPosition> {
        self.0.iter()
    }

    pub fn keys(&self) -> Vec<CellKey> {
        self.0.iter().map(GridPosition::key).collect()
    }

    pub fn from_keys<'a>(keys: impl IntoIterator<Item = &'a str>) -> Result<Self, CoreError> {
        keys.into_iter()
            .map(|k| CellKey::parse(k).and_then(|k| k.position()))
            .collect()
    }

    /// Keep only cells inside `[0, rows) x [0, cols)`.
    pub fn clipped(&self, rows: i64, cols: i64) -> Self {
        self.0.iter().copied().filter(|p| p.within(rows, cols)).collect()
    }
}

impl FromIterator<GridPosition> for ValidCells {
    fn from_iter<I: IntoIterator<Item = GridPosition>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Serialize for ValidCells {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter().map(|p| p.key().0))
    }
}

impl<'de> Deserialize<'de> for ValidCells {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let keys: Vec<String> = Deserialize::deserialize(deserializer)?;
        ValidCells::from_keys(keys.iter().map(String::as_str)).map_err(serde::de::Error::custom)
    }
}

/// `validCells: []` on the wire means the same as an absent key.
pub(crate) fn empty_cells_as_none<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<ValidCells>, D::Error> {
    let cells: Option<ValidCells> = Option::deserialize(deserializer)?;
    Ok(cells.filter(|c| !c.is_empty()))
}

/// A GeoJSON point; `coordinates` is `[lon, lat]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    #[serde(rename = "type")]
    pub kind: GeoPointType,
    pub coordinates: [f64; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeoPointType {
    Point,
}

impl GeoPoint {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self {
            kind: GeoPointType::Point,
            coordinates: [lon, lat],
        }
    }
}
