use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;

use crate::clock::EditContext;
use crate::grid::GridPosition;
use crate::ids::EntityUuid;
use crate::timestamp::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Grave,
    Landmark,
    Road,
    Group,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grave => "grave",
            Self::Landmark => "landmark",
            Self::Road => "road",
            Self::Group => "group",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capabilities shared by every record kept in a collection.
pub trait Entity: Clone + fmt::Debug + Serialize + DeserializeOwned {
    const KIND: EntityKind;

    /// Dotted paths compared field by field when two versions are merged.
    const MERGE_FIELDS: &'static [&'static str];

    fn uuid(&self) -> EntityUuid;

    fn kind(&self) -> EntityKind {
        Self::KIND
    }

    fn is_deleted(&self) -> bool;

    fn set_deleted(&mut self, deleted: bool);

    fn last_modified(&self) -> &Timestamp;

    fn modified_by(&self) -> &str;

    /// Sets `last_modified` and `modified_by` together.
    fn set_stamp(&mut self, at: Timestamp, by: &str);

    fn display_name(&self) -> String;

    fn touch(&mut self, ctx: &EditContext) {
        self.set_stamp(ctx.now(), ctx.user());
    }
}

/// An entity placed on the grid at one or more cells.
pub trait Positioned: Entity {
    /// One cell for graves and landmarks, the whole path for roads.
    fn positions(&self) -> Vec<GridPosition>;

    fn map_positions(&self, f: &dyn Fn(GridPosition) -> GridPosition) -> Self;
}

/// An entity occupying exactly one cell.
pub trait SinglePositioned: Positioned {
    fn position(&self) -> GridPosition;
}
