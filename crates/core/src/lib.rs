pub mod clock;
pub mod digest;
pub mod entity;
pub mod error;
pub mod exchange;
pub mod field;
pub mod grid;
pub mod ids;
pub mod model;
pub mod spatial;
pub mod timestamp;
pub mod validate;

pub use clock::{Clock, EditContext, FixedClock, ManualClock, SystemClock};
pub use entity::{Entity, EntityKind, Positioned, SinglePositioned};
pub use error::{CoreError, ImportError};
pub use exchange::{export_document, import_document};
pub use grid::{CellKey, GeoPoint, GridPosition, ValidCells};
pub use ids::*;
pub use model::*;
pub use spatial::{detect_occupancy_conflicts, detect_spatial_conflicts, Occupant};
pub use timestamp::Timestamp;
