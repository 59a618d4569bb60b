use stonebystone_core::{CoreError, ImportError};
use stonebystone_storage::StorageError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("import failed: {0}")]
    Import(#[from] ImportError),

    #[error("grid dimensions must be at least 1x1 (resize would give {rows}x{cols})")]
    InvalidDimensions { rows: i64, cols: i64 },

    #[error("entity not found: {0}")]
    EntityNotFound(String),

    #[error("entity already deleted: {0}")]
    EntityAlreadyDeleted(String),

    #[error("road has no cells: {0}")]
    EmptyRoad(String),

    #[error("no cemetery has been created")]
    NoCemetery,

    #[error("{0} merge conflict(s) have no resolution")]
    UnresolvedConflicts(usize),

    #[error("resolution does not match a mergeable field: {uuid} {field}")]
    InvalidResolution { uuid: String, field: String },

    #[error("resize leaves {0} element(s) outside the grid")]
    ResizeConflicts(usize),
}
