use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid cell key: {0:?}")]
    InvalidCellKey(String),

    #[error("invalid timestamp: {0:?}")]
    InvalidTimestamp(String),

    #[error("invalid field path: {0}")]
    InvalidFieldPath(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Serialization(e.to_string())
    }
}

/// Failure at the file boundary. Nothing is imported when either variant is
/// returned.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("invalid JSON: {0}")]
    Json(String),

    #[error("document failed validation with {} error(s)", .0.len())]
    Validation(Vec<String>),
}

impl ImportError {
    /// Human-readable lines suitable for display.
    pub fn messages(&self) -> Vec<String> {
        match self {
            ImportError::Json(msg) => vec![format!("root: Invalid JSON: {msg}")],
            ImportError::Validation(errors) => errors.clone(),
        }
    }
}
