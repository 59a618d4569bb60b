//! The JSON exchange document read and written by import/export.

use serde_json::Value;

use crate::error::{CoreError, ImportError};
use crate::model::CemeteryData;
use crate::validate::validate_document;

/// Serializes `data` as an exchange document.
pub fn export_document(data: &CemeteryData, pretty: bool) -> Result<String, CoreError> {
    let text = if pretty {
        serde_json::to_string_pretty(data)?
    } else {
        serde_json::to_string(data)?
    };
    Ok(text)
}

/// Parses, validates and decodes an exchange document. Either the whole
/// document is accepted or nothing is.
pub fn import_document(text: &str) -> Result<CemeteryData, ImportError> {
    let mut doc: Value = serde_json::from_str(text).map_err(|e| ImportError::Json(e.to_string()))?;
    strip_deprecated(&mut doc);

    let errors = validate_document(&doc);
    if !errors.is_empty() {
        return Err(ImportError::Validation(errors));
    }

    serde_json::from_value(doc).map_err(|e| ImportError::Validation(vec![format!("root: {e}")]))
}

/// Older documents carried a free-text `plot` on each grave.
fn strip_deprecated(doc: &mut Value) {
    if let Some(graves) = doc.get_mut("graves").and_then(Value::as_array_mut) {
        for grave in graves {
            if let Some(object) = grave.as_object_mut() {
                object.remove("plot");
            }
        }
    }
}
