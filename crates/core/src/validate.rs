//! Validation of an exchange document before typed decoding.
//!
//! The document's shape is checked against `schema/cemetery.schema.json`.
//! Uuid uniqueness per collection and outline cells lying inside the grid
//! are checked afterwards, since a schema cannot express them. Messages have
//! the form `"<json-pointer>: <message>"` with `root` standing for the
//! document itself.

use std::collections::HashSet;
use std::sync::LazyLock;

use jsonschema::error::ValidationErrorKind;
use jsonschema::{Draft, JSONSchema, ValidationError};
use serde_json::Value;

use crate::grid::CellKey;

const DATE_MESSAGE: &str = "Invalid date format. Use YYYY-MM-DD (e.g., 2024-01-15) or leave empty";
const DATE_TIME_MESSAGE: &str =
    "Invalid date-time format. Use ISO8601 format (e.g., 2024-01-15T12:00:00.000Z)";
const UUID_MESSAGE: &str = "Invalid UUID format. Must be a valid UUID v4";

/// Must match `definitions.uuid.pattern` in the schema.
const UUID_PATTERN: &str =
    "^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-4[0-9a-fA-F]{3}-[89abAB][0-9a-fA-F]{3}-[0-9a-fA-F]{12}$";

const COLLECTIONS: [&str; 4] = ["graves", "landmarks", "roads", "groups"];

static SCHEMA: LazyLock<Result<JSONSchema, String>> = LazyLock::new(|| {
    let schema: Value = serde_json::from_str(include_str!("../schema/cemetery.schema.json"))
        .map_err(|e| e.to_string())?;
    JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(&schema)
        .map_err(|e| e.to_string())
});

/// Returns every problem found in `doc`; an empty list means it is valid.
pub fn validate_document(doc: &Value) -> Vec<String> {
    let schema = match &*SCHEMA {
        Ok(schema) => schema,
        Err(e) => return vec![report("", format!("exchange schema failed to load: {e}"))],
    };

    let mut errors = Vec::new();
    if let Err(violations) = schema.validate(doc) {
        errors.extend(violations.map(|e| describe(&e)));
    }
    check_unique_uuids(doc, &mut errors);
    check_outline(doc, &mut errors);
    errors
}

fn report(path: &str, message: impl AsRef<str>) -> String {
    let at = if path.is_empty() { "root" } else { path };
    format!("{at}: {}", message.as_ref())
}

/// Swaps the terse format messages for ones that tell the user what to type.
fn describe(error: &ValidationError<'_>) -> String {
    let message = match &error.kind {
        ValidationErrorKind::Format { format } if *format == "date" => DATE_MESSAGE.to_owned(),
        ValidationErrorKind::Format { format } if *format == "date-time" => DATE_TIME_MESSAGE.to_owned(),
        ValidationErrorKind::Pattern { pattern } if *pattern == UUID_PATTERN => UUID_MESSAGE.to_owned(),
        _ => error.to_string(),
    };
    report(&error.instance_path.to_string(), message)
}

fn check_unique_uuids(doc: &Value, errors: &mut Vec<String>) {
    for collection in COLLECTIONS {
        let Some(items) = doc.get(collection).and_then(Value::as_array) else {
            continue;
        };
        let mut seen = HashSet::new();
        for (i, item) in items.iter().enumerate() {
            let Some(uuid) = item.get("uuid").and_then(Value::as_str) else {
                continue;
            };
            if !seen.insert(uuid.to_ascii_lowercase()) {
                errors.push(report(&format!("/{collection}/{i}/uuid"), "duplicate uuid in collection"));
            }
        }
    }
}

/// Outline keys must be canonical `"row,col"` keys inside the rectangle.
fn check_outline(doc: &Value, errors: &mut Vec<String>) {
    let Some(grid) = doc.get("cemetery").and_then(|c| c.get("grid")) else {
        return;
    };
    let Some(cells) = grid.get("validCells").and_then(Value::as_array) else {
        return;
    };
    let rows = grid.get("rows").and_then(Value::as_i64).filter(|r| *r >= 1);
    let cols = grid.get("cols").and_then(Value::as_i64).filter(|c| *c >= 1);

    for (i, key) in cells.iter().enumerate() {
        // non-strings are already reported by the schema
        let Some(key) = key.as_str() else {
            continue;
        };
        let path = format!("/cemetery/grid/validCells/{i}");
        match CellKey::parse(key).and_then(|k| k.position()) {
            Ok(position) => {
                if let (Some(r), Some(c)) = (rows, cols) {
                    if !position.within(r, c) {
                        errors.push(report(&path, "cell lies outside the grid"));
                    }
                }
            }
            Err(_) => errors.push(report(&path, "must be a \"row,col\" cell key")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const U1: &str = "6f1c2a4e-8b3d-4f5a-9c7e-1d2b3c4d5e6f";
    const U2: &str = "0a9b8c7d-6e5f-4a3b-8c2d-1e0f9a8b7c6d";

    fn minimal() -> Value {
        json!({
            "schema_version": "1.0.0",
            "cemetery": {
                "id": "current",
                "name": "Old Hill",
                "grid": {"rows": 3, "cols": 3},
                "last_modified": "2024-01-15T12:00:00.000Z",
                "modified_by": "Alice"
            },
            "graves": [],
            "change_log": []
        })
    }

    fn at<'a>(errors: &'a [String], pointer: &str) -> Vec<&'a String> {
        let prefix = format!("{pointer}: ");
        errors.iter().filter(|e| e.starts_with(&prefix)).collect()
    }

    #[test]
    fn schema_compiles() {
        assert!(SCHEMA.is_ok(), "{:?}", SCHEMA.as_ref().err());
    }

    #[test]
    fn minimal_document_is_valid() {
        assert_eq!(validate_document(&minimal()), Vec::<String>::new());
    }

    #[test]
    fn non_object_root_reports_root() {
        let errors = validate_document(&json!([]));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("root: "));
    }

    #[test]
    fn missing_keys_are_all_reported() {
        let errors = validate_document(&json!({"schema_version": "1.0.0"}));
        assert_eq!(at(&errors, "root").len(), 3);
        for key in ["cemetery", "graves", "change_log"] {
            assert!(errors.iter().any(|e| e.contains(key)), "{key} not reported in {errors:?}");
        }
    }

    #[test]
    fn helpful_format_messages() {
        let mut doc = minimal();
        doc["graves"] = json!([{
            "uuid": "not-a-uuid",
            "grid": {"row": 0, "col": 0},
            "properties": {
                "birth": "15/01/1900",
                "death": "",
                "group_ids": [U1, "1234"],
                "last_modified": "yesterday",
                "modified_by": "Alice"
            }
        }]);
        let errors = validate_document(&doc);
        assert!(errors.contains(&format!("/graves/0/uuid: {UUID_MESSAGE}")));
        assert!(errors.contains(&format!("/graves/0/properties/birth: {DATE_MESSAGE}")));
        assert!(errors.contains(&format!("/graves/0/properties/group_ids/1: {UUID_MESSAGE}")));
        assert!(errors.contains(&format!("/graves/0/properties/last_modified: {DATE_TIME_MESSAGE}")));
        assert_eq!(errors.len(), 4, "{errors:?}");
    }

    #[test]
    fn duplicate_uuids_and_bad_cells() {
        let mut doc = minimal();
        let grave = json!({
            "uuid": U1,
            "grid": {"row": 0, "col": 0},
            "properties": {"last_modified": "2024-01-15T12:00:00Z", "modified_by": "Alice"}
        });
        doc["graves"] = json!([grave.clone(), grave]);
        doc["cemetery"]["grid"]["validCells"] = json!(["0,0", "5,5", "x", "01,2"]);
        let errors = validate_document(&doc);
        assert!(errors.contains(&"/graves/1/uuid: duplicate uuid in collection".to_string()));
        assert!(errors.contains(&"/cemetery/grid/validCells/1: cell lies outside the grid".to_string()));
        assert!(errors.contains(&"/cemetery/grid/validCells/2: must be a \"row,col\" cell key".to_string()));
        assert!(errors.contains(&"/cemetery/grid/validCells/3: must be a \"row,col\" cell key".to_string()));
        assert_eq!(errors.len(), 4, "{errors:?}");
    }

    #[test]
    fn same_uuid_in_different_collections_is_fine() {
        let mut doc = minimal();
        doc["graves"] = json!([{
            "uuid": U2,
            "grid": {"row": 0, "col": 0},
            "properties": {"last_modified": "2024-01-15T12:00:00Z", "modified_by": "Alice"}
        }]);
        doc["groups"] = json!([{
            "uuid": U2,
            "properties": {"name": "Family", "last_modified": "2024-01-15T12:00:00Z", "modified_by": "Alice"}
        }]);
        assert_eq!(validate_document(&doc), Vec::<String>::new());
    }

    #[test]
    fn landmark_type_and_change_op_are_closed_sets() {
        let mut doc = minimal();
        doc["landmarks"] = json!([{
            "uuid": U2,
            "landmark_type": "fountain",
            "grid": {"row": 1, "col": 1},
            "properties": {"last_modified": "2024-01-15T12:00:00Z", "modified_by": "Bob"}
        }]);
        doc["change_log"] = json!([{
            "op": "patch", "uuid": U2, "changes": {},
            "timestamp": "2024-01-15T12:00:00Z", "user": "Bob"
        }]);
        let errors = validate_document(&doc);
        assert_eq!(errors.len(), 2, "{errors:?}");
        assert_eq!(at(&errors, "/landmarks/0/landmark_type").len(), 1);
        assert_eq!(at(&errors, "/change_log/0/op").len(), 1);
    }

    #[test]
    fn zero_rows_rejected() {
        let mut doc = minimal();
        doc["cemetery"]["grid"]["rows"] = json!(0);
        let errors = validate_document(&doc);
        assert_eq!(errors.len(), 1, "{errors:?}");
        assert_eq!(at(&errors, "/cemetery/grid/rows").len(), 1);
    }

    #[test]
    fn null_deleted_flag_rejected() {
        let mut doc = minimal();
        doc["roads"] = json!([{
            "uuid": U1,
            "cells": [{"row": 0, "col": 0}],
            "properties": {"deleted": null, "last_modified": "2024-01-15T12:00:00Z", "modified_by": "Bob"}
        }]);
        let errors = validate_document(&doc);
        assert_eq!(at(&errors, "/roads/0/properties/deleted").len(), 1, "{errors:?}");
    }
}
