//! Dotted-path access into the JSON form of an entity.
//!
//! Merge and conflict resolution address fields as `"grid"` or
//! `"properties.inscription"`. Reading a missing key yields `Null`, so an
//! absent field and an explicit `null` compare equal.

use serde_json::{Map, Value};

use crate::error::CoreError;

fn segments(path: &str) -> Result<Vec<&str>, CoreError> {
    let parts: Vec<&str> = path.split('.').collect();
    if parts.iter().any(|p| p.is_empty()) {
        return Err(CoreError::InvalidFieldPath(path.to_string()));
    }
    Ok(parts)
}

/// Value at `path`, or `Null` when any segment is missing.
pub fn lookup(root: &Value, path: &str) -> Value {
    let mut current = root;
    for segment in path.split('.') {
        match current.get(segment) {
            Some(next) => current = next,
            None => return Value::Null,
        }
    }
    current.clone()
}

/// Write `value` at `path`, creating intermediate objects as needed.
/// Assigning `Null` removes the key so optional fields stay absent.
pub fn assign(root: &mut Value, path: &str, value: Value) -> Result<(), CoreError> {
    let parts = segments(path)?;
    let (last, parents) = parts
        .split_last()
        .ok_or_else(|| CoreError::InvalidFieldPath(path.to_string()))?;

    let mut current = root;
    for segment in parents {
        let object = as_object(current, path)?;
        current = object
            .entry((*segment).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    let object = as_object(current, path)?;
    if value.is_null() {
        object.remove(*last);
    } else {
        object.insert((*last).to_string(), value);
    }
    Ok(())
}

fn as_object<'a>(value: &'a mut Value, path: &str) -> Result<&'a mut Map<String, Value>, CoreError> {
    if value.is_null() {
        *value = Value::Object(Map::new());
    }
    value
        .as_object_mut()
        .ok_or_else(|| CoreError::InvalidFieldPath(path.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lookup_nested_and_missing() {
        let v = json!({"grid": {"row": 2, "col": 3}, "properties": {"name": "Ada"}});
        assert_eq!(lookup(&v, "properties.name"), json!("Ada"));
        assert_eq!(lookup(&v, "grid"), json!({"row": 2, "col": 3}));
        assert_eq!(lookup(&v, "properties.notes"), Value::Null);
        assert_eq!(lookup(&v, "geometry.coordinates"), Value::Null);
    }

    #[test]
    fn assign_replaces_and_removes() -> Result<(), Box<dyn std::error::Error>> {
        let mut v = json!({"properties": {"name": "Ada", "notes": "x"}});
        assign(&mut v, "properties.name", json!("Grace"))?;
        assign(&mut v, "properties.notes", Value::Null)?;
        assert_eq!(v, json!({"properties": {"name": "Grace"}}));
        Ok(())
    }

    #[test]
    fn assign_creates_intermediate_objects() -> Result<(), Box<dyn std::error::Error>> {
        let mut v = json!({});
        assign(&mut v, "geometry.type", json!("Point"))?;
        assert_eq!(v, json!({"geometry": {"type": "Point"}}));
        Ok(())
    }

    #[test]
    fn assign_rejects_bad_paths() {
        let mut v = json!({"name": "scalar"});
        assert!(assign(&mut v, "", json!(1)).is_err());
        assert!(assign(&mut v, "a..b", json!(1)).is_err());
        assert!(assign(&mut v, "name.inner", json!(1)).is_err());
    }
}
