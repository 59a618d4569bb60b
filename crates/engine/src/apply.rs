use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use stonebystone_core::{field, CemeteryData, ChangeLogEntry, Entity, EntityUuid};

use crate::error::EngineError;
use crate::merge::{KindMerge, MergeConflict, MergeResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionChoice {
    Local,
    Incoming,
    Manual,
}

/// A human decision for one [`MergeConflict`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictResolution {
    pub uuid: EntityUuid,
    pub field: String,
    pub resolved_value: Value,
    pub resolution: ResolutionChoice,
}

impl ConflictResolution {
    pub fn keep_local(conflict: &MergeConflict) -> Self {
        Self {
            uuid: conflict.uuid,
            field: conflict.field.clone(),
            resolved_value: conflict.local_value.clone(),
            resolution: ResolutionChoice::Local,
        }
    }

    pub fn take_incoming(conflict: &MergeConflict) -> Self {
        Self {
            uuid: conflict.uuid,
            field: conflict.field.clone(),
            resolved_value: conflict.incoming_value.clone(),
            resolution: ResolutionChoice::Incoming,
        }
    }

    pub fn manual(conflict: &MergeConflict, value: Value) -> Self {
        Self {
            uuid: conflict.uuid,
            field: conflict.field.clone(),
            resolved_value: value,
            resolution: ResolutionChoice::Manual,
        }
    }

    pub fn answers(&self, conflict: &MergeConflict) -> bool {
        self.uuid == conflict.uuid && self.field == conflict.field
    }
}

/// Builds the dataset that replaces local storage after a merge.
///
/// Local collections keep their order; added entities are appended. The
/// cemetery comes from whichever side is strictly newer, ties keep local.
/// `schema_version` is taken from `incoming`.
pub fn apply_merge_result(
    local: &CemeteryData,
    incoming: &CemeteryData,
    result: &MergeResult,
    resolutions: &[ConflictResolution],
) -> Result<CemeteryData, EngineError> {
    let mut merged = CemeteryData {
        schema_version: incoming.schema_version.clone(),
        cemetery: if incoming.cemetery.last_modified > local.cemetery.last_modified {
            incoming.cemetery.clone()
        } else {
            local.cemetery.clone()
        },
        graves: overlay(&local.graves, &result.graves),
        landmarks: overlay(&local.landmarks, &result.landmarks),
        roads: overlay(&local.roads, &result.roads),
        groups: overlay(&local.groups, &result.groups),
        change_log: merge_change_logs(&local.change_log, &incoming.change_log),
    };

    for resolution in resolutions {
        let applied = resolve_in(&mut merged.graves, resolution)?
            || resolve_in(&mut merged.landmarks, resolution)?
            || resolve_in(&mut merged.roads, resolution)?
            || resolve_in(&mut merged.groups, resolution)?;
        if !applied {
            return Err(invalid(resolution));
        }
    }

    debug!(
        graves = merged.graves.len(),
        landmarks = merged.landmarks.len(),
        roads = merged.roads.len(),
        groups = merged.groups.len(),
        changes = merged.change_log.len(),
        resolutions = resolutions.len(),
        "applied merge result"
    );
    Ok(merged)
}

fn overlay<T: Entity>(base: &[T], merged: &KindMerge<T>) -> Vec<T> {
    let mut out = base.to_vec();
    let mut index: HashMap<EntityUuid, usize> = out.iter().enumerate().map(|(i, e)| (e.uuid(), i)).collect();
    for entity in merged.updated.iter().chain(&merged.added) {
        match index.get(&entity.uuid()) {
            Some(&i) => out[i] = entity.clone(),
            None => {
                index.insert(entity.uuid(), out.len());
                out.push(entity.clone());
            }
        }
    }
    out
}

/// `Ok(false)` when no entity in `items` has the resolution's uuid. The
/// entity's stamp is left as the merge produced it.
fn resolve_in<T: Entity>(items: &mut [T], resolution: &ConflictResolution) -> Result<bool, EngineError> {
    let Some(slot) = items.iter_mut().find(|e| e.uuid() == resolution.uuid) else {
        return Ok(false);
    };
    if !T::MERGE_FIELDS.contains(&resolution.field.as_str()) {
        return Err(invalid(resolution));
    }
    let mut json = serde_json::to_value(&*slot).map_err(stonebystone_core::CoreError::from)?;
    field::assign(&mut json, &resolution.field, resolution.resolved_value.clone())?;
    *slot = serde_json::from_value(json).map_err(|e| EngineError::InvalidResolution {
        uuid: resolution.uuid.to_string(),
        field: format!("{} ({e})", resolution.field),
    })?;
    Ok(true)
}

fn invalid(resolution: &ConflictResolution) -> EngineError {
    EngineError::InvalidResolution {
        uuid: resolution.uuid.to_string(),
        field: resolution.field.clone(),
    }
}

/// Union of both logs without repeats of `(uuid, timestamp, op)`, ordered
/// by timestamp. Entries with equal timestamps keep local-then-incoming order.
pub fn merge_change_logs(local: &[ChangeLogEntry], incoming: &[ChangeLogEntry]) -> Vec<ChangeLogEntry> {
    let mut seen = HashSet::new();
    let mut merged: Vec<ChangeLogEntry> = local
        .iter()
        .chain(incoming)
        .filter(|e| seen.insert((e.uuid, e.timestamp.clone(), e.op)))
        .cloned()
        .collect();
    merged.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    merged
}
