//! Field-level last-writer-wins merge of two datasets.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use stonebystone_core::{
    field, CemeteryData, CoreError, Entity, EntityKind, EntityUuid, Grave, Group, Landmark, Road,
    Timestamp,
};

/// A field both sides changed at the same instant. Left at the local value
/// until someone resolves it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeConflict {
    pub kind: EntityKind,
    pub uuid: EntityUuid,
    pub field: String,
    pub local_value: Value,
    pub incoming_value: Value,
    pub local_timestamp: Timestamp,
    pub incoming_timestamp: Timestamp,
    pub local_modified_by: String,
    pub incoming_modified_by: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KindMerge<T> {
    /// Present only in the incoming dataset, taken verbatim.
    pub added: Vec<T>,
    /// Present on both sides and changed by the merge.
    pub updated: Vec<T>,
}

impl<T> Default for KindMerge<T> {
    fn default() -> Self {
        Self {
            added: Vec::new(),
            updated: Vec::new(),
        }
    }
}

impl<T> KindMerge<T> {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeResult {
    pub graves: KindMerge<Grave>,
    pub landmarks: KindMerge<Landmark>,
    pub roads: KindMerge<Road>,
    pub groups: KindMerge<Group>,
    pub conflicts: Vec<MergeConflict>,
}

impl MergeResult {
    /// Nothing added, updated or in conflict.
    pub fn is_noop(&self) -> bool {
        self.graves.is_empty()
            && self.landmarks.is_empty()
            && self.roads.is_empty()
            && self.groups.is_empty()
            && self.conflicts.is_empty()
    }

    pub fn added_count(&self) -> usize {
        self.graves.added.len() + self.landmarks.added.len() + self.roads.added.len() + self.groups.added.len()
    }

    pub fn updated_count(&self) -> usize {
        self.graves.updated.len()
            + self.landmarks.updated.len()
            + self.roads.updated.len()
            + self.groups.updated.len()
    }
}

/// Classifies every incoming entity as added, updated or unchanged and
/// collects equal-timestamp disagreements. Neither input is modified, and
/// entities missing from `incoming` are never touched.
pub fn merge_cemetery_data(local: &CemeteryData, incoming: &CemeteryData) -> Result<MergeResult, CoreError> {
    let mut conflicts = Vec::new();
    let result = MergeResult {
        graves: merge_collection(&local.graves, &incoming.graves, &mut conflicts)?,
        landmarks: merge_collection(&local.landmarks, &incoming.landmarks, &mut conflicts)?,
        roads: merge_collection(&local.roads, &incoming.roads, &mut conflicts)?,
        groups: merge_collection(&local.groups, &incoming.groups, &mut conflicts)?,
        conflicts,
    };
    debug!(
        added = result.added_count(),
        updated = result.updated_count(),
        conflicts = result.conflicts.len(),
        "merged datasets"
    );
    Ok(result)
}

fn merge_collection<T: Entity>(
    local: &[T],
    incoming: &[T],
    conflicts: &mut Vec<MergeConflict>,
) -> Result<KindMerge<T>, CoreError> {
    let local_by_uuid: HashMap<EntityUuid, &T> = local.iter().map(|e| (e.uuid(), e)).collect();

    let mut out = KindMerge::default();
    for theirs in incoming {
        match local_by_uuid.get(&theirs.uuid()) {
            None => out.added.push(theirs.clone()),
            Some(ours) => {
                if let Some(merged) = merge_entity(*ours, theirs, conflicts)? {
                    out.updated.push(merged);
                }
            }
        }
    }
    Ok(out)
}

/// Merges two versions of one entity field by field.
///
/// Returns `Some` only when the result differs from `ours`. That happens
/// exactly when `theirs` is strictly newer: its differing fields win and the
/// stamp advances. An older `theirs` changes nothing. On a tie each differing
/// field becomes a [`MergeConflict`] and `ours` is kept.
pub fn merge_entity<T: Entity>(
    ours: &T,
    theirs: &T,
    conflicts: &mut Vec<MergeConflict>,
) -> Result<Option<T>, CoreError> {
    let ours_json = serde_json::to_value(ours)?;
    let theirs_json = serde_json::to_value(theirs)?;
    let order = theirs.last_modified().cmp(ours.last_modified());

    let mut merged = ours_json.clone();
    for path in T::MERGE_FIELDS {
        let mine = field::lookup(&ours_json, path);
        let other = field::lookup(&theirs_json, path);
        if mine == other {
            continue;
        }
        match order {
            Ordering::Greater => {
                debug!(kind = %T::KIND, uuid = %ours.uuid(), field = path, "incoming value wins");
                field::assign(&mut merged, path, other)?;
            }
            Ordering::Less => {
                debug!(kind = %T::KIND, uuid = %ours.uuid(), field = path, "local value wins");
            }
            Ordering::Equal => {
                warn!(kind = %T::KIND, uuid = %ours.uuid(), field = path, "equal timestamps, conflicting values");
                conflicts.push(MergeConflict {
                    kind: T::KIND,
                    uuid: ours.uuid(),
                    field: (*path).to_string(),
                    local_value: mine,
                    incoming_value: other,
                    local_timestamp: ours.last_modified().clone(),
                    incoming_timestamp: theirs.last_modified().clone(),
                    local_modified_by: ours.modified_by().to_string(),
                    incoming_modified_by: theirs.modified_by().to_string(),
                });
            }
        }
    }

    if order != Ordering::Greater {
        return Ok(None);
    }
    let mut result: T = serde_json::from_value(merged)?;
    result.set_stamp(theirs.last_modified().clone(), theirs.modified_by());
    Ok(Some(result))
}
