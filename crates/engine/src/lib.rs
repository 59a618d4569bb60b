pub mod apply;
pub mod config;
pub mod error;
pub mod merge;
pub mod resize;
pub mod shape;

pub use apply::{apply_merge_result, merge_change_logs, ConflictResolution, ResolutionChoice};
pub use config::{ConfigError, EditorConfig};
pub use error::EngineError;
pub use merge::{merge_cemetery_data, merge_entity, KindMerge, MergeConflict, MergeResult};
pub use resize::{resize_grid, GridDirection, ResizeConflict, ResizeOutcome};
pub use shape::{update_cemetery_shape, InvalidElement, ShapeOutcome};

use std::collections::{BTreeMap, HashSet};

use serde_json::{Map, Value};
use tracing::{info, warn};

use stonebystone_core::{
    detect_occupancy_conflicts, export_document, import_document, CellKey, Cemetery, CemeteryData,
    ChangeLogEntry, ChangeOp, EditContext, Entity, EntityUuid, GridPosition, Grave, Group, Landmark,
    LandmarkType, Occupant, Road, ValidCells,
};
use stonebystone_storage::{Record, Storage, WriteBatch};

/// An analysed import waiting for conflict resolutions.
#[derive(Debug, Clone)]
pub struct PendingMerge {
    pub local: CemeteryData,
    pub incoming: CemeteryData,
    pub result: MergeResult,
}

impl PendingMerge {
    pub fn conflicts(&self) -> &[MergeConflict] {
        &self.result.conflicts
    }

    pub fn is_noop(&self) -> bool {
        self.result.is_noop()
    }

    /// Conflicts with no matching entry in `resolutions`.
    pub fn unresolved<'a>(&'a self, resolutions: &'a [ConflictResolution]) -> impl Iterator<Item = &'a MergeConflict> {
        self.result
            .conflicts
            .iter()
            .filter(|c| !resolutions.iter().any(|r| r.answers(c)))
    }

    /// Resolutions that answer none of the conflicts.
    pub fn stray<'a>(
        &'a self,
        resolutions: &'a [ConflictResolution],
    ) -> impl Iterator<Item = &'a ConflictResolution> {
        resolutions
            .iter()
            .filter(|r| !self.result.conflicts.iter().any(|c| r.answers(c)))
    }
}

/// Sequences load, pure engine call and save against a [`Storage`], and
/// records a change-log entry for every edit.
pub struct Editor<S: Storage> {
    storage: S,
    ctx: EditContext,
    config: EditorConfig,
}

impl<S: Storage> Editor<S> {
    pub fn new(storage: S, ctx: EditContext, config: EditorConfig) -> Self {
        Self { storage, ctx, config }
    }

    /// Uses `config.identity.user` and the system clock.
    pub fn with_config(storage: S, config: EditorConfig) -> Self {
        let ctx = EditContext::system(config.identity.user.clone());
        Self::new(storage, ctx, config)
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn context(&self) -> &EditContext {
        &self.ctx
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn user(&self) -> &str {
        self.ctx.user()
    }

    // ========================================================================
    // Cemetery
    // ========================================================================

    /// Initialises (or replaces) the singleton cemetery record.
    pub fn create_cemetery(&mut self, name: &str, rows: i64, cols: i64) -> Result<Cemetery, EngineError> {
        let (Ok(r), Ok(c)) = (u32::try_from(rows), u32::try_from(cols)) else {
            return Err(EngineError::InvalidDimensions { rows, cols });
        };
        if r < 1 || c < 1 {
            return Err(EngineError::InvalidDimensions { rows, cols });
        }
        let cemetery = Cemetery::new(name, r, c, self.ctx.now(), self.ctx.user());
        self.storage.put_cemetery(&cemetery)?;
        info!(name, rows, cols, "created cemetery");
        Ok(cemetery)
    }

    pub fn cemetery(&self) -> Result<Cemetery, EngineError> {
        self.storage.get_cemetery()?.ok_or(EngineError::NoCemetery)
    }

    pub fn dataset(&self) -> Result<CemeteryData, EngineError> {
        self.storage
            .load_dataset(&self.config.exchange.schema_version)?
            .ok_or(EngineError::NoCemetery)
    }

    // ========================================================================
    // Record editing
    // ========================================================================

    fn require_live<T: Record>(&self, uuid: EntityUuid) -> Result<T, EngineError> {
        match self.storage.get::<T>(uuid)? {
            None => Err(EngineError::EntityNotFound(uuid.to_string())),
            Some(e) if e.is_deleted() => Err(EngineError::EntityAlreadyDeleted(uuid.to_string())),
            Some(e) => Ok(e),
        }
    }

    /// Stamps `entity` and writes it together with its change-log entry.
    fn save<T: Record>(&mut self, mut entity: T, op: ChangeOp) -> Result<T, EngineError> {
        entity.touch(&self.ctx);
        let changes = match op {
            ChangeOp::Set => match serde_json::to_value(&entity).map_err(stonebystone_core::CoreError::from)? {
                Value::Object(fields) => fields,
                _ => Map::new(),
            },
            ChangeOp::Delete => {
                let mut fields = Map::new();
                fields.insert("deleted".to_owned(), Value::Bool(true));
                fields
            }
        };
        let entry = ChangeLogEntry {
            op,
            uuid: entity.uuid(),
            changes,
            timestamp: entity.last_modified().clone(),
            user: self.ctx.user().to_owned(),
        };

        let mut batch = WriteBatch::new();
        batch.put(entity.clone()).log(entry);
        self.storage.write_batch(&batch)?;
        Ok(entity)
    }

    /// Rewrites a live record in full; it stays live.
    fn update<T: Record>(&mut self, mut entity: T) -> Result<T, EngineError> {
        self.require_live::<T>(entity.uuid())?;
        entity.set_deleted(false);
        self.save(entity, ChangeOp::Set)
    }

    fn delete<T: Record>(&mut self, uuid: EntityUuid) -> Result<T, EngineError> {
        let mut entity = self.require_live::<T>(uuid)?;
        entity.set_deleted(true);
        info!(kind = %T::KIND, %uuid, "soft-deleted");
        self.save(entity, ChangeOp::Delete)
    }

    pub fn create_grave(&mut self, position: GridPosition) -> Result<Grave, EngineError> {
        self.cemetery()?;
        let grave = Grave::new(EntityUuid::new(), position, self.ctx.now(), self.ctx.user());
        self.save(grave, ChangeOp::Set)
    }

    pub fn create_landmark(&mut self, position: GridPosition, landmark_type: LandmarkType) -> Result<Landmark, EngineError> {
        self.cemetery()?;
        let landmark = Landmark::new(EntityUuid::new(), landmark_type, position, self.ctx.now(), self.ctx.user());
        self.save(landmark, ChangeOp::Set)
    }

    /// The road gets the configured default color.
    pub fn create_road(&mut self, cells: Vec<GridPosition>) -> Result<Road, EngineError> {
        self.cemetery()?;
        let road = Road::new(
            EntityUuid::new(),
            cells,
            &self.config.defaults.road_color,
            self.ctx.now(),
            self.ctx.user(),
        );
        if road.cells.is_empty() {
            return Err(EngineError::EmptyRoad(road.uuid.to_string()));
        }
        self.save(road, ChangeOp::Set)
    }

    pub fn create_group(&mut self, name: &str) -> Result<Group, EngineError> {
        let group = Group::new(EntityUuid::new(), name, self.ctx.now(), self.ctx.user());
        self.save(group, ChangeOp::Set)
    }

    pub fn update_grave(&mut self, grave: Grave) -> Result<Grave, EngineError> {
        self.update(grave)
    }

    pub fn update_landmark(&mut self, landmark: Landmark) -> Result<Landmark, EngineError> {
        self.update(landmark)
    }

    pub fn update_road(&mut self, road: Road) -> Result<Road, EngineError> {
        if road.cells.is_empty() {
            return Err(EngineError::EmptyRoad(road.uuid.to_string()));
        }
        self.update(road)
    }

    pub fn update_group(&mut self, group: Group) -> Result<Group, EngineError> {
        self.update(group)
    }

    pub fn delete_grave(&mut self, uuid: EntityUuid) -> Result<Grave, EngineError> {
        self.delete(uuid)
    }

    pub fn delete_landmark(&mut self, uuid: EntityUuid) -> Result<Landmark, EngineError> {
        self.delete(uuid)
    }

    pub fn delete_road(&mut self, uuid: EntityUuid) -> Result<Road, EngineError> {
        self.delete(uuid)
    }

    pub fn delete_group(&mut self, uuid: EntityUuid) -> Result<Group, EngineError> {
        self.delete(uuid)
    }

    /// Replaces the grave's group list. Every group must exist and be live.
    pub fn set_group_membership(&mut self, grave: EntityUuid, group_ids: Vec<EntityUuid>) -> Result<Grave, EngineError> {
        let mut record = self.require_live::<Grave>(grave)?;
        for group in &group_ids {
            self.require_live::<Group>(*group)?;
        }
        let mut seen = HashSet::new();
        record.properties.group_ids = group_ids.into_iter().filter(|id| seen.insert(*id)).collect();
        self.save(record, ChangeOp::Set)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Cells holding more than one live grave or landmark.
    pub fn spatial_conflicts(&self) -> Result<BTreeMap<CellKey, Vec<Occupant>>, EngineError> {
        let conflicts = detect_occupancy_conflicts(&self.dataset()?);
        if !conflicts.is_empty() {
            warn!(cells = conflicts.len(), "overlapping elements");
        }
        Ok(conflicts)
    }

    /// Live graves per live group.
    pub fn group_member_counts(&self) -> Result<BTreeMap<EntityUuid, usize>, EngineError> {
        let mut counts: BTreeMap<EntityUuid, usize> = self
            .storage
            .get_all::<Group>()?
            .iter()
            .filter(|g| !g.is_deleted())
            .map(|g| (g.uuid, 0))
            .collect();
        for grave in self.storage.get_all::<Grave>()?.iter().filter(|g| !g.is_deleted()) {
            for group in &grave.properties.group_ids {
                if let Some(n) = counts.get_mut(group) {
                    *n += 1;
                }
            }
        }
        Ok(counts)
    }

    // ========================================================================
    // Import / export
    // ========================================================================

    pub fn export(&self, pretty: bool) -> Result<String, EngineError> {
        Ok(export_document(&self.dataset()?, pretty)?)
    }

    /// Replaces local storage with the document's contents.
    pub fn import_replace(&mut self, text: &str) -> Result<CemeteryData, EngineError> {
        let incoming = import_document(text)?;
        self.storage.replace_all(&incoming)?;
        info!(
            graves = incoming.graves.len(),
            landmarks = incoming.landmarks.len(),
            roads = incoming.roads.len(),
            "imported dataset (replace)"
        );
        Ok(incoming)
    }

    /// Validates the document and merges it against local state without
    /// writing anything.
    pub fn import_merge(&self, text: &str) -> Result<PendingMerge, EngineError> {
        let incoming = import_document(text)?;
        let local = self.dataset()?;

        let result = if incoming.digest()? == local.digest()? {
            info!("incoming dataset identical to local");
            MergeResult::default()
        } else {
            merge_cemetery_data(&local, &incoming)?
        };
        if !result.conflicts.is_empty() {
            warn!(conflicts = result.conflicts.len(), "merge needs manual resolution");
        }
        Ok(PendingMerge {
            local,
            incoming,
            result,
        })
    }

    /// Applies a pending merge once every conflict has a resolution and
    /// replaces local storage with the outcome. A resolution must answer one
    /// of the pending conflicts.
    pub fn commit_merge(
        &mut self,
        pending: &PendingMerge,
        resolutions: &[ConflictResolution],
    ) -> Result<CemeteryData, EngineError> {
        if let Some(stray) = pending.stray(resolutions).next() {
            warn!(uuid = %stray.uuid, field = %stray.field, "resolution answers no conflict");
            return Err(EngineError::InvalidResolution {
                uuid: stray.uuid.to_string(),
                field: stray.field.clone(),
            });
        }
        let missing = pending.unresolved(resolutions).count();
        if missing > 0 {
            return Err(EngineError::UnresolvedConflicts(missing));
        }
        let merged = apply_merge_result(&pending.local, &pending.incoming, &pending.result, resolutions)?;
        self.storage.replace_all(&merged)?;
        info!(
            added = pending.result.added_count(),
            updated = pending.result.updated_count(),
            resolved = resolutions.len(),
            "committed merge"
        );
        Ok(merged)
    }

    // ========================================================================
    // Grid topology
    // ========================================================================

    pub fn preview_resize(&self, direction: GridDirection, count: i64) -> Result<ResizeOutcome, EngineError> {
        resize_grid(&self.dataset()?, direction, count, &self.ctx)
    }

    /// Writes the cemetery and every element in one batch and logs a `set`
    /// for each element that moved.
    pub fn commit_resize(&mut self, outcome: ResizeOutcome) -> Result<Cemetery, EngineError> {
        if outcome.has_conflicts() && !self.config.grid.allow_conflicting_resize {
            return Err(EngineError::ResizeConflicts(outcome.conflicts.len()));
        }

        let mut batch = WriteBatch {
            cemetery: Some(outcome.cemetery.clone()),
            ..WriteBatch::default()
        };
        log_moved(&mut batch, &outcome.graves, &outcome.moved)?;
        log_moved(&mut batch, &outcome.landmarks, &outcome.moved)?;
        log_moved(&mut batch, &outcome.roads, &outcome.moved)?;
        batch.graves = outcome.graves;
        batch.landmarks = outcome.landmarks;
        batch.roads = outcome.roads;
        self.storage.write_batch(&batch)?;

        info!(
            direction = %outcome.direction,
            count = outcome.count,
            rows = outcome.cemetery.grid.rows,
            cols = outcome.cemetery.grid.cols,
            moved = outcome.moved.len(),
            conflicts = outcome.conflicts.len(),
            "committed resize"
        );
        Ok(outcome.cemetery)
    }

    pub fn preview_shape(&self, cells: ValidCells) -> Result<ShapeOutcome, EngineError> {
        Ok(update_cemetery_shape(&self.dataset()?, cells, &self.ctx))
    }

    pub fn commit_shape(&mut self, outcome: ShapeOutcome) -> Result<Cemetery, EngineError> {
        self.storage.put_cemetery(&outcome.cemetery)?;
        info!(
            cells = outcome.cemetery.grid.valid_cells.as_ref().map_or(0, ValidCells::len),
            invalid = outcome.invalid_elements.len(),
            "committed shape edit"
        );
        Ok(outcome.cemetery)
    }
}

fn log_moved<T: Entity>(batch: &mut WriteBatch, items: &[T], moved: &[EntityUuid]) -> Result<(), EngineError> {
    for item in items.iter().filter(|i| moved.contains(&i.uuid())) {
        let changes = match serde_json::to_value(item).map_err(stonebystone_core::CoreError::from)? {
            Value::Object(fields) => fields,
            _ => Map::new(),
        };
        batch.log(ChangeLogEntry {
            op: ChangeOp::Set,
            uuid: item.uuid(),
            changes,
            timestamp: item.last_modified().clone(),
            user: item.modified_by().to_owned(),
        });
    }
    Ok(())
}
