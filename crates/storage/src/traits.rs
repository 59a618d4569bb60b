use stonebystone_core::{
    Cemetery, CemeteryData, ChangeLogEntry, Entity, EntityUuid, Grave, Group, Landmark, Road,
};

use crate::error::StorageError;

/// An entity kind with its own collection in the store.
pub trait Record: Entity {
    const TABLE: &'static str;

    /// The slot of a [`WriteBatch`] holding records of this kind.
    fn batch_slot(batch: &mut WriteBatch) -> &mut Vec<Self>;
}

impl Record for Grave {
    const TABLE: &'static str = "graves";

    fn batch_slot(batch: &mut WriteBatch) -> &mut Vec<Self> {
        &mut batch.graves
    }
}

impl Record for Landmark {
    const TABLE: &'static str = "landmarks";

    fn batch_slot(batch: &mut WriteBatch) -> &mut Vec<Self> {
        &mut batch.landmarks
    }
}

impl Record for Road {
    const TABLE: &'static str = "roads";

    fn batch_slot(batch: &mut WriteBatch) -> &mut Vec<Self> {
        &mut batch.roads
    }
}

impl Record for Group {
    // GROUPS is a keyword in recent SQLite.
    const TABLE: &'static str = "grave_groups";

    fn batch_slot(batch: &mut WriteBatch) -> &mut Vec<Self> {
        &mut batch.groups
    }
}

/// Records written together or not at all.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    pub cemetery: Option<Cemetery>,
    pub graves: Vec<Grave>,
    pub landmarks: Vec<Landmark>,
    pub roads: Vec<Road>,
    pub groups: Vec<Group>,
    pub changes: Vec<ChangeLogEntry>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put<T: Record>(&mut self, record: T) -> &mut Self {
        T::batch_slot(self).push(record);
        self
    }

    pub fn log(&mut self, entry: ChangeLogEntry) -> &mut Self {
        self.changes.push(entry);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.cemetery.is_none()
            && self.graves.is_empty()
            && self.landmarks.is_empty()
            && self.roads.is_empty()
            && self.groups.is_empty()
            && self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        usize::from(self.cemetery.is_some())
            + self.graves.len()
            + self.landmarks.len()
            + self.roads.len()
            + self.groups.len()
            + self.changes.len()
    }
}

pub trait Storage {
    fn get<T: Record>(&self, uuid: EntityUuid) -> Result<Option<T>, StorageError>;

    /// Every record of the kind, in first-insertion order.
    fn get_all<T: Record>(&self) -> Result<Vec<T>, StorageError>;

    /// Insert or fully rewrite the record with this uuid.
    fn put<T: Record>(&mut self, record: &T) -> Result<(), StorageError>;

    /// Physically removes a record. Editing soft-deletes through `put`.
    fn delete<T: Record>(&mut self, uuid: EntityUuid) -> Result<bool, StorageError>;

    fn get_cemetery(&self) -> Result<Option<Cemetery>, StorageError>;

    fn put_cemetery(&mut self, cemetery: &Cemetery) -> Result<(), StorageError>;

    fn append_change(&mut self, entry: &ChangeLogEntry) -> Result<(), StorageError>;

    fn change_log(&self) -> Result<Vec<ChangeLogEntry>, StorageError>;

    fn write_batch(&mut self, batch: &WriteBatch) -> Result<(), StorageError>;

    /// Wipes every collection and writes `data` in a single transaction.
    fn replace_all(&mut self, data: &CemeteryData) -> Result<(), StorageError>;

    /// `None` until a cemetery has been stored.
    fn load_dataset(&self, schema_version: &str) -> Result<Option<CemeteryData>, StorageError> {
        let Some(cemetery) = self.get_cemetery()? else {
            return Ok(None);
        };
        Ok(Some(CemeteryData {
            schema_version: schema_version.to_string(),
            cemetery,
            graves: self.get_all()?,
            landmarks: self.get_all()?,
            roads: self.get_all()?,
            groups: self.get_all()?,
            change_log: self.change_log()?,
        }))
    }
}
