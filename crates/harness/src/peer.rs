use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use stonebystone_core::{CemeteryData, CoreError, DatasetDigest, EditContext, ManualClock, Timestamp};
use stonebystone_engine::{Editor, EditorConfig, EngineError};
use stonebystone_storage::SqliteStorage;

/// Every peer's clock starts here unless told otherwise.
pub const EPOCH: &str = "2024-01-01T00:00:00.000Z";

/// One user's device: an editor over its own in-memory store and a clock
/// that ticks one second per edit.
pub struct TestPeer {
    pub name: String,
    pub clock: Arc<ManualClock>,
    pub editor: Editor<SqliteStorage>,
}

impl TestPeer {
    pub fn new(name: &str) -> Result<Self, EngineError> {
        Self::with_config(name, EditorConfig::default())
    }

    pub fn with_config(name: &str, config: EditorConfig) -> Result<Self, EngineError> {
        Self::build(name, SqliteStorage::open_in_memory()?, config)
    }

    /// A peer whose store lives in `path`.
    pub fn on_disk(name: &str, path: &Path) -> Result<Self, EngineError> {
        let path = path
            .to_str()
            .ok_or_else(|| CoreError::Serialization(format!("non-utf8 path {}", path.display())))?;
        Self::build(name, SqliteStorage::open(path)?, EditorConfig::default())
    }

    fn build(name: &str, storage: SqliteStorage, config: EditorConfig) -> Result<Self, EngineError> {
        let start = Timestamp::parse(EPOCH)?.instant();
        let clock = Arc::new(ManualClock::stepping(start, Duration::seconds(1)));
        let ctx = EditContext::new(name, clock.clone());
        Ok(Self {
            name: name.to_owned(),
            clock,
            editor: Editor::new(storage, ctx, config),
        })
    }

    /// Moves this peer's clock so the next edit is stamped `at`.
    pub fn set_time(&self, at: &str) -> Result<(), CoreError> {
        self.clock.set(Timestamp::parse(at)?.instant());
        Ok(())
    }

    pub fn set_instant(&self, at: DateTime<Utc>) {
        self.clock.set(at);
    }

    pub fn export(&self) -> Result<String, EngineError> {
        self.editor.export(self.editor.config().exchange.pretty)
    }

    pub fn dataset(&self) -> Result<CemeteryData, EngineError> {
        self.editor.dataset()
    }

    pub fn digest(&self) -> Result<DatasetDigest, EngineError> {
        Ok(self.dataset()?.digest()?)
    }
}
