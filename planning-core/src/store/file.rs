//! One JSON document per record on the local filesystem.
//!
//! Layout: `<root>/planning_<branch>/<_id>.json` and
//! `<root>/garbage_<branch>/<_id>.json`. Writes go through a temp file and
//! `rename`, moves between collections are a single `rename`.

use std::fs;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::{Collection, EventStore, not_found};
use crate::error::{StoreError, StoreResult};
use crate::event::StoredEvent;

const RECORD_EXTENSION: &str = "json";

pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dir(&self, branch: &str, collection: Collection) -> PathBuf {
        self.root.join(collection.name(branch))
    }

    fn record_path(&self, branch: &str, collection: Collection, id: Uuid) -> PathBuf {
        self.dir(branch, collection)
            .join(format!("{id}.{RECORD_EXTENSION}"))
    }

    fn write(&self, branch: &str, collection: Collection, record: &StoredEvent) -> StoreResult<()> {
        let dir = self.dir(branch, collection);
        fs::create_dir_all(&dir)?;

        let content = serde_json::to_string_pretty(record)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let path = dir.join(format!("{}.{RECORD_EXTENSION}", record.id));
        let temp = dir.join(format!(".{}.tmp", record.id));
        fs::write(&temp, content)?;
        fs::rename(&temp, &path)?;
        Ok(())
    }

    /// Rename a record file from one collection to the other, then store the
    /// new content in place.
    fn relocate(
        &self,
        branch: &str,
        from: Collection,
        to: Collection,
        record: &StoredEvent,
    ) -> StoreResult<()> {
        let source = self.record_path(branch, from, record.id);
        if !source.exists() {
            return Err(not_found(branch, from, record.id));
        }
        fs::create_dir_all(self.dir(branch, to))?;
        fs::rename(&source, self.record_path(branch, to, record.id))?;
        self.write(branch, to, record)
    }
}

impl EventStore for FileStore {
    fn list(&self, branch: &str, collection: Collection) -> StoreResult<Vec<StoredEvent>> {
        let dir = self.dir(branch, collection);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            let content = fs::read_to_string(&path)?;
            let record: StoredEvent = serde_json::from_str(&content).map_err(|e| {
                StoreError::Serialization(format!("{}: {}", path.display(), e))
            })?;
            records.push(record);
        }
        Ok(records)
    }

    fn insert(&self, branch: &str, record: &StoredEvent) -> StoreResult<()> {
        self.write(branch, Collection::Live, record)
    }

    fn replace(&self, branch: &str, record: &StoredEvent) -> StoreResult<()> {
        if !self.record_path(branch, Collection::Live, record.id).exists() {
            return Err(not_found(branch, Collection::Live, record.id));
        }
        self.write(branch, Collection::Live, record)
    }

    fn discard(&self, branch: &str, record: &StoredEvent) -> StoreResult<()> {
        self.relocate(branch, Collection::Live, Collection::Garbage, record)
    }

    fn restore(&self, branch: &str, record: &StoredEvent) -> StoreResult<()> {
        self.relocate(branch, Collection::Garbage, Collection::Live, record)
    }
}
