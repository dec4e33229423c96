//! Persistent event store.
//!
//! Each branch owns two collections: `planning_<branch>` holds the live
//! records and `garbage_<branch>` the records that stopped being observed.
//! Every method of [`EventStore`] is atomic for the record it touches; a
//! record is never visible in both collections.

mod file;
mod memory;

use std::fmt;

use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::event::StoredEvent;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Branch holding hand-entered events. No configured branch may use it, so
/// update cycles never touch its collections.
pub const CUSTOM_BRANCH: &str = "custom";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Live,
    Garbage,
}

impl Collection {
    /// Name of this collection for `branch`.
    pub fn name(&self, branch: &str) -> String {
        match self {
            Collection::Live => format!("planning_{branch}"),
            Collection::Garbage => format!("garbage_{branch}"),
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Collection::Live => write!(f, "planning"),
            Collection::Garbage => write!(f, "garbage"),
        }
    }
}

pub trait EventStore: Send + Sync {
    /// All records of a collection, in no particular order.
    fn list(&self, branch: &str, collection: Collection) -> StoreResult<Vec<StoredEvent>>;

    /// Add a new live record.
    fn insert(&self, branch: &str, record: &StoredEvent) -> StoreResult<()>;

    /// Overwrite an existing live record.
    fn replace(&self, branch: &str, record: &StoredEvent) -> StoreResult<()>;

    /// Move a live record to garbage, storing `record` as its new content.
    fn discard(&self, branch: &str, record: &StoredEvent) -> StoreResult<()>;

    /// Move a garbage record back to live, storing `record` as its new content.
    fn restore(&self, branch: &str, record: &StoredEvent) -> StoreResult<()>;

    fn live(&self, branch: &str) -> StoreResult<Vec<StoredEvent>> {
        self.list(branch, Collection::Live)
    }

    fn garbage(&self, branch: &str) -> StoreResult<Vec<StoredEvent>> {
        self.list(branch, Collection::Garbage)
    }
}

pub(crate) fn not_found(branch: &str, collection: Collection, id: Uuid) -> StoreError {
    StoreError::NotFound {
        collection: collection.name(branch),
        id: id.to_string(),
    }
}
