//! In-process store, for tests and dry runs.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use uuid::Uuid;

use super::{Collection, EventStore, not_found};
use crate::error::{StoreError, StoreResult};
use crate::event::StoredEvent;

type Records = BTreeMap<Uuid, StoredEvent>;

#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Records>>,
    unavailable: AtomicBool,
    /// Remaining successful writes before the store starts failing.
    write_budget: Mutex<Option<usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a reachable or unreachable store.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Allow `writes` more writes, then fail every operation. `None` lifts
    /// the limit.
    pub fn set_write_budget(&self, writes: Option<usize>) {
        if let Ok(mut budget) = self.write_budget.lock() {
            *budget = writes;
        }
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store is unreachable".into()));
        }
        Ok(())
    }

    fn spend_write(&self) -> StoreResult<()> {
        self.check_available()?;
        let mut budget = self.write_budget.lock().map_err(poisoned)?;
        match budget.as_mut() {
            Some(0) => {
                self.unavailable.store(true, Ordering::SeqCst);
                Err(StoreError::Unavailable("connection lost".into()))
            }
            Some(remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn with_collections<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, Records>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let mut collections = self.collections.lock().map_err(poisoned)?;
        f(&mut collections)
    }

    fn relocate(
        &self,
        branch: &str,
        from: Collection,
        to: Collection,
        record: &StoredEvent,
    ) -> StoreResult<()> {
        self.spend_write()?;
        self.with_collections(|collections| {
            let removed = collections
                .get_mut(&from.name(branch))
                .and_then(|records| records.remove(&record.id));
            if removed.is_none() {
                return Err(not_found(branch, from, record.id));
            }
            collections
                .entry(to.name(branch))
                .or_default()
                .insert(record.id, record.clone());
            Ok(())
        })
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> StoreError {
    StoreError::Unavailable("store lock poisoned".into())
}

impl EventStore for MemoryStore {
    fn list(&self, branch: &str, collection: Collection) -> StoreResult<Vec<StoredEvent>> {
        self.check_available()?;
        self.with_collections(|collections| {
            Ok(collections
                .get(&collection.name(branch))
                .map(|records| records.values().cloned().collect())
                .unwrap_or_default())
        })
    }

    fn insert(&self, branch: &str, record: &StoredEvent) -> StoreResult<()> {
        self.spend_write()?;
        self.with_collections(|collections| {
            collections
                .entry(Collection::Live.name(branch))
                .or_default()
                .insert(record.id, record.clone());
            Ok(())
        })
    }

    fn replace(&self, branch: &str, record: &StoredEvent) -> StoreResult<()> {
        self.spend_write()?;
        self.with_collections(|collections| {
            match collections
                .get_mut(&Collection::Live.name(branch))
                .and_then(|records| records.get_mut(&record.id))
            {
                Some(existing) => {
                    *existing = record.clone();
                    Ok(())
                }
                None => Err(not_found(branch, Collection::Live, record.id)),
            }
        })
    }

    fn discard(&self, branch: &str, record: &StoredEvent) -> StoreResult<()> {
        self.relocate(branch, Collection::Live, Collection::Garbage, record)
    }

    fn restore(&self, branch: &str, record: &StoredEvent) -> StoreResult<()> {
        self.relocate(branch, Collection::Garbage, Collection::Live, record)
    }
}
