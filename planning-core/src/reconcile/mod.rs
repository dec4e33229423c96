//! Reconciliation of a branch's candidates against its stored records.
//!
//! A cycle's candidates are merged by `event_id` ([`merge`]), compared with
//! the live and garbage collections ([`BranchDiff::compute`]) and the
//! resulting mutations written to the store ([`BranchDiff::apply`]).

mod branch_diff;
mod diff_kind;
mod event_diff;
mod merge;
mod summary;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::error::{StoreError, StoreResult};
use crate::store::EventStore;

pub use branch_diff::{BranchDiff, CycleScope};
pub use diff_kind::DiffKind;
pub use event_diff::EventDiff;
pub use merge::{Candidate, MergedEvent, merge};
pub use summary::ReconcileSummary;

pub struct Reconciler {
    store: Arc<dyn EventStore>,
    in_flight: Mutex<HashSet<String>>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Reconciler {
            store,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Compute the outcome of a cycle without writing anything.
    pub fn plan(
        &self,
        branch: &str,
        candidates: Vec<Candidate>,
        scope: &CycleScope,
        now: DateTime<Utc>,
    ) -> StoreResult<BranchDiff> {
        let live = self.store.live(branch)?;
        let garbage = self.store.garbage(branch)?;
        Ok(BranchDiff::compute(
            branch,
            merge(candidates),
            live,
            garbage,
            scope,
            now,
        ))
    }

    /// Converge the branch's collections to `candidates`.
    ///
    /// Fails with [`StoreError::Busy`] if the branch is already being
    /// reconciled.
    pub fn reconcile(
        &self,
        branch: &str,
        candidates: Vec<Candidate>,
        scope: &CycleScope,
        now: DateTime<Utc>,
    ) -> StoreResult<ReconcileSummary> {
        let _claim = BranchClaim::acquire(&self.in_flight, branch)?;
        let diff = self.plan(branch, candidates, scope, now)?;
        diff.apply(self.store.as_ref())?;
        Ok(diff.summary())
    }
}

/// Marks a branch as being reconciled until dropped.
struct BranchClaim<'a> {
    in_flight: &'a Mutex<HashSet<String>>,
    branch: String,
}

impl<'a> BranchClaim<'a> {
    fn acquire(in_flight: &'a Mutex<HashSet<String>>, branch: &str) -> StoreResult<Self> {
        let mut branches = in_flight
            .lock()
            .map_err(|_| StoreError::Unavailable("reconciler lock poisoned".into()))?;
        if !branches.insert(branch.to_string()) {
            return Err(StoreError::Busy(branch.to_string()));
        }
        Ok(BranchClaim {
            in_flight,
            branch: branch.to_string(),
        })
    }
}

impl Drop for BranchClaim<'_> {
    fn drop(&mut self) {
        if let Ok(mut branches) = self.in_flight.lock() {
            branches.remove(&self.branch);
        }
    }
}
