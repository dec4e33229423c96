//! Planning and applying the reconciliation of one branch.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::StoreResult;
use crate::event::StoredEvent;
use crate::reconcile::{DiffKind, EventDiff, MergedEvent, ReconcileSummary};
use crate::store::EventStore;

/// Groups of a branch as seen by one cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleScope {
    configured: BTreeSet<String>,
    observed: BTreeSet<String>,
}

impl CycleScope {
    pub fn new<I, S>(configured: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CycleScope {
            configured: configured.into_iter().map(Into::into).collect(),
            observed: BTreeSet::new(),
        }
    }

    /// Record that `group` was downloaded and parsed this cycle.
    pub fn observe(&mut self, group: &str) {
        self.observed.insert(group.to_string());
    }

    pub fn observed(&self) -> &BTreeSet<String> {
        &self.observed
    }

    /// Whether an unobserved record with this affiliation may be moved to
    /// garbage. Records only produced by groups that failed this cycle are
    /// kept; groups that left the configuration no longer protect anything.
    pub fn may_sweep(&self, affiliation: &BTreeSet<String>) -> bool {
        affiliation.is_empty()
            || affiliation
                .iter()
                .any(|group| self.observed.contains(group) || !self.configured.contains(group))
    }
}

/// Every outcome of one branch's reconciliation, in application order.
#[derive(Debug, Clone)]
pub struct BranchDiff {
    pub branch: String,
    pub diffs: Vec<EventDiff>,
}

impl BranchDiff {
    pub fn compute(
        branch: &str,
        merged: Vec<MergedEvent>,
        live: Vec<StoredEvent>,
        garbage: Vec<StoredEvent>,
        scope: &CycleScope,
        now: DateTime<Utc>,
    ) -> Self {
        let mut live_by_id: HashMap<String, StoredEvent> = live
            .into_iter()
            .map(|r| (r.event_id().to_string(), r))
            .collect();
        let mut garbage_by_id: HashMap<String, StoredEvent> = garbage
            .into_iter()
            .map(|r| (r.event_id().to_string(), r))
            .collect();

        let mut diffs = Vec::with_capacity(merged.len() + live_by_id.len());

        for MergedEvent { event, affiliation } in merged {
            if let Some(mut record) = live_by_id.remove(&event.event_id) {
                let changes = record.changes_from(&event, &affiliation);
                if changes.is_empty() {
                    diffs.push(EventDiff::new(DiffKind::Unchanged, record));
                    continue;
                }
                let changed = changes.changed_fields();
                record.apply(event, affiliation, changes, now);
                diffs.push(EventDiff {
                    kind: DiffKind::Update,
                    record,
                    changed,
                });
            } else if let Some(mut record) = garbage_by_id.remove(&event.event_id) {
                let changes = record.changes_from(&event, &affiliation);
                let changed = changes.changed_fields();
                if changes.is_empty() {
                    record.touch(now);
                } else {
                    record.apply(event, affiliation, changes, now);
                }
                diffs.push(EventDiff {
                    kind: DiffKind::Restore,
                    record,
                    changed,
                });
            } else {
                diffs.push(EventDiff::new(
                    DiffKind::Create,
                    StoredEvent::new(event, affiliation, now),
                ));
            }
        }

        let mut unobserved: Vec<StoredEvent> = live_by_id.into_values().collect();
        unobserved.sort_by(|a, b| {
            (a.event.start_date, a.event_id()).cmp(&(b.event.start_date, b.event_id()))
        });
        for mut record in unobserved {
            if scope.may_sweep(&record.affiliation) {
                record.touch(now);
                diffs.push(EventDiff::new(DiffKind::Garbage, record));
            } else {
                diffs.push(EventDiff::new(DiffKind::Retained, record));
            }
        }

        BranchDiff {
            branch: branch.to_string(),
            diffs,
        }
    }

    /// Write every mutation to the store. Stops at the first error; records
    /// written before it stay consistent and the next cycle converges.
    pub fn apply(&self, store: &dyn EventStore) -> StoreResult<()> {
        let branch = self.branch.as_str();
        for diff in self.diffs.iter().filter(|d| d.kind.is_mutation()) {
            debug!(%branch, "{}", diff);
            match diff.kind {
                DiffKind::Create => store.insert(branch, &diff.record)?,
                DiffKind::Update => store.replace(branch, &diff.record)?,
                DiffKind::Restore => store.restore(branch, &diff.record)?,
                DiffKind::Garbage => store.discard(branch, &diff.record)?,
                DiffKind::Unchanged | DiffKind::Retained => {}
            }
        }
        Ok(())
    }

    pub fn summary(&self) -> ReconcileSummary {
        ReconcileSummary::count_by_kind(self.diffs.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::fixtures::{at, event, groups};

    fn merged(event_id: &str, title: &str, affiliation: &[&str]) -> MergedEvent {
        MergedEvent {
            event: event(event_id, title),
            affiliation: groups(affiliation),
        }
    }

    fn scope(configured: &[&str], observed: &[&str]) -> CycleScope {
        let mut scope = CycleScope::new(configured.iter().copied());
        for group in observed {
            scope.observe(group);
        }
        scope
    }

    #[test]
    fn test_unobserved_record_of_failed_group_is_retained() {
        let live = vec![StoredEvent::new(event("E1", "A"), groups(&["g2"]), at(1))];

        let diff = BranchDiff::compute(
            "info",
            vec![],
            live,
            vec![],
            &scope(&["g1", "g2"], &["g1"]),
            at(2),
        );

        assert_eq!(diff.diffs[0].kind, DiffKind::Retained);
        assert_eq!(diff.diffs[0].record.last_update, at(1));
    }

    #[test]
    fn test_record_of_removed_group_is_swept() {
        let live = vec![StoredEvent::new(event("E1", "A"), groups(&["old"]), at(1))];

        let diff = BranchDiff::compute("info", vec![], live, vec![], &scope(&["g1"], &[]), at(2));

        assert_eq!(diff.diffs[0].kind, DiffKind::Garbage);
        assert_eq!(diff.diffs[0].record.last_update, at(2));
    }

    #[test]
    fn test_shared_record_is_swept_when_one_group_observed() {
        let live = vec![StoredEvent::new(event("E1", "A"), groups(&["g1", "g2"]), at(1))];

        let diff = BranchDiff::compute(
            "info",
            vec![],
            live,
            vec![],
            &scope(&["g1", "g2"], &["g2"]),
            at(2),
        );

        assert_eq!(diff.diffs[0].kind, DiffKind::Garbage);
    }

    #[test]
    fn test_update_lists_changed_fields() {
        let live = vec![StoredEvent::new(event("E1", "A"), groups(&["g1"]), at(1))];

        let diff = BranchDiff::compute(
            "info",
            vec![merged("E1", "B", &["g1", "g2"])],
            live,
            vec![],
            &scope(&["g1", "g2"], &["g1", "g2"]),
            at(2),
        );

        assert_eq!(diff.diffs[0].kind, DiffKind::Update);
        assert_eq!(diff.diffs[0].changed, vec!["title", "affiliation"]);
        assert_eq!(diff.diffs[0].record.old.len(), 1);
    }

    #[test]
    fn test_identical_reappearance_restores_without_history() {
        let garbage = vec![StoredEvent::new(event("E1", "A"), groups(&["g1"]), at(1))];
        let id = garbage[0].id;

        let diff = BranchDiff::compute(
            "info",
            vec![merged("E1", "A", &["g1"])],
            vec![],
            garbage,
            &scope(&["g1"], &["g1"]),
            at(3),
        );

        let restored = &diff.diffs[0];
        assert_eq!(restored.kind, DiffKind::Restore);
        assert_eq!(restored.record.id, id);
        assert!(restored.record.old.is_empty());
        assert_eq!(restored.record.last_update, at(3));
    }

    #[test]
    fn test_summary_counts() {
        let live = vec![
            StoredEvent::new(event("E1", "A"), groups(&["g1"]), at(1)),
            StoredEvent::new(event("E2", "B"), groups(&["g1"]), at(1)),
            StoredEvent::new(event("E3", "C"), groups(&["g1"]), at(1)),
        ];

        let diff = BranchDiff::compute(
            "info",
            vec![
                merged("E1", "A", &["g1"]),
                merged("E2", "changed", &["g1"]),
                merged("E4", "D", &["g1"]),
            ],
            live,
            vec![],
            &scope(&["g1"], &["g1"]),
            at(2),
        );

        let summary = diff.summary();
        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.modified, 1);
        assert_eq!(summary.unchanged, 1);
        assert_eq!(summary.garbaged, 1);
        assert_eq!(summary.mutations(), 3);
    }
}
