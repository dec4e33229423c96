use std::fmt;

use serde::{Deserialize, Serialize};

use crate::reconcile::{DiffKind, EventDiff};

/// Counts of reconciliation outcomes for one branch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileSummary {
    pub inserted: usize,
    /// Updated records, restored ones included.
    pub modified: usize,
    pub restored: usize,
    pub unchanged: usize,
    pub garbaged: usize,
    pub retained: usize,
}

impl ReconcileSummary {
    pub fn count_by_kind<'a>(diffs: impl Iterator<Item = &'a EventDiff>) -> Self {
        let mut summary = ReconcileSummary::default();
        for diff in diffs {
            match diff.kind {
                DiffKind::Create => summary.inserted += 1,
                DiffKind::Update => summary.modified += 1,
                DiffKind::Restore => {
                    summary.modified += 1;
                    summary.restored += 1;
                }
                DiffKind::Unchanged => summary.unchanged += 1,
                DiffKind::Garbage => summary.garbaged += 1,
                DiffKind::Retained => summary.retained += 1,
            }
        }
        summary
    }

    /// Number of store writes the cycle performed.
    pub fn mutations(&self) -> usize {
        self.inserted + self.modified + self.garbaged
    }
}

impl fmt::Display for ReconcileSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} inserted, {} modified ({} restored), {} unchanged, {} garbaged, {} retained",
            self.inserted, self.modified, self.restored, self.unchanged, self.garbaged, self.retained
        )
    }
}
