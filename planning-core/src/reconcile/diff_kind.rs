use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of reconciling one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffKind {
    /// First sighting of the event in the branch.
    Create,
    /// Live record whose fields changed.
    Update,
    /// Garbage record seen again.
    Restore,
    Unchanged,
    /// Live record no longer observed, moved to garbage.
    Garbage,
    /// Live record not observed because its groups failed this cycle.
    Retained,
}

impl DiffKind {
    /// Whether this outcome writes to the store.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            DiffKind::Create | DiffKind::Update | DiffKind::Restore | DiffKind::Garbage
        )
    }
}

impl fmt::Display for DiffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffKind::Create => write!(f, "+"),
            DiffKind::Update => write!(f, "~"),
            DiffKind::Restore => write!(f, "^"),
            DiffKind::Unchanged => write!(f, "="),
            DiffKind::Garbage => write!(f, "-"),
            DiffKind::Retained => write!(f, "?"),
        }
    }
}
