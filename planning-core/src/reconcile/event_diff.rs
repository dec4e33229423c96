use std::fmt;

use crate::event::StoredEvent;
use crate::reconcile::DiffKind;

/// One planned outcome: the record as it must be stored after the cycle.
#[derive(Debug, Clone)]
pub struct EventDiff {
    pub kind: DiffKind,
    pub record: StoredEvent,
    /// Fields whose value changed, for updates and restores.
    pub changed: Vec<&'static str>,
}

impl EventDiff {
    pub fn new(kind: DiffKind, record: StoredEvent) -> Self {
        EventDiff {
            kind,
            record,
            changed: Vec::new(),
        }
    }
}

impl fmt::Display for EventDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.record.event)?;
        if !self.changed.is_empty() {
            write!(f, " ({})", self.changed.join(", "))?;
        }
        Ok(())
    }
}
