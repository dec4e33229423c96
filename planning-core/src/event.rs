//! Event records.
//!
//! An [`Event`] is what a parser extracts from one VEVENT. The reconciler
//! wraps it into a [`StoredEvent`], which adds the identity, the affiliation
//! computed for the current cycle and the change history.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A candidate event as parsed from a feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Identifier assigned by the provider (the VEVENT UID).
    pub event_id: String,
    pub title: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub classrooms: Vec<String>,
    pub teachers: BTreeSet<String>,
    pub groups: BTreeSet<String>,
    /// Description fragments that matched none of the configured patterns.
    pub undetermined_description_items: Vec<String>,
}

impl Event {
    /// Number of populated fields, used to pick between candidates that
    /// share an `event_id`.
    pub fn richness(&self) -> usize {
        [
            !self.title.is_empty(),
            !self.classrooms.is_empty(),
            !self.teachers.is_empty(),
            !self.groups.is_empty(),
            !self.undetermined_description_items.is_empty(),
        ]
        .into_iter()
        .filter(|populated| *populated)
        .count()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] ({})",
            self.title,
            self.event_id,
            self.start_date.format("%Y-%m-%d %H:%M")
        )
    }
}

/// A reconciled record, as kept in the `planning_<branch>` and
/// `garbage_<branch>` collections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(flatten)]
    pub event: Event,
    /// Configured group names that produced this event in the last cycle
    /// that observed it.
    pub affiliation: BTreeSet<String>,
    pub last_update: DateTime<Utc>,
    /// Append-only history of field changes.
    #[serde(default)]
    pub old: Vec<HistoryEntry>,
}

impl StoredEvent {
    pub fn new(event: Event, affiliation: BTreeSet<String>, now: DateTime<Utc>) -> Self {
        StoredEvent {
            id: Uuid::new_v4(),
            event,
            affiliation,
            last_update: now,
            old: Vec::new(),
        }
    }

    pub fn event_id(&self) -> &str {
        &self.event.event_id
    }

    /// Old values of every semantic field that differs from the candidate.
    pub fn changes_from(&self, event: &Event, affiliation: &BTreeSet<String>) -> FieldChanges {
        let current = &self.event;
        FieldChanges {
            title: differs(&current.title, &event.title),
            start_date: differs(&current.start_date, &event.start_date),
            end_date: differs(&current.end_date, &event.end_date),
            classrooms: differs(&current.classrooms, &event.classrooms),
            teachers: differs(&current.teachers, &event.teachers),
            groups: differs(&current.groups, &event.groups),
            undetermined_description_items: differs(
                &current.undetermined_description_items,
                &event.undetermined_description_items,
            ),
            affiliation: differs(&self.affiliation, affiliation),
        }
    }

    /// Overwrite the semantic fields, recording the previous values in `old`.
    ///
    /// Does nothing if `changes` is empty.
    pub fn apply(
        &mut self,
        event: Event,
        affiliation: BTreeSet<String>,
        changes: FieldChanges,
        now: DateTime<Utc>,
    ) {
        if changes.is_empty() {
            return;
        }
        let stamp = now.max(self.last_update);
        self.old.push(HistoryEntry {
            changes,
            updated: stamp,
        });
        self.event = event;
        self.affiliation = affiliation;
        self.last_update = stamp;
    }

    /// Advance `last_update` without touching any field.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_update = now.max(self.last_update);
    }
}

fn differs<T: PartialEq + Clone>(old: &T, new: &T) -> Option<T> {
    (old != new).then(|| old.clone())
}

/// Previous values of the fields that changed. Absent fields did not change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classrooms: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teachers: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub undetermined_description_items: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliation: Option<BTreeSet<String>>,
}

impl FieldChanges {
    pub fn is_empty(&self) -> bool {
        self.changed_fields().is_empty()
    }

    /// Names of the changed fields, in declaration order.
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.title.is_some() {
            fields.push("title");
        }
        if self.start_date.is_some() {
            fields.push("start_date");
        }
        if self.end_date.is_some() {
            fields.push("end_date");
        }
        if self.classrooms.is_some() {
            fields.push("classrooms");
        }
        if self.teachers.is_some() {
            fields.push("teachers");
        }
        if self.groups.is_some() {
            fields.push("groups");
        }
        if self.undetermined_description_items.is_some() {
            fields.push("undetermined_description_items");
        }
        if self.affiliation.is_some() {
            fields.push("affiliation");
        }
        fields
    }
}

/// One entry of a record's `old` history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub changes: FieldChanges,
    /// When the change was recorded.
    pub updated: DateTime<Utc>,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::TimeZone;

    pub fn event(event_id: &str, title: &str) -> Event {
        Event {
            event_id: event_id.to_string(),
            title: title.to_string(),
            start_date: Utc.with_ymd_and_hms(2025, 3, 20, 8, 15, 0).unwrap(),
            end_date: Utc.with_ymd_and_hms(2025, 3, 20, 10, 15, 0).unwrap(),
            classrooms: vec!["Room 1".to_string()],
            teachers: BTreeSet::new(),
            groups: BTreeSet::new(),
            undetermined_description_items: vec![],
        }
    }

    pub fn groups(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    pub fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, hour, 0, 0).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_changes_capture_only_differing_fields() {
        let record = StoredEvent::new(event("E1", "A"), groups(&["g1"]), at(1));
        let mut candidate = event("E1", "B");
        candidate.teachers = groups(&["Mr Smith"]);

        let changes = record.changes_from(&candidate, &groups(&["g1"]));

        assert_eq!(changes.title.as_deref(), Some("A"));
        assert_eq!(changes.teachers, Some(BTreeSet::new()));
        assert_eq!(changes.changed_fields(), vec!["title", "teachers"]);
    }

    #[test]
    fn test_affiliation_is_a_semantic_field() {
        let record = StoredEvent::new(event("E1", "A"), groups(&["g1"]), at(1));
        let changes = record.changes_from(&event("E1", "A"), &groups(&["g1", "g2"]));
        assert_eq!(changes.affiliation, Some(groups(&["g1"])));
    }

    #[test]
    fn test_apply_appends_history_and_advances_last_update() {
        let mut record = StoredEvent::new(event("E1", "A"), groups(&["g1"]), at(1));
        let candidate = event("E1", "B");
        let changes = record.changes_from(&candidate, &groups(&["g1"]));

        record.apply(candidate, groups(&["g1"]), changes, at(2));

        assert_eq!(record.event.title, "B");
        assert_eq!(record.last_update, at(2));
        assert_eq!(record.old.len(), 1);
        assert_eq!(record.old[0].changes.title.as_deref(), Some("A"));
        assert_eq!(record.old[0].updated, at(2));
    }

    #[test]
    fn test_last_update_never_moves_backwards() {
        let mut record = StoredEvent::new(event("E1", "A"), groups(&["g1"]), at(5));
        let candidate = event("E1", "B");
        let changes = record.changes_from(&candidate, &groups(&["g1"]));

        record.apply(candidate, groups(&["g1"]), changes, at(3));

        assert_eq!(record.last_update, at(5));
    }

    #[test]
    fn test_history_entry_serializes_only_changed_fields() {
        let entry = HistoryEntry {
            changes: FieldChanges {
                title: Some("A".to_string()),
                ..Default::default()
            },
            updated: at(2),
        };

        let json = serde_json::to_value(&entry).unwrap();
        let object = json.as_object().unwrap();

        assert_eq!(object.len(), 2);
        assert_eq!(object["title"], "A");
        assert!(object.contains_key("updated"));
    }

    #[test]
    fn test_richness_counts_populated_fields() {
        let mut candidate = event("E1", "A");
        assert_eq!(candidate.richness(), 2);
        candidate.groups = groups(&["TD1"]);
        assert_eq!(candidate.richness(), 3);
    }
}
