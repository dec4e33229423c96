//! Merging of candidates that share an `event_id`.

use std::collections::{BTreeSet, HashMap};

use crate::event::Event;

/// An event parsed this cycle, tagged with the configured group whose
/// addresses produced it.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub group: String,
    pub event: Event,
}

impl Candidate {
    pub fn new(group: impl Into<String>, event: Event) -> Self {
        Candidate {
            group: group.into(),
            event,
        }
    }
}

/// One event per `event_id`, with the affiliation of the cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedEvent {
    pub event: Event,
    pub affiliation: BTreeSet<String>,
}

/// Group candidates by `event_id`, in first-seen order.
///
/// The affiliation is the union of the contributing groups. Fields come from
/// the richest candidate; among equally rich candidates the first one seen
/// wins.
pub fn merge(candidates: impl IntoIterator<Item = Candidate>) -> Vec<MergedEvent> {
    let mut merged: Vec<MergedEvent> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for Candidate { group, event } in candidates {
        match index.get(&event.event_id) {
            Some(&i) => {
                let entry = &mut merged[i];
                entry.affiliation.insert(group);
                if event.richness() > entry.event.richness() {
                    entry.event = event;
                }
            }
            None => {
                index.insert(event.event_id.clone(), merged.len());
                merged.push(MergedEvent {
                    event,
                    affiliation: BTreeSet::from([group]),
                });
            }
        }
    }

    merged
}
