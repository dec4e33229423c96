//! ENT (ADE export) convention: everything useful sits in LOCATION and
//! DESCRIPTION, one item per delimiter-separated fragment.

use std::collections::BTreeSet;

use super::ParseEvent;
use super::patterns::{Classifier, Fragment, fragments};
use crate::error::ParseError;
use crate::event::Event;
use crate::ics::RawEvent;

#[derive(Debug, Clone)]
pub struct EntParser {
    pub classifier: Classifier,
    pub delimiter: String,
}

impl ParseEvent for EntParser {
    fn parse_event(&self, raw: &RawEvent<'_>) -> Result<Event, ParseError> {
        let event_id = raw.uid()?;
        let start_date = raw.date("DTSTART")?;
        let end_date = raw.end_date()?;

        let location = raw.text("LOCATION");
        let classrooms = fragments(&location, &self.delimiter)
            .map(str::to_string)
            .collect();

        let mut teachers = BTreeSet::new();
        let mut groups = BTreeSet::new();
        let mut undetermined_description_items = Vec::new();

        let description = raw.text("DESCRIPTION");
        for fragment in fragments(&description, &self.delimiter) {
            match self.classifier.classify(fragment) {
                Fragment::Teacher => {
                    teachers.insert(fragment.to_string());
                }
                Fragment::Group => {
                    groups.insert(fragment.to_string());
                }
                Fragment::Blacklisted => {}
                Fragment::Undetermined => undetermined_description_items.push(fragment.to_string()),
            }
        }

        Ok(Event {
            event_id,
            title: raw.text("SUMMARY").trim().to_string(),
            start_date,
            end_date,
            classrooms,
            teachers,
            groups,
            undetermined_description_items,
        })
    }
}
