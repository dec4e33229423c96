//! Nextcloud convention: a single room in LOCATION, the teachers written out
//! in DESCRIPTION ("Par A, B et C") and the group in CLASS.

use std::collections::BTreeSet;

use super::ParseEvent;
use crate::error::ParseError;
use crate::event::Event;
use crate::ics::RawEvent;

const TEACHER_PREFIXES: [&str; 2] = ["Par ", "De "];
const LAST_TEACHER_SEPARATOR: &str = " et ";

#[derive(Debug, Clone, Default)]
pub struct NextcloudParser;

impl ParseEvent for NextcloudParser {
    fn parse_event(&self, raw: &RawEvent<'_>) -> Result<Event, ParseError> {
        let event_id = raw.uid()?;
        let start_date = raw.date("DTSTART")?;
        let end_date = raw.end_date()?;

        let location = raw.text("LOCATION");
        let classrooms = non_empty(location.trim()).into_iter().collect();

        let class = raw.text("CLASS");
        let groups = non_empty(class.trim()).into_iter().collect();

        Ok(Event {
            event_id,
            title: raw.text("SUMMARY").trim().to_string(),
            start_date,
            end_date,
            classrooms,
            teachers: teachers_from(&raw.text("DESCRIPTION")),
            groups,
            undetermined_description_items: Vec::new(),
        })
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

/// "Par A, B et C" -> {A, B, C}
fn teachers_from(description: &str) -> BTreeSet<String> {
    let description = description.trim();
    let names = TEACHER_PREFIXES
        .iter()
        .find_map(|prefix| description.strip_prefix(prefix))
        .unwrap_or(description);

    let mut parts: Vec<&str> = names.split(',').collect();
    let last = parts.pop().unwrap_or_default();

    parts
        .into_iter()
        .chain(last.split(LAST_TEACHER_SEPARATOR))
        .filter_map(|name| non_empty(name.trim()))
        .collect()
}
