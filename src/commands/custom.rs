//! Hand-entered events, kept in the `custom` branch beside the feed branches.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use clap::{Args, Subcommand};
use owo_colors::OwoColorize;
use planning_core::store::{CUSTOM_BRANCH, EventStore};
use planning_core::{Event, StoredEvent};
use tracing::warn;

use super::{load_settings, open_file_store};
use crate::render::Render;

const DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Subcommand)]
pub enum CustomAction {
    /// List hand-entered events
    List {
        /// Only show events whose title contains this text
        #[arg(long)]
        filter: Option<String>,
    },
    /// Add an event
    Add(NewEvent),
    /// Move events to garbage, by title or by id
    Remove {
        /// Exact event title
        #[arg(long, conflicts_with = "id", required_unless_present = "id")]
        title: Option<String>,

        /// Record `_id` or event id
        #[arg(long)]
        id: Option<String>,
    },
}

#[derive(Args)]
pub struct NewEvent {
    /// Event title
    pub title: String,

    /// Start in local time ("2025-03-20T08:15"), or a day ("2025-03-20")
    #[arg(short, long)]
    pub start: String,

    /// End, in the same format as the start
    #[arg(short, long, conflicts_with = "duration")]
    pub end: Option<String>,

    /// Duration (e.g. "30m", "1h30m")
    #[arg(short, long)]
    pub duration: Option<String>,

    /// Classroom (repeatable)
    #[arg(long = "classroom")]
    pub classrooms: Vec<String>,

    /// Teacher (repeatable)
    #[arg(long = "teacher")]
    pub teachers: Vec<String>,

    /// Group (repeatable)
    #[arg(long = "group")]
    pub groups: Vec<String>,

    /// Free text kept with the event
    #[arg(long)]
    pub description: Option<String>,
}

/// Which live records a removal applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Title(String),
    Id(String),
}

impl Selector {
    fn matches(&self, record: &StoredEvent) -> bool {
        match self {
            Selector::Title(title) => record.event.title == *title,
            Selector::Id(id) => record.id.to_string() == *id || record.event_id() == id,
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Title(title) => write!(f, "title '{title}'"),
            Selector::Id(id) => write!(f, "id '{id}'"),
        }
    }
}

pub fn run(action: CustomAction, config: &Path) -> Result<()> {
    let settings = load_settings(config)?;
    let store = open_file_store(&settings)?;
    let now = Utc::now();

    match action {
        CustomAction::List { filter } => {
            let records = list(&store, filter.as_deref())?;
            if records.is_empty() {
                println!("{}", "No custom events".dimmed());
            }
            for record in &records {
                println!("{}  {}", record.id.dimmed(), record.event.render());
            }
        }
        CustomAction::Add(new_event) => {
            let record = add(&store, new_event.into_event()?, now)?;
            println!("{} {} ({})", "Added".green(), record.event.title, record.id);
        }
        CustomAction::Remove { title, id } => {
            let selector = match (title, id) {
                (Some(title), _) => Selector::Title(title),
                (None, Some(id)) => Selector::Id(id),
                (None, None) => bail!("remove needs --title or --id"),
            };
            for record in remove(&store, &selector, now)? {
                println!("{} {} ({})", "Removed".red(), record.event.title, record.id);
            }
        }
    }

    Ok(())
}

/// Live custom events, earliest first.
pub fn list(store: &dyn EventStore, filter: Option<&str>) -> Result<Vec<StoredEvent>> {
    let filter = filter.map(str::to_lowercase);
    let mut records: Vec<StoredEvent> = store
        .live(CUSTOM_BRANCH)?
        .into_iter()
        .filter(|r| match &filter {
            Some(text) => r.event.title.to_lowercase().contains(text),
            None => true,
        })
        .collect();
    records.sort_by(|a, b| {
        (a.event.start_date, &a.event.title).cmp(&(b.event.start_date, &b.event.title))
    });
    Ok(records)
}

pub fn add(store: &dyn EventStore, event: Event, now: DateTime<Utc>) -> Result<StoredEvent> {
    let live = store.live(CUSTOM_BRANCH)?;
    if live.iter().any(|r| r.event.title == event.title) {
        warn!(title = %event.title, "a custom event with this title already exists");
    }

    let record = StoredEvent::new(event, BTreeSet::new(), now);
    store.insert(CUSTOM_BRANCH, &record)?;
    Ok(record)
}

/// Move every matching live record to garbage. Their history is kept.
pub fn remove(
    store: &dyn EventStore,
    selector: &Selector,
    now: DateTime<Utc>,
) -> Result<Vec<StoredEvent>> {
    let mut removed = Vec::new();
    for mut record in store.live(CUSTOM_BRANCH)? {
        if !selector.matches(&record) {
            continue;
        }
        record.touch(now);
        store.discard(CUSTOM_BRANCH, &record)?;
        removed.push(record);
    }

    if removed.is_empty() {
        bail!("No custom event with {selector}");
    }
    Ok(removed)
}

impl NewEvent {
    pub fn into_event(self) -> Result<Event> {
        let start = parse_when(&self.start)?;
        let start_date = start.to_utc()?;

        let end_date = if let Some(end) = &self.end {
            parse_when(end)?.to_utc()?
        } else if let Some(duration) = &self.duration {
            let std_duration = humantime::parse_duration(duration)
                .with_context(|| format!("Could not parse duration: \"{duration}\""))?;
            start_date + Duration::from_std(std_duration).context("Duration too large")?
        } else {
            start_date + start.default_length()
        };

        if end_date < start_date {
            bail!("The event ends before it starts");
        }

        Ok(Event {
            event_id: format!("custom-{}", uuid::Uuid::new_v4()),
            title: self.title.trim().to_string(),
            start_date,
            end_date,
            classrooms: self.classrooms,
            teachers: self.teachers.into_iter().collect(),
            groups: self.groups.into_iter().collect(),
            undetermined_description_items: self
                .description
                .filter(|d| !d.trim().is_empty())
                .into_iter()
                .collect(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum When {
    Day(NaiveDate),
    At(NaiveDateTime),
}

impl When {
    /// Days start at midnight UTC, like all-day feed events. Times are local.
    fn to_utc(self) -> Result<DateTime<Utc>> {
        match self {
            When::Day(day) => Ok(day.and_time(NaiveTime::MIN).and_utc()),
            When::At(at) => Local
                .from_local_datetime(&at)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
                .ok_or_else(|| anyhow!("{at} does not exist in the local time zone")),
        }
    }

    /// End used when neither --end nor --duration is given.
    fn default_length(self) -> Duration {
        match self {
            When::Day(_) => Duration::days(1),
            When::At(_) => Duration::hours(1),
        }
    }
}

fn parse_when(input: &str) -> Result<When> {
    let input = input.trim();
    if let Ok(at) = NaiveDateTime::parse_from_str(input, DATE_TIME_FORMAT) {
        return Ok(When::At(at));
    }
    NaiveDate::parse_from_str(input, DATE_FORMAT)
        .map(When::Day)
        .map_err(|_| anyhow!("Bad date \"{input}\", use {DATE_TIME_FORMAT} or {DATE_FORMAT}"))
}
