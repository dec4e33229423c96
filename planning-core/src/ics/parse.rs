//! VEVENT access on top of the icalendar crate's parser.

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use icalendar::parser::{Calendar, Component, read_calendar, unfold};
use icalendar::{CalendarDateTime, DatePerhapsTime};

use crate::error::ParseError;

/// An unfolded calendar payload, ready to be read.
pub struct Feed {
    unfolded: String,
}

impl Feed {
    pub fn new(payload: &str) -> Self {
        Feed {
            unfolded: unfold(payload.trim_start_matches('\u{feff}')),
        }
    }

    /// Parse the calendar structure. Events themselves are read lazily.
    pub fn read(&self) -> Result<FeedCalendar<'_>, ParseError> {
        if !self.unfolded.trim_start().starts_with("BEGIN:VCALENDAR") {
            return Err(ParseError::Malformed(
                "payload does not start with BEGIN:VCALENDAR".into(),
            ));
        }
        let calendar =
            read_calendar(&self.unfolded).map_err(|e| ParseError::Malformed(e.to_string()))?;
        Ok(FeedCalendar { calendar })
    }
}

pub struct FeedCalendar<'a> {
    calendar: Calendar<'a>,
}

impl<'a> FeedCalendar<'a> {
    /// Every VEVENT of the calendar, in document order.
    pub fn events(&self) -> impl Iterator<Item = RawEvent<'_>> {
        let mut found = Vec::new();
        collect_vevents(&self.calendar.components, &mut found);
        found
            .into_iter()
            .enumerate()
            .map(|(index, component)| RawEvent { index, component })
    }
}

fn collect_vevents<'c>(components: &'c [Component<'c>], found: &mut Vec<&'c Component<'c>>) {
    for component in components {
        if component.name == "VEVENT" {
            found.push(component);
        } else {
            collect_vevents(&component.components, found);
        }
    }
}

/// Read-only view over one VEVENT.
pub struct RawEvent<'c> {
    index: usize,
    component: &'c Component<'c>,
}

impl RawEvent<'_> {
    pub fn uid(&self) -> Result<String, ParseError> {
        self.required_text("UID")
    }

    /// Unescaped text value of a property, empty if absent.
    pub fn text(&self, name: &str) -> String {
        self.component
            .find_prop(name)
            .map(|p| unescape_text(p.val.as_ref()))
            .unwrap_or_default()
    }

    fn required_text(&self, name: &'static str) -> Result<String, ParseError> {
        self.component
            .find_prop(name)
            .map(|p| unescape_text(p.val.as_ref()))
            .ok_or(ParseError::MissingProperty {
                index: self.index,
                property: name,
            })
    }

    /// A required DTSTART/DTEND-like property as a UTC instant.
    pub fn date(&self, name: &'static str) -> Result<DateTime<Utc>, ParseError> {
        self.date_value(name).map(to_utc)
    }

    /// DTEND, or DTSTART + DURATION when DTEND is absent. An all-day event
    /// with neither lasts one day.
    pub fn end_date(&self) -> Result<DateTime<Utc>, ParseError> {
        if self.component.find_prop("DTEND").is_some() {
            return self.date("DTEND");
        }

        let start = self.date_value("DTSTART")?;
        if let Some(prop) = self.component.find_prop("DURATION") {
            let value = prop.val.as_ref();
            return match parse_duration(value) {
                Some(duration) => Ok(to_utc(start) + duration),
                None => Err(ParseError::InvalidDate {
                    event_id: self.text("UID"),
                    property: "DURATION",
                    value: value.to_string(),
                }),
            };
        }

        match start {
            DatePerhapsTime::Date(_) => Ok(to_utc(start) + Duration::days(1)),
            DatePerhapsTime::DateTime(_) => Err(ParseError::MissingProperty {
                index: self.index,
                property: "DTEND",
            }),
        }
    }

    fn date_value(&self, name: &'static str) -> Result<DatePerhapsTime, ParseError> {
        let prop = self
            .component
            .find_prop(name)
            .ok_or(ParseError::MissingProperty {
                index: self.index,
                property: name,
            })?;

        DatePerhapsTime::try_from(prop).map_err(|_| ParseError::InvalidDate {
            event_id: self.text("UID"),
            property: name,
            value: prop.val.to_string(),
        })
    }
}

/// A non-negative RFC 5545 dur-value (`PT1H30M`, `P1D`, `+P2W`).
fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    if value.starts_with('-') {
        return None;
    }
    let parsed = iso8601::duration(value.trim_start_matches('+')).ok()?;
    let std_duration: std::time::Duration = parsed.into();
    Duration::from_std(std_duration).ok()
}

/// Convert a DTSTART/DTEND value to UTC. Floating times and all-day dates are
/// taken as UTC, as is a TZID unknown to the tz database.
fn to_utc(value: DatePerhapsTime) -> DateTime<Utc> {
    match value {
        DatePerhapsTime::Date(d) => d.and_time(NaiveTime::MIN).and_utc(),
        DatePerhapsTime::DateTime(cal_dt) => match cal_dt {
            CalendarDateTime::Utc(dt) => dt,
            CalendarDateTime::Floating(naive) => naive.and_utc(),
            CalendarDateTime::WithTimezone { date_time, tzid } => {
                match tzid.parse::<chrono_tz::Tz>() {
                    Ok(tz) => tz
                        .from_local_datetime(&date_time)
                        .earliest()
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|| date_time.and_utc()),
                    Err(_) => {
                        tracing::debug!(%tzid, "unknown TZID, assuming UTC");
                        date_time.and_utc()
                    }
                }
            }
        },
    }
}

/// Undo RFC 5545 TEXT escaping.
pub fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n' | 'N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
