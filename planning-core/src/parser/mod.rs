//! Provider-specific event extraction.
//!
//! Each convention is a variant of [`EventParser`], selected by the `mode`
//! string of the branch configuration. All variants implement
//! [`ParseEvent`]; the rest of the updater only sees the enum.

mod ent;
mod nextcloud;
mod patterns;

use std::fmt;
use std::str::FromStr;

use crate::config::ParserSettings;
use crate::error::{ConfigError, ParseError};
use crate::event::Event;
use crate::ics::{Feed, FeedCalendar, RawEvent};

pub use ent::EntParser;
pub use nextcloud::NextcloudParser;
pub use patterns::{Classifier, Fragment, PatternList};

/// Extract one candidate event from one VEVENT.
pub trait ParseEvent {
    fn parse_event(&self, raw: &RawEvent<'_>) -> Result<Event, ParseError>;
}

/// The closed set of supported conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserMode {
    Ent,
    Nextcloud,
}

impl ParserMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParserMode::Ent => "ENT",
            ParserMode::Nextcloud => "Nextcloud",
        }
    }
}

impl FromStr for ParserMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ENT" => Ok(ParserMode::Ent),
            "Nextcloud" => Ok(ParserMode::Nextcloud),
            other => Err(other.to_string()),
        }
    }
}

impl fmt::Display for ParserMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub enum EventParser {
    Ent(EntParser),
    Nextcloud(NextcloudParser),
}

impl EventParser {
    /// Compile a branch's parser settings. `path` locates the settings in
    /// the configuration for error messages.
    pub fn from_settings(path: &str, settings: &ParserSettings) -> Result<Self, ConfigError> {
        let mode: ParserMode = settings
            .mode
            .parse()
            .map_err(|mode| ConfigError::UnknownParserMode {
                path: format!("{path}.mode"),
                mode,
            })?;

        let classifier = Classifier {
            teachers: PatternList::compile(
                &format!("{path}.teachers_patterns"),
                &settings.teachers_patterns,
            )?,
            groups: PatternList::compile(
                &format!("{path}.groups_patterns"),
                &settings.groups_patterns,
            )?,
            blacklist: PatternList::compile(&format!("{path}.blacklist"), &settings.blacklist)?,
        };

        Ok(match mode {
            ParserMode::Ent => EventParser::Ent(EntParser {
                classifier,
                delimiter: settings.delimiter.clone(),
            }),
            ParserMode::Nextcloud => {
                if !classifier.is_empty() {
                    tracing::warn!(%path, "patterns are ignored in Nextcloud mode");
                }
                EventParser::Nextcloud(NextcloudParser)
            }
        })
    }

    pub fn mode(&self) -> ParserMode {
        match self {
            EventParser::Ent(_) => ParserMode::Ent,
            EventParser::Nextcloud(_) => ParserMode::Nextcloud,
        }
    }

    /// Lazily parse every VEVENT of a calendar.
    pub fn events<'c>(
        &'c self,
        calendar: &'c FeedCalendar<'_>,
    ) -> impl Iterator<Item = Result<Event, ParseError>> + 'c {
        calendar.events().map(move |raw| self.parse_event(&raw))
    }

    /// Parse a whole payload. Any malformed event fails the payload.
    pub fn parse_payload(&self, payload: &str) -> Result<Vec<Event>, ParseError> {
        let feed = Feed::new(payload);
        let calendar = feed.read()?;
        self.events(&calendar).collect()
    }
}

impl ParseEvent for EventParser {
    fn parse_event(&self, raw: &RawEvent<'_>) -> Result<Event, ParseError> {
        match self {
            EventParser::Ent(parser) => parser.parse_event(raw),
            EventParser::Nextcloud(parser) => parser.parse_event(raw),
        }
    }
}
