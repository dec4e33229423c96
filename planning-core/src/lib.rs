//! Calendar feed ingestion and reconciliation engine.
//!
//! This crate provides everything the `planning-updater` binary runs:
//! - `config` for the settings file and its validation
//! - `ics` and `parser` to turn iCalendar feeds into [`Event`]s
//! - `download` to fetch feeds over HTTP
//! - `store` and `reconcile` to converge stored records to each cycle's events
//! - `controller` for the branch and update state machines

pub mod config;
pub mod controller;
pub mod download;
pub mod error;
pub mod event;
pub mod ics;
pub mod parser;
pub mod reconcile;
pub mod store;

pub use config::Settings;
pub use controller::{Exit, UpdateController};
pub use error::{UpdaterError, UpdaterResult};
pub use event::{Event, StoredEvent};
