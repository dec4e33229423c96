//! Updater configuration.
//!
//! Settings are read once at startup from a JSON or TOML file, layered with
//! `PLANNING__*` environment overrides, then validated. Any error here is
//! fatal: a cycle never starts with an invalid configuration.

mod validate;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_CONFIG_FILE: &str = "params.json";
pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 27017;
pub const DEFAULT_DELIMITER: &str = "\n";
pub const DEFAULT_DOWNLOAD_ATTEMPTS: u32 = 5;
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

const ENV_PREFIX: &str = "PLANNING";

/// Root of the configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub updater: UpdaterSettings,
    pub database: DatabaseSettings,
    pub branches: Vec<BranchSettings>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdaterSettings {
    /// Seconds between the end of a cycle and the start of the next one.
    /// Absent means a single cycle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<u64>,

    /// Consecutive failing cycles tolerated before shutting down.
    pub error_tolerance: u32,

    #[serde(default = "default_download_attempts")]
    pub download_attempts: u32,

    /// Per-request timeout, in seconds.
    #[serde(default = "default_download_timeout")]
    pub download_timeout: u64,

    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

impl UpdaterSettings {
    pub fn interval(&self) -> Option<Duration> {
        self.frequency.map(Duration::from_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Where the collections live.
///
/// `host` and `port` are reserved for a networked [`EventStore`]; the bundled
/// file store only reads `name` and `path`.
///
/// [`EventStore`]: crate::store::EventStore
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    pub name: String,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Root directory of the file store. Defaults to the platform data dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl DatabaseSettings {
    /// Directory holding the collections of this database.
    pub fn store_dir(&self) -> Result<PathBuf, ConfigError> {
        let root = match &self.path {
            Some(path) => PathBuf::from(
                shellexpand::full(path)
                    .map_err(|e| ConfigError::invalid("database.path", e.to_string()))?
                    .as_ref(),
            ),
            None => dirs::data_dir()
                .ok_or_else(|| {
                    ConfigError::invalid("database.path", "Could not determine data directory")
                })?
                .join("planning-updater"),
        };
        Ok(root.join(&self.name))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchSettings {
    pub name: String,
    pub parser: ParserSettings,
    pub groups: Vec<GroupSettings>,
}

/// Raw parser configuration. Compiled into an
/// [`EventParser`](crate::parser::EventParser) at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserSettings {
    pub mode: String,

    #[serde(default)]
    pub teachers_patterns: Vec<String>,

    #[serde(default)]
    pub groups_patterns: Vec<String>,

    #[serde(default)]
    pub blacklist: Vec<String>,

    #[serde(default = "default_delimiter")]
    pub delimiter: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSettings {
    pub name: String,
    pub addresses: Vec<String>,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_delimiter() -> String {
    DEFAULT_DELIMITER.to_string()
}

fn default_download_attempts() -> u32 {
    DEFAULT_DOWNLOAD_ATTEMPTS
}

fn default_download_timeout() -> u64 {
    DEFAULT_DOWNLOAD_TIMEOUT_SECS
}

fn default_retry_delay() -> u64 {
    DEFAULT_RETRY_DELAY_MS
}

impl Settings {
    /// Load and validate settings from `path`, applying environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::Load(format!(
                "Configuration file not found at {}",
                path.display()
            )));
        }

        let settings: Settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from an in-memory JSON document.
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let settings: Settings =
            serde_json::from_str(content).map_err(|e| ConfigError::Load(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Render the effective settings as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Load(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"{
        "updater": { "error_tolerance": 3 },
        "database": { "name": "planning" },
        "branches": [
            {
                "name": "info",
                "parser": { "mode": "ENT", "teachers_patterns": ["^M(me|\\.) "] },
                "groups": [ { "name": "g1", "addresses": ["https://example.com/g1.ics"] } ]
            }
        ]
    }"#;

    #[test]
    fn test_defaults_are_applied() {
        let settings = Settings::from_json(MINIMAL).unwrap();

        assert_eq!(settings.updater.frequency, None);
        assert_eq!(settings.updater.download_attempts, DEFAULT_DOWNLOAD_ATTEMPTS);
        assert_eq!(settings.database.host, "localhost");
        assert_eq!(settings.database.port, 27017);
        assert_eq!(settings.branches[0].parser.delimiter, "\n");
        assert!(settings.branches[0].parser.blacklist.is_empty());
    }

    #[test]
    fn test_load_from_json_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();

        let settings = Settings::load(file.path()).unwrap();

        assert_eq!(settings.updater.error_tolerance, 3);
        assert_eq!(settings.branches[0].groups[0].name, "g1");
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(
            file,
            r#"
[updater]
frequency = 600
error_tolerance = 2

[database]
name = "planning"
path = "/tmp/planning"

[[branches]]
name = "info"
groups = [{{ name = "g1", addresses = ["http://example.com/a.ics"] }}]

[branches.parser]
mode = "Nextcloud"
"#
        )
        .unwrap();

        let settings = Settings::load(file.path()).unwrap();

        assert_eq!(settings.updater.interval(), Some(Duration::from_secs(600)));
        assert_eq!(settings.branches[0].parser.mode, "Nextcloud");
        assert_eq!(
            settings.database.store_dir().unwrap(),
            PathBuf::from("/tmp/planning/planning")
        );
    }

    #[test]
    fn test_missing_file_is_a_load_error() {
        let err = Settings::load(Path::new("/nonexistent/params.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }

    #[test]
    fn test_missing_error_tolerance_is_rejected() {
        let content = MINIMAL.replace(r#""error_tolerance": 3"#, r#""frequency": 60"#);
        assert!(matches!(
            Settings::from_json(&content),
            Err(ConfigError::Load(_))
        ));
    }

    #[test]
    fn test_to_toml_round_trips() {
        let settings = Settings::from_json(MINIMAL).unwrap();
        let rendered = settings.to_toml().unwrap();
        assert!(rendered.contains("error_tolerance = 3"));
        assert!(rendered.contains("name = \"info\""));
    }
}
