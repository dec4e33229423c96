pub mod check;
pub mod custom;
pub mod inspect;
pub mod run;

use std::path::Path;

use anyhow::{Context, Result};
use planning_core::Settings;
use planning_core::store::FileStore;
use tracing::info;

/// Load and validate the settings, with the path in the error chain.
pub fn load_settings(path: &Path) -> Result<Settings> {
    Settings::load(path).with_context(|| format!("Invalid configuration {}", path.display()))
}

pub fn open_file_store(settings: &Settings) -> Result<FileStore> {
    let dir = settings.database.store_dir()?;
    info!(
        database = %settings.database.name,
        host = %settings.database.host,
        port = settings.database.port,
        path = %dir.display(),
        "using file store"
    );
    Ok(FileStore::new(dir))
}
