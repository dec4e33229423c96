use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use planning_core::config::DEFAULT_DOWNLOAD_TIMEOUT_SECS;
use planning_core::controller::Branch;
use planning_core::download::{Fetch, HttpFetcher};
use planning_core::ics;

use super::load_settings;
use crate::render::Render;

pub async fn run(source: &str, branch: Option<&str>, config: &Path) -> Result<()> {
    let payload = read_source(source).await?;

    let summary = ics::summarize(&payload).with_context(|| format!("Could not read {source}"))?;
    println!("{}", summary.render());

    let Some(name) = branch else {
        return Ok(());
    };

    let settings = load_settings(config)?;
    let (index, branch_settings) = settings
        .branches
        .iter()
        .enumerate()
        .find(|(_, b)| b.name == name)
        .ok_or_else(|| anyhow!("No branch named '{name}' in {}", config.display()))?;
    let branch = Branch::from_settings(&format!("branches[{index}]"), branch_settings)?;

    let events = branch.parser.parse_payload(&payload)?;
    println!();
    for event in &events {
        println!("{}", event.render());
    }

    Ok(())
}

async fn read_source(source: &str) -> Result<String> {
    if source.starts_with("http://") || source.starts_with("https://") {
        let fetcher = HttpFetcher::new(Duration::from_secs(DEFAULT_DOWNLOAD_TIMEOUT_SECS));
        Ok(fetcher.fetch(source).await?)
    } else {
        std::fs::read_to_string(source).with_context(|| format!("Could not read {source}"))
    }
}
