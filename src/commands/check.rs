use std::path::Path;

use anyhow::Result;
use owo_colors::OwoColorize;
use planning_core::controller::Branch;

use super::load_settings;
use crate::render::Render;

pub fn run(config: &Path) -> Result<()> {
    let settings = load_settings(config)?;

    let branches = settings
        .branches
        .iter()
        .enumerate()
        .map(|(i, branch)| Branch::from_settings(&format!("branches[{i}]"), branch))
        .collect::<Result<Vec<_>, _>>()?;

    println!("{} {}", "✓".green(), config.display());
    for branch in &branches {
        println!("   {}", branch.render());
    }
    println!();
    print!("{}", settings.to_toml()?);

    Ok(())
}
