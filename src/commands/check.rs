use super::load_settings;
use crate::config::{Overrides, Side, ToolsFile};
use crate::db::probe;
use anyhow::{Context, Result};
use console::style;
use std::path::Path;

/// Verify tools and connectivity for both endpoints, without moving any data
pub async fn run(config_path: Option<&Path>, tools: ToolsFile) -> Result<()> {
    let overrides = Overrides {
        tools,
        ..Default::default()
    };
    let settings =
        load_settings(config_path, &overrides).context("error loading configuration")?;

    println!("\n{} Client tools", style("🔧").bold());
    for (name, version) in settings.tools.check_available().await? {
        println!(
            "  {} {}  {}",
            style("✓").green(),
            style(name).bold(),
            style(version).dim()
        );
    }

    println!("\n{} Connections", style("🔌").bold());
    for (side, endpoint) in [
        (Side::Source, &settings.source),
        (Side::Target, &settings.target),
    ] {
        probe(&settings.tools.psql, side, endpoint)
            .await
            .with_context(|| format!("error connecting to {} database", side))?;
        println!(
            "  {} {}: {}",
            style("✓").green(),
            side,
            endpoint.describe()
        );
    }

    println!("\n{} Ready to transfer", style("✓").green().bold());
    Ok(())
}
