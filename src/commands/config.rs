use crate::cli::{ConfigArgs, ConfigCommands};
use crate::config::{generate_sample_config, pick_tool, Config, EndpointFile, Side, ToolsFile};
use anyhow::Result;
use console::style;
use std::fs;
use std::path::Path;

pub fn run(args: ConfigArgs, config_path: Option<&Path>, tools: ToolsFile) -> Result<()> {
    match args.command {
        ConfigCommands::Init { output } => init_config(&output),
        ConfigCommands::Show => show_config(config_path, &tools),
    }
}

fn init_config(output: &Path) -> Result<()> {
    if output.exists() {
        println!(
            "{} Config file already exists: {}",
            style("⚠️").yellow(),
            output.display()
        );
        return Ok(());
    }

    fs::write(output, generate_sample_config())?;

    println!(
        "{} Created config file: {}",
        style("✓").green(),
        output.display()
    );
    println!("\nEdit the file, and set SOURCE_DB_PASSWORD / TARGET_DB_PASSWORD in the environment.");

    Ok(())
}

fn show_config(config_path: Option<&Path>, tools: &ToolsFile) -> Result<()> {
    let config = Config::load(config_path)?.with_env(|key| std::env::var(key).ok());

    println!("\n{} Current Configuration", style("⚙️").bold());
    println!("{:-<50}", "");

    for (side, endpoint) in [(Side::Source, &config.source), (Side::Target, &config.target)] {
        print_endpoint(side, endpoint);
    }

    println!("\nTransfer:");
    println!("  mode: {}", config.transfer.mode.unwrap_or_default());
    println!("  clean: {}", config.transfer.clean.unwrap_or(false));
    println!("  no_owner: {}", config.transfer.no_owner.unwrap_or(false));

    println!("\nTools:");
    let psql = pick_tool(&tools.psql, &config.tools.psql, "psql");
    let pg_dump = pick_tool(&tools.pg_dump, &config.tools.pg_dump, "pg_dump");
    let pg_restore = pick_tool(&tools.pg_restore, &config.tools.pg_restore, "pg_restore");
    println!("  psql: {}", psql.display());
    println!("  pg_dump: {}", pg_dump.display());
    println!("  pg_restore: {}", pg_restore.display());

    Ok(())
}

fn print_endpoint(side: Side, endpoint: &EndpointFile) {
    let not_set = || style("(not set)").red().to_string();
    let value = |v: &Option<String>| v.clone().unwrap_or_else(not_set);

    println!("\n[{}]", side);
    println!("  host: {}", value(&endpoint.host));
    println!("  port: {}", value(&endpoint.port));
    println!("  user: {}", value(&endpoint.user));
    println!(
        "  password: {}",
        endpoint
            .password
            .as_ref()
            .map(|p| p.to_string())
            .unwrap_or_else(not_set)
    );
    println!("  name: {}", value(&endpoint.name));
}
