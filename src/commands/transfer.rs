use super::load_settings;
use crate::cli::TransferArgs;
use crate::config::{Overrides, Side, ToolsFile, TransferSettings};
use crate::db::{probe, DumpRestorePipeline, PgDump, PgRestore};
use crate::error::PgTransferError;
use anyhow::{Context, Result};
use console::style;
use std::path::Path;
use tracing::info;

pub async fn run(args: TransferArgs, config_path: Option<&Path>, tools: ToolsFile) -> Result<()> {
    info!("Starting Database Transfer");

    let overrides = Overrides {
        mode: args.mode,
        clean: args.clean,
        no_owner: args.no_owner,
        tools,
    };
    let settings =
        load_settings(config_path, &overrides).context("error loading configuration")?;

    let dump = PgDump::new(&settings.tools.pg_dump, settings.source.clone()).mode(settings.mode);
    let restore =
        PgRestore::new(&settings.tools.pg_restore, settings.target.clone()).options(settings.restore);

    if args.dry_run {
        print_plan(&settings, &dump, &restore);
        return Ok(());
    }

    settings.tools.check_available().await?;

    probe(&settings.tools.psql, Side::Source, &settings.source)
        .await
        .context("error connecting to source database")?;
    info!("Successfully connected to source database");

    probe(&settings.tools.psql, Side::Target, &settings.target)
        .await
        .context("error connecting to target database")?;
    info!("Successfully connected to target database");

    info!("Transferring database ({})", settings.mode);
    let pipeline = DumpRestorePipeline::new(dump, restore);

    // Dropping the pipeline on Ctrl-C kills both child processes
    tokio::select! {
        result = pipeline.run() => result.context("failed to transfer database")?,
        Ok(()) = tokio::signal::ctrl_c() => return Err(PgTransferError::Cancelled.into()),
    }

    Ok(())
}

fn print_plan(settings: &TransferSettings, dump: &PgDump, restore: &PgRestore) {
    println!("\n{} Transfer Plan", style("📋").bold());
    println!("  Source: {}", settings.source.describe());
    println!("  Target: {}", settings.target.describe());
    println!("  Mode: {}", settings.mode);
    println!("  Clean target: {}", settings.restore.clean);
    println!("  Skip ownership: {}", settings.restore.no_owner);
    println!("  Producer: {}", dump.command_line());
    println!("  Consumer: {}", restore.command_line());
    println!("\n{} Dry run - no changes will be made", style("ℹ️").cyan());
}
