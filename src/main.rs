use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod cli;
mod commands;
mod config;
mod db;
mod error;
#[cfg(test)]
mod test_support;

use cli::{Cli, Commands};
use config::ToolsFile;
use error::PgTransferError;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        "pgtransfer=debug"
    } else {
        "pgtransfer=info"
    };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(level.parse()?))
        .init();

    let config_path = cli.config.as_deref();
    let tools: ToolsFile = cli.tools.into();

    let result = match cli.command {
        Some(Commands::Transfer(args)) => commands::transfer::run(args, config_path, tools).await,
        None => commands::transfer::run(cli.transfer, config_path, tools).await,
        Some(Commands::Check) => commands::check::run(config_path, tools).await,
        Some(Commands::Config(args)) => commands::config::run(args, config_path, tools),
    };

    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            error!("{:#}", err);
            let code = err
                .downcast_ref::<PgTransferError>()
                .map(PgTransferError::exit_code)
                .unwrap_or(1);
            Ok(ExitCode::from(code))
        }
    }
}
