use crate::config::{ToolsFile, TransferMode};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "pgtransfer",
    author,
    version,
    about = "Stream a PostgreSQL database from one server to another",
    long_about = "Copy schema and/or data from a source PostgreSQL server to a target server by \
                  piping pg_dump straight into pg_restore.\n\n\
                  Connection parameters come from SOURCE_DB_{HOST,PORT,USER,PASSWORD,NAME} and \
                  TARGET_DB_{HOST,PORT,USER,PASSWORD,NAME}, optionally backed by a config file.\n\n\
                  Without a subcommand, runs `transfer`.",
    args_conflicts_with_subcommands = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub transfer: TransferArgs,

    /// Config file path
    #[arg(short, long, global = true, env = "PGTRANSFER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub tools: ToolArgs,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Transfer the source database into the target database (default)
    Transfer(TransferArgs),

    /// Check client tools and connectivity to both databases without transferring
    Check,

    /// Manage configuration
    Config(ConfigArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct TransferArgs {
    /// What to transfer
    #[arg(long, value_enum, env = "PGTRANSFER_MODE")]
    pub mode: Option<TransferMode>,

    /// Drop target objects before recreating them
    #[arg(long, default_value = "false")]
    pub clean: bool,

    /// Do not restore object ownership on the target
    #[arg(long, default_value = "false")]
    pub no_owner: bool,

    /// Dry run - show what would be done
    #[arg(long, default_value = "false")]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ToolArgs {
    /// Path to psql
    #[arg(long, global = true, env = "PGTRANSFER_PSQL")]
    pub psql: Option<PathBuf>,

    /// Path to pg_dump
    #[arg(long, global = true, env = "PGTRANSFER_PG_DUMP")]
    pub pg_dump: Option<PathBuf>,

    /// Path to pg_restore
    #[arg(long, global = true, env = "PGTRANSFER_PG_RESTORE")]
    pub pg_restore: Option<PathBuf>,
}

impl From<ToolArgs> for ToolsFile {
    fn from(args: ToolArgs) -> Self {
        ToolsFile {
            psql: args.psql,
            pg_dump: args.pg_dump,
            pg_restore: args.pg_restore,
        }
    }
}

#[derive(Parser)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Initialize a new config file
    Init {
        /// Output path
        #[arg(short, long, default_value = "./pgtransfer.toml")]
        output: PathBuf,
    },

    /// Show the effective configuration (file plus environment)
    Show,
}
