use crate::config::Side;
use std::process::ExitStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PgTransferError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to connect to {side} database: {message}")]
    Connection { side: Side, message: String },

    #[error("{tool} not found. Please install PostgreSQL client tools.")]
    ToolNotFound { tool: String },

    #[error("Pipeline setup failed: {0}")]
    PipelineSetup(String),

    #[error("Error starting {tool} for {side} database: {source}")]
    ProcessStart {
        tool: &'static str,
        side: Side,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} failed for {side} database ({status})")]
    ProcessExecution {
        tool: &'static str,
        side: Side,
        status: ExitStatus,
    },

    #[error("Transfer cancelled by user")]
    Cancelled,

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

impl PgTransferError {
    /// Process exit code reported for this error
    pub fn exit_code(&self) -> u8 {
        match self {
            PgTransferError::Config(_) | PgTransferError::TomlParse(_) => 2,
            PgTransferError::Connection { .. } => 3,
            PgTransferError::ToolNotFound { .. } => 4,
            PgTransferError::Cancelled => 130,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, PgTransferError>;
