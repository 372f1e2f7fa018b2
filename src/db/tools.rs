use crate::error::{PgTransferError, Result};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Program paths of the PostgreSQL client tools
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tools {
    pub psql: PathBuf,
    pub pg_dump: PathBuf,
    pub pg_restore: PathBuf,
}

impl Tools {
    pub fn iter(&self) -> [(&'static str, &Path); 3] {
        [
            ("psql", self.psql.as_path()),
            ("pg_dump", self.pg_dump.as_path()),
            ("pg_restore", self.pg_restore.as_path()),
        ]
    }

    /// Check that every tool runs, returning `(name, version)` pairs
    pub async fn check_available(&self) -> Result<Vec<(&'static str, String)>> {
        let mut versions = Vec::with_capacity(3);
        for (name, program) in self.iter() {
            versions.push((name, check_tool(name, program).await?));
        }
        Ok(versions)
    }
}

/// Run `<program> --version`
pub async fn check_tool(name: &str, program: &Path) -> Result<String> {
    let output = Command::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .output()
        .await;

    match output {
        Ok(o) if o.status.success() => {
            let version = String::from_utf8_lossy(&o.stdout).trim().to_string();
            debug!("Found {}: {}", name, version);
            Ok(version)
        }
        _ => Err(PgTransferError::ToolNotFound {
            tool: program.display().to_string(),
        }),
    }
}
