use super::{server_args, PASSWORD_ENV};
use crate::config::{EndpointConfig, Side};
use crate::error::{PgTransferError, Result};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

const PROBE_QUERY: &str = "SELECT 1";

/// Verify that `endpoint` accepts connections by running `SELECT 1` through psql.
///
/// Spawns exactly one process. The password reaches psql only through
/// its environment.
pub async fn probe(psql: &Path, side: Side, endpoint: &EndpointConfig) -> Result<()> {
    info!("Checking connection to {} database: {}", side, endpoint.describe());

    let mut cmd = Command::new(psql);
    cmd.args(server_args(endpoint))
        .arg("-d")
        .arg(&endpoint.dbname)
        .arg("-c")
        .arg(PROBE_QUERY)
        .env(PASSWORD_ENV, endpoint.password.expose())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    debug!("Running: {} {:?}", psql.display(), server_args(endpoint));

    let output = cmd.output().await.map_err(|err| PgTransferError::Connection {
        side,
        message: format!("cannot run {}: {}", psql.display(), err),
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        let message = if stderr.is_empty() {
            format!("psql {}", output.status)
        } else {
            format!("psql {}: {}", output.status, stderr)
        };
        return Err(PgTransferError::Connection { side, message });
    }

    Ok(())
}
