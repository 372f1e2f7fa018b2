mod dump;
mod forward;
mod pipeline;
mod probe;
mod restore;
mod tools;

pub use dump::PgDump;
pub use forward::forward_lines;
pub use pipeline::DumpRestorePipeline;
pub use probe::probe;
pub use restore::PgRestore;
pub use tools::Tools;

use crate::config::EndpointConfig;

/// Environment variable libpq reads the password from
pub(crate) const PASSWORD_ENV: &str = "PGPASSWORD";

/// Host, port and user selectors shared by every client tool.
/// `--no-password` keeps a tool from blocking on a prompt.
fn server_args(endpoint: &EndpointConfig) -> Vec<String> {
    vec![
        "-h".to_string(),
        endpoint.host.clone(),
        "-p".to_string(),
        endpoint.port.clone(),
        "-U".to_string(),
        endpoint.user.clone(),
        "--no-password".to_string(),
    ]
}
