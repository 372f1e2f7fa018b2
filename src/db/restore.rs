use super::{server_args, PASSWORD_ENV};
use crate::config::{EndpointConfig, RestoreOptions};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

/// The consumer side of a transfer: pg_restore applying an archive read from stdin
pub struct PgRestore {
    program: PathBuf,
    endpoint: EndpointConfig,
    options: RestoreOptions,
}

impl PgRestore {
    pub fn new(program: impl Into<PathBuf>, endpoint: EndpointConfig) -> Self {
        Self {
            program: program.into(),
            endpoint,
            options: RestoreOptions::default(),
        }
    }

    pub fn options(mut self, options: RestoreOptions) -> Self {
        self.options = options;
        self
    }

    pub fn endpoint(&self) -> &EndpointConfig {
        &self.endpoint
    }

    pub fn args(&self) -> Vec<String> {
        let mut args = server_args(&self.endpoint);
        args.push("-d".to_string());
        args.push(self.endpoint.dbname.clone());
        args.push("-v".to_string());

        if self.options.clean {
            args.push("--clean".to_string());
            args.push("--if-exists".to_string());
        }
        if self.options.no_owner {
            args.push("--no-owner".to_string());
        }

        args
    }

    pub fn command_line(&self) -> String {
        format!("{} {}", self.program.display(), self.args().join(" "))
    }

    /// Command reading the archive from a piped stdin
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.args())
            .env(PASSWORD_ENV, self.endpoint.password.expose())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}
