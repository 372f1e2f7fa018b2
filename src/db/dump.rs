use super::{server_args, PASSWORD_ENV};
use crate::config::{EndpointConfig, TransferMode};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

/// The producer side of a transfer: pg_dump writing a custom-format archive to stdout
pub struct PgDump {
    program: PathBuf,
    endpoint: EndpointConfig,
    mode: TransferMode,
}

impl PgDump {
    pub fn new(program: impl Into<PathBuf>, endpoint: EndpointConfig) -> Self {
        Self {
            program: program.into(),
            endpoint,
            mode: TransferMode::Full,
        }
    }

    pub fn mode(mut self, mode: TransferMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn endpoint(&self) -> &EndpointConfig {
        &self.endpoint
    }

    pub fn args(&self) -> Vec<String> {
        let mut args = server_args(&self.endpoint);
        // Custom archive format, include large objects, verbose progress on stderr
        args.extend(["-F", "c", "-b", "-v"].map(String::from));

        match self.mode {
            TransferMode::Full => {}
            TransferMode::SchemaOnly => args.push("--schema-only".to_string()),
            TransferMode::DataOnly => args.push("--data-only".to_string()),
        }

        // Keeps a database name starting with '-' from being parsed as an option
        args.push("--".to_string());
        args.push(self.endpoint.dbname.clone());
        args
    }

    /// Printable command line. Never contains the password.
    pub fn command_line(&self) -> String {
        format!("{} {}", self.program.display(), self.args().join(" "))
    }

    /// Command with stderr piped and stdout left for the caller to connect
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.args())
            .env(PASSWORD_ENV, self.endpoint.password.expose())
            .stdin(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Secret;

    fn source() -> EndpointConfig {
        EndpointConfig {
            host: "old-db".to_string(),
            port: "5432".to_string(),
            user: "postgres".to_string(),
            password: Secret::new("topsecret"),
            dbname: "shop".to_string(),
        }
    }

    #[test]
    fn test_full_dump_args() {
        let dump = PgDump::new("pg_dump", source());
        assert_eq!(
            dump.args(),
            vec![
                "-h", "old-db", "-p", "5432", "-U", "postgres", "--no-password", "-F", "c",
                "-b", "-v", "--", "shop"
            ]
        );
    }

    #[test]
    fn test_mode_restricts_dump() {
        let schema = PgDump::new("pg_dump", source()).mode(TransferMode::SchemaOnly);
        assert!(schema.args().contains(&"--schema-only".to_string()));
        assert!(!schema.args().contains(&"--data-only".to_string()));

        let data = PgDump::new("pg_dump", source()).mode(TransferMode::DataOnly);
        assert!(data.args().contains(&"--data-only".to_string()));
        assert_eq!(data.args().last().map(String::as_str), Some("shop"));
    }

    #[test]
    fn test_dbname_cannot_become_an_option() {
        let mut endpoint = source();
        endpoint.dbname = "--file=/tmp/x".to_string();

        let args = PgDump::new("pg_dump", endpoint).args();
        let n = args.len();
        assert_eq!(args[n - 2], "--");
        assert_eq!(args[n - 1], "--file=/tmp/x");
    }

    #[test]
    fn test_command_line_hides_password() {
        let dump = PgDump::new("/usr/bin/pg_dump", source());
        let line = dump.command_line();
        assert!(line.starts_with("/usr/bin/pg_dump -h old-db"));
        assert!(!line.contains("topsecret"));
        assert_eq!(PASSWORD_ENV, "PGPASSWORD");
    }
}
