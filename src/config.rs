use crate::db::Tools;
use crate::error::{PgTransferError, Result};
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "./pgtransfer.toml",
    "~/.config/pgtransfer/config.toml",
    "~/.pgtransfer.toml",
];

/// Which end of the transfer an endpoint belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Source,
    Target,
}

impl Side {
    /// Prefix of the environment variables describing this endpoint
    pub fn env_prefix(&self) -> &'static str {
        match self {
            Side::Source => "SOURCE_DB_",
            Side::Target => "TARGET_DB_",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Source => write!(f, "source"),
            Side::Target => write!(f, "target"),
        }
    }
}

/// A password that never shows up in logs or debug output
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(****)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

/// Connection parameters for one database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    pub host: String,
    pub port: String,
    pub user: String,
    pub password: Secret,
    pub dbname: String,
}

impl EndpointConfig {
    /// Short human-readable description, without the password
    pub fn describe(&self) -> String {
        format!(
            "{} on {}:{} as {}",
            self.dbname, self.host, self.port, self.user
        )
    }
}

/// What part of the database a transfer moves
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum TransferMode {
    /// Schema and data in one pipeline
    #[default]
    Full,
    /// Table definitions, functions, indexes, no rows
    SchemaOnly,
    /// Rows only; the schema must already exist on the target
    DataOnly,
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferMode::Full => write!(f, "full"),
            TransferMode::SchemaOnly => write!(f, "schema-only"),
            TransferMode::DataOnly => write!(f, "data-only"),
        }
    }
}

/// Extra pg_restore behaviour
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreOptions {
    /// Drop target objects before recreating them
    pub clean: bool,
    /// Do not restore object ownership
    pub no_owner: bool,
}

/// Endpoint fields as they appear in the config file, all optional
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointFile {
    pub host: Option<String>,
    /// Accepts both `port = 5432` and `port = "5432"`
    #[serde(default, deserialize_with = "string_or_number")]
    pub port: Option<String>,
    pub user: Option<String>,
    pub password: Option<Secret>,
    /// Database name
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransferFile {
    pub mode: Option<TransferMode>,
    pub clean: Option<bool>,
    pub no_owner: Option<bool>,
}

/// Program paths for the PostgreSQL client tools
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolsFile {
    pub psql: Option<PathBuf>,
    pub pg_dump: Option<PathBuf>,
    pub pg_restore: Option<PathBuf>,
}

/// Partially filled configuration, as read from a file and the environment
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub source: EndpointFile,

    #[serde(default)]
    pub target: EndpointFile,

    #[serde(default)]
    pub transfer: TransferFile,

    #[serde(default)]
    pub tools: ToolsFile,
}

/// Values given on the command line; they win over everything else
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub mode: Option<TransferMode>,
    pub clean: bool,
    pub no_owner: bool,
    pub tools: ToolsFile,
}

/// Fully resolved and validated run configuration
#[derive(Debug, Clone)]
pub struct TransferSettings {
    pub source: EndpointConfig,
    pub target: EndpointConfig,
    pub tools: Tools,
    pub mode: TransferMode,
    pub restore: RestoreOptions,
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Port {
        Text(String),
        Number(u16),
    }

    Ok(Option::<Port>::deserialize(deserializer)?.map(|port| match port {
        Port::Text(text) => text,
        Port::Number(number) => number.to_string(),
    }))
}

impl Config {
    /// Load config from file or default locations
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(p) = path {
            return Self::load_from_path(p);
        }

        for default_path in DEFAULT_CONFIG_PATHS {
            let expanded = shellexpand::tilde(default_path);
            let path = Path::new(expanded.as_ref());
            if path.exists() {
                return Self::load_from_path(path);
            }
        }

        Ok(Self::default())
    }

    fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|err| {
            PgTransferError::Config(format!("cannot read {}: {}", path.display(), err))
        })?;
        let config: Config = toml::from_str(&content)?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Overlay `SOURCE_DB_*` / `TARGET_DB_*` values on top of the file values.
    ///
    /// Variables set to the empty string are treated as unset.
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        self.source.overlay_env(Side::Source, &lookup);
        self.target.overlay_env(Side::Target, &lookup);
        self
    }

    /// Validate and combine with command line overrides
    pub fn resolve(&self, overrides: &Overrides) -> Result<TransferSettings> {
        let source = self.source.resolve(Side::Source);
        let target = self.target.resolve(Side::Target);

        let (source, target) = match (source, target) {
            (Ok(source), Ok(target)) => (source, target),
            (source, target) => {
                let problems: Vec<String> = [source.err(), target.err()]
                    .into_iter()
                    .flatten()
                    .collect();
                return Err(PgTransferError::Config(problems.join("; ")));
            }
        };

        let tools = Tools {
            psql: pick_tool(&overrides.tools.psql, &self.tools.psql, "psql"),
            pg_dump: pick_tool(&overrides.tools.pg_dump, &self.tools.pg_dump, "pg_dump"),
            pg_restore: pick_tool(
                &overrides.tools.pg_restore,
                &self.tools.pg_restore,
                "pg_restore",
            ),
        };

        Ok(TransferSettings {
            source,
            target,
            tools,
            mode: overrides
                .mode
                .or(self.transfer.mode)
                .unwrap_or_default(),
            restore: RestoreOptions {
                clean: overrides.clean || self.transfer.clean.unwrap_or(false),
                no_owner: overrides.no_owner || self.transfer.no_owner.unwrap_or(false),
            },
        })
    }
}

/// CLI flag or env var, then the config file, then the bare name on `PATH`
pub(crate) fn pick_tool(cli: &Option<PathBuf>, file: &Option<PathBuf>, default: &str) -> PathBuf {
    cli.clone()
        .or_else(|| file.clone())
        .unwrap_or_else(|| PathBuf::from(default))
}

impl EndpointFile {
    fn overlay_env<F>(&mut self, side: Side, lookup: &F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let prefix = side.env_prefix();
        let var = |field: &str| lookup(&format!("{prefix}{field}")).filter(|v| !v.is_empty());

        if let Some(host) = var("HOST") {
            self.host = Some(host);
        }
        if let Some(port) = var("PORT") {
            self.port = Some(port);
        }
        if let Some(user) = var("USER") {
            self.user = Some(user);
        }
        if let Some(password) = var("PASSWORD") {
            self.password = Some(Secret::new(password));
        }
        if let Some(name) = var("NAME") {
            self.name = Some(name);
        }
    }

    /// Build a complete endpoint, or describe everything that is missing
    fn resolve(&self, side: Side) -> std::result::Result<EndpointConfig, String> {
        let prefix = side.env_prefix();
        let mut missing = Vec::new();

        let mut take = |value: Option<&String>, field: &str| match value {
            Some(v) if !v.is_empty() => v.clone(),
            _ => {
                missing.push(format!("{prefix}{field}"));
                String::new()
            }
        };

        let host = take(self.host.as_ref(), "HOST");
        let port = take(self.port.as_ref(), "PORT");
        let user = take(self.user.as_ref(), "USER");
        let password = take(self.password.as_ref().map(|s| &s.0), "PASSWORD");
        let dbname = take(self.name.as_ref(), "NAME");

        if !missing.is_empty() {
            return Err(format!(
                "incomplete {} database configuration: missing {}",
                side,
                missing.join(", ")
            ));
        }

        match port.parse::<u16>() {
            Ok(p) if p > 0 => {}
            _ => {
                return Err(format!(
                    "invalid {} database port '{}': expected a number between 1 and 65535",
                    side, port
                ))
            }
        }

        Ok(EndpointConfig {
            host,
            port,
            user,
            password: Secret::new(password),
            dbname,
        })
    }
}

/// Generate a sample config file
pub fn generate_sample_config() -> String {
    r#"# pgtransfer configuration
#
# Every value here can be overridden by the environment:
#   SOURCE_DB_HOST, SOURCE_DB_PORT, SOURCE_DB_USER, SOURCE_DB_PASSWORD, SOURCE_DB_NAME
#   TARGET_DB_HOST, TARGET_DB_PORT, TARGET_DB_USER, TARGET_DB_PASSWORD, TARGET_DB_NAME
# Prefer the environment for passwords.

[source]
host = "localhost"
port = 5432
user = "postgres"
name = "app"

[target]
host = "localhost"
port = 5433
user = "postgres"
name = "app"

[transfer]
# full | schema-only | data-only
mode = "full"
clean = false
no_owner = false

# Uncomment to use client tools outside PATH
# [tools]
# psql = "/usr/lib/postgresql/16/bin/psql"
# pg_dump = "/usr/lib/postgresql/16/bin/pg_dump"
# pg_restore = "/usr/lib/postgresql/16/bin/pg_restore"
"#
    .to_string()
}
