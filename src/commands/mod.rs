pub mod check;
pub mod config;
pub mod transfer;

use crate::config::{Config, Overrides, TransferSettings};
use std::path::Path;

/// Read the config file, overlay the process environment, and validate
pub fn load_settings(
    config_path: Option<&Path>,
    overrides: &Overrides,
) -> anyhow::Result<TransferSettings> {
    let config = Config::load(config_path)?.with_env(|key| std::env::var(key).ok());
    Ok(config.resolve(overrides)?)
}
