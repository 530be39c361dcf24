//! Locations of the CLI's config file and document store snapshot.

use std::path::{Path, PathBuf};

use misebox_core::config::ClientConfig;

use crate::error::CliError;

const APP_DIR_NAME: &str = "misebox";
const CONFIG_FILE_NAME: &str = "config.json";
const STORE_FILE_NAME: &str = "store.json";

pub fn default_config_path() -> Result<PathBuf, CliError> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
        .ok_or_else(|| CliError::Config("Failed to resolve config directory".to_string()))
}

pub fn default_store_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR_NAME).join(STORE_FILE_NAME))
        .ok_or_else(|| CliError::Config("Failed to resolve data directory".to_string()))
}

/// Offline accounts file paired with a store snapshot
/// (`store.json` -> `store.accounts.json`).
pub fn accounts_path(store_path: &Path) -> PathBuf {
    store_path.with_extension("accounts.json")
}

pub fn resolve_config_path(explicit: Option<PathBuf>) -> Result<PathBuf, CliError> {
    explicit.map_or_else(default_config_path, Ok)
}

pub fn resolve_store_path(explicit: Option<PathBuf>) -> Result<PathBuf, CliError> {
    explicit.map_or_else(default_store_path, Ok)
}

/// Load the config file (defaults when it does not exist yet), overlay the
/// environment and validate the result.
pub fn load_config(path: &Path) -> Result<ClientConfig, CliError> {
    let config = if path.exists() {
        ClientConfig::load_from_path(path)?
    } else {
        tracing::debug!("No config at {}, using defaults", path.display());
        ClientConfig::default()
    };
    let config = config.with_env_overrides();
    config.validate()?;
    Ok(config)
}
