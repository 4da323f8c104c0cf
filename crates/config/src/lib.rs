//! Shared directories and JSON files for layersync
//!
//! Settings live in the platform config directory (`~/.config/layersync/`
//! on Linux) and the sync database in the data directory. Both can be moved
//! with `LAYERSYNC_CONFIG_DIR` / `LAYERSYNC_DATA_DIR`, which is how the
//! daemon is usually deployed under a service manager.
//!
//! Call [`init`] at startup to create the config directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;

const APP_DIR: &str = "layersync";

pub const CONFIG_DIR_VAR: &str = "LAYERSYNC_CONFIG_DIR";
pub const DATA_DIR_VAR: &str = "LAYERSYNC_DATA_DIR";

/// An explicit override wins; otherwise `APP_DIR` under the platform root
fn resolve(override_dir: Option<String>, platform_root: Option<PathBuf>) -> Option<PathBuf> {
    match override_dir.filter(|d| !d.is_empty()) {
        Some(dir) => Some(PathBuf::from(dir)),
        None => platform_root.map(|root| root.join(APP_DIR)),
    }
}

/// Create the config directory if needed and return it
pub fn init() -> Result<PathBuf> {
    ensure_config_dir()
}

pub fn config_dir() -> Option<PathBuf> {
    resolve(std::env::var(CONFIG_DIR_VAR).ok(), dirs::config_dir())
}

/// Directory for the sync database
///
/// Falls back to the config directory on platforms without a data dir.
pub fn data_dir() -> Option<PathBuf> {
    resolve(std::env::var(DATA_DIR_VAR).ok(), dirs::data_dir()).or_else(config_dir)
}

pub fn config_path(filename: &str) -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(filename))
}

pub fn config_exists(filename: &str) -> bool {
    config_path(filename).is_some_and(|path| path.is_file())
}

pub fn ensure_config_dir() -> Result<PathBuf> {
    let dir = config_dir().context("No config directory on this platform")?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Cannot create {}", dir.display()))?;
    Ok(dir)
}

/// Read `filename` from the config directory as JSON
pub fn load_json<T: DeserializeOwned>(filename: &str) -> Result<T> {
    let path = config_path(filename).context("No config directory on this platform")?;
    load_json_file(&path)
}

pub fn load_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read(path).with_context(|| format!("Cannot read {}", path.display()))?;
    serde_json::from_slice(&raw).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// Write `filename` into the config directory, creating it first
pub fn save_json<T: Serialize>(filename: &str, value: &T) -> Result<()> {
    save_json_file(&ensure_config_dir()?.join(filename), value)
}

/// Write pretty JSON through a sibling temp file and rename it into place
///
/// A crash mid-write leaves the previous file intact.
pub fn save_json_file<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).with_context(|| format!("Cannot write {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Cannot move {} into place", path.display()))
}
