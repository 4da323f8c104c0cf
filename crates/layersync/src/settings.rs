//! Settings loading for sync hosts
//!
//! Supports loading settings from (in order of priority):
//! 1. An explicit JSON file
//! 2. `settings.json` in the layersync config directory
//! 3. Environment variables layered over the defaults

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::models::{Account, Extras, ResourceGroup, SyncableResource};
use crate::remote::{RemoteLayer, RetryPolicy};
use crate::sync::MAX_TREE_DEPTH;

/// Settings filename in the layersync config directory
pub const SETTINGS_FILE: &str = "settings.json";

/// Default account type for layersync accounts
pub const DEFAULT_ACCOUNT_TYPE: &str = "org.layersync.account";

/// Default content authority
pub const DEFAULT_AUTHORITY: &str = "org.layersync.provider";

/// Default interval between periodic syncs (one hour)
pub const DEFAULT_INTERVAL_SECS: u64 = 3600;

/// Serializable description of the resource tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeSpec {
    Group { children: Vec<TreeSpec> },
    Layer { id: String, url: Url },
}

impl TreeSpec {
    fn into_group(self, settings: &SyncSettings) -> Result<ResourceGroup> {
        let TreeSpec::Group { children } = self else {
            bail!("Resource tree root must be a group");
        };

        let mut group = ResourceGroup::new();
        for child in children {
            match child {
                nested @ TreeSpec::Group { .. } => group.push(nested.into_group(settings)?),
                TreeSpec::Layer { id, url } => {
                    let layer: Arc<dyn SyncableResource> = Arc::new(
                        RemoteLayer::with_timeout(id, url, settings.request_timeout())
                            .with_retry(settings.retry_policy()),
                    );
                    group.push(layer);
                }
            }
        }
        Ok(group)
    }
}

/// Settings for a sync host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Account type the scheduler registers syncs for
    pub account_type: String,
    /// Content authority passed to every resource
    pub authority: String,
    /// Seconds between periodic syncs
    pub interval_secs: u64,
    /// Cancel a pass that runs longer than this (0 = never)
    pub pass_timeout_secs: u64,
    /// Per-request timeout for remote layers
    pub request_timeout_secs: u64,
    /// Attempts per layer request, including the first
    pub max_attempts: u32,
    /// Account names to register
    pub accounts: Vec<String>,
    /// Extras attached to every periodic sync
    pub extras: Extras,
    /// SQLite database path (defaults to the data directory)
    pub database_path: Option<PathBuf>,
    /// Resource tree to sync
    pub tree: TreeSpec,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            account_type: DEFAULT_ACCOUNT_TYPE.to_string(),
            authority: DEFAULT_AUTHORITY.to_string(),
            interval_secs: DEFAULT_INTERVAL_SECS,
            pass_timeout_secs: 0,
            request_timeout_secs: 30,
            max_attempts: RetryPolicy::default().max_attempts,
            accounts: Vec::new(),
            extras: Extras::new(),
            database_path: None,
            tree: TreeSpec::Group {
                children: Vec::new(),
            },
        }
    }
}

impl SyncSettings {
    /// Load settings from the config directory, falling back to the environment
    pub fn load() -> Result<Self> {
        let settings = if config::config_exists(SETTINGS_FILE) {
            config::load_json(SETTINGS_FILE)?
        } else {
            Self::default()
        };
        settings.with_env_overrides()
    }

    /// Load settings from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let settings: Self = config::load_json_file(path)?;
        settings.with_env_overrides()
    }

    /// Parse settings from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse settings JSON")
    }

    /// Apply `LAYERSYNC_*` environment variables over these settings
    pub fn with_env_overrides(self) -> Result<Self> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(authority) = var("LAYERSYNC_AUTHORITY") {
            self.authority = authority;
        }
        if let Some(interval) = var("LAYERSYNC_INTERVAL_SECS") {
            self.interval_secs = interval
                .parse()
                .with_context(|| format!("Invalid LAYERSYNC_INTERVAL_SECS: {}", interval))?;
        }
        if let Some(account) = var("LAYERSYNC_ACCOUNT") {
            if !self.accounts.contains(&account) {
                self.accounts.push(account);
            }
        }
        Ok(self)
    }

    /// Save settings to the config directory
    pub fn save(&self) -> Result<()> {
        config::save_json(SETTINGS_FILE, self)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        config::save_json_file(path, self)
    }

    /// Database path, defaulting to `sync.db` in the data directory
    pub fn database_path(&self) -> Option<PathBuf> {
        self.database_path
            .clone()
            .or_else(|| config::data_dir().map(|dir| dir.join("sync.db")))
    }

    /// Accounts declared in the settings
    pub fn accounts(&self) -> Vec<Account> {
        self.accounts
            .iter()
            .map(|name| Account::new(name.clone(), self.account_type.clone()))
            .collect()
    }

    pub fn pass_timeout(&self) -> Option<Duration> {
        (self.pass_timeout_secs > 0).then(|| Duration::from_secs(self.pass_timeout_secs))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            ..RetryPolicy::default()
        }
    }

    /// Build the resource tree described by these settings
    ///
    /// Trees nested deeper than the walker accepts are rejected here so a
    /// bad settings file fails at load instead of on every pass.
    pub fn build_tree(&self) -> Result<ResourceGroup> {
        let root = self.tree.clone().into_group(self)?;
        if root.depth() > MAX_TREE_DEPTH {
            bail!(
                "Layer tree is nested {} groups deep, the limit is {}",
                root.depth(),
                MAX_TREE_DEPTH
            );
        }
        Ok(root)
    }
}
