//! Configuration for the herostat engine.
//!
//! Maps directly to `herostat.toml`. Every field has a default, so an empty
//! document is a valid configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{HerostatError, Result};
use crate::tally::ClampPolicy;
use crate::types::{Address, REWARD_ITEM_BUCKETS, TokenId};

/// Top-level herostat configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HerostatConfig {
    /// Logging settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Event application settings.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Entity store settings.
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Known contract addresses.
    #[serde(default)]
    pub contracts: ContractsConfig,
    /// Reward-item token id to bucket mapping.
    #[serde(default)]
    pub reward_items: RewardItemsConfig,
}

impl HerostatConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `HerostatError::Config` if the TOML is invalid or fails
    /// validation.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| HerostatError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Check cross-field constraints serde cannot express.
    ///
    /// # Errors
    /// Returns `HerostatError::Config` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.engine.max_attempts == 0 {
            return Err(HerostatError::Config(
                "engine.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.engine.prefetch_window == 0 {
            return Err(HerostatError::Config(
                "engine.prefetch_window must be at least 1".to_string(),
            ));
        }
        if self.reward_items.token_ids.len() > REWARD_ITEM_BUCKETS {
            return Err(HerostatError::Config(format!(
                "reward_items.token_ids has {} entries, at most {REWARD_ITEM_BUCKETS} buckets exist",
                self.reward_items.token_ids.len()
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::Pretty,
        }
    }
}

/// Event application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// What to do when a decrement would go below zero.
    #[serde(default)]
    pub clamp_policy: ClampPolicy,
    /// Prefetch + apply attempts per event on transient failure.
    #[serde(default = "default_3")]
    pub max_attempts: u32,
    /// Upcoming events that may be prefetched in parallel.
    #[serde(default = "default_32")]
    pub prefetch_window: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            clamp_policy: ClampPolicy::Saturate,
            max_attempts: 3,
            prefetch_window: 32,
        }
    }
}

/// Entity store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Process-local map.
    #[default]
    Memory,
    /// `SQLite` database file.
    Sqlite,
}

/// Entity store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Backend: "memory" or "sqlite".
    #[serde(default)]
    pub backend: StoreBackend,
    /// Database file for the sqlite backend.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// Use WAL mode for concurrent reads.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
    /// Detect record corruption via checksums.
    #[serde(default = "default_true")]
    pub checksum_enabled: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            path: default_db_path(),
            wal_mode: true,
            checksum_enabled: true,
        }
    }
}

/// Known contract addresses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractsConfig {
    /// Addresses whose NFT transfers are equip/unequip plumbing rather than
    /// ownership changes (staking and equipment custody contracts).
    #[serde(default)]
    pub custody: Vec<Address>,
}

impl ContractsConfig {
    /// Whether `address` is a custody contract.
    #[must_use]
    pub fn is_custody(&self, address: &Address) -> bool {
        self.custody.iter().any(|c| c == address)
    }
}

/// Reward-item token id to bucket mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardItemsConfig {
    /// Position in this list is the item's bucket.
    #[serde(default = "default_reward_item_ids")]
    pub token_ids: Vec<u64>,
}

impl Default for RewardItemsConfig {
    fn default() -> Self {
        Self {
            token_ids: default_reward_item_ids(),
        }
    }
}

impl RewardItemsConfig {
    /// Bucket for `token`, or `None` when the id is not mapped.
    #[must_use]
    pub fn bucket(&self, token: &TokenId) -> Option<usize> {
        let raw: u64 = token.as_str().parse().ok()?;
        self.token_ids.iter().position(|&id| id == raw)
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_db_path() -> PathBuf { PathBuf::from("herostat.db") }
fn default_reward_item_ids() -> Vec<u64> { (1..=8).collect() }
fn default_3() -> u32 { 3 }
fn default_32() -> usize { 32 }
