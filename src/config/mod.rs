//! # Configuration
//!
//! Runtime settings for the engine and the batch driver, stored as TOML.
//!
//! ## Configuration Structure
//!
//! - [`EngineConfig`] - runaway ceilings, value stack limit, tracing, random seed
//! - [`LoggingConfig`] - log level and optional log file
//! - [`StorageConfig`] - where save slots are written
//!
//! Every field has a default, so a partial file (or none at all) is valid.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tame::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     Config::create_default("tame.toml").await?;
//!     let config = Config::load("tame.toml").await?;
//!     println!("operation ceiling: {}", config.engine.max_operations);
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [engine]
//! max_operations = 1000000
//! max_call_depth = 256
//! max_stack_depth = 1024
//! trace = false
//!
//! [logging]
//! level = "info"
//!
//! [storage]
//! save_dir = "saves"
//! ```

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

fn default_max_operations() -> u64 {
    1_000_000
}

fn default_max_call_depth() -> usize {
    256
}

fn default_max_stack_depth() -> usize {
    1024
}

fn default_level() -> String {
    "info".to_string()
}

fn default_save_dir() -> String {
    "saves".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Limits and switches consumed by the execution engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Operations one request may execute before it is aborted as runaway.
    #[serde(default = "default_max_operations")]
    pub max_operations: u64,
    /// Nested block/function invocations allowed in one request.
    #[serde(default = "default_max_call_depth")]
    pub max_call_depth: usize,
    /// Values the operand stack may hold.
    #[serde(default = "default_max_stack_depth")]
    pub max_stack_depth: usize,
    /// Emit TRACE cues for dispatch and block entry.
    #[serde(default)]
    pub trace: bool,
    /// Fixed seed for the random built-ins; unset means seeded from entropy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub random_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_operations: default_max_operations(),
            max_call_depth: default_max_call_depth(),
            max_stack_depth: default_max_stack_depth(),
            trace: false,
            random_seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_save_dir")]
    pub save_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            save_dir: default_save_dir(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub async fn load_or_default(path: &str) -> Result<Self> {
        if fs::try_exists(path).await.unwrap_or(false) {
            Self::load(path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }
}
