//! Worker Configuration
//!
//! Defines the configuration for a replicate worker including:
//! - Identity (worker name and wallet)
//! - Backend and chain gateway endpoints
//! - Demand loop and execution limits
//! - On-chain registration details

use crate::chain::AppType;
use crate::executor::default_max_executions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Complete worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Worker name, also the per-worker data directory
    pub worker_name: String,
    /// Wallet address notifications are addressed to
    pub wallet_address: String,
    /// Scheduler backend base URL
    pub core_url: String,
    /// Chain gateway base URL
    pub chain_gateway_url: String,
    /// Bearer token for the backend
    pub token: Option<String>,
    /// Root of all task data
    pub base_dir: PathBuf,
    /// Demand loop period
    pub ask_for_replicate_period_ms: u64,
    pub http_timeout_secs: u64,
    /// Concurrent executions, defaults to CPUs minus one
    pub max_executions: usize,
    /// Registration details
    pub organization_id: String,
    pub application_type_ids: Vec<String>,
    pub details: String,
    /// Only app type this worker executes
    pub supported_app_type: AppType,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_name: "worker".to_string(),
            wallet_address: String::new(),
            core_url: "http://localhost:13000".to_string(),
            chain_gateway_url: "http://localhost:8545".to_string(),
            token: None,
            base_dir: PathBuf::from("/tmp/replicate-worker"),
            ask_for_replicate_period_ms: 5_000,
            http_timeout_secs: 30,
            max_executions: default_max_executions(),
            organization_id: String::new(),
            application_type_ids: Vec::new(),
            details: String::new(),
            supported_app_type: AppType::Docker,
        }
    }
}

impl WorkerConfig {
    /// Missing keys keep their default
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn ask_for_replicate_period(&self) -> Duration {
        Duration::from_millis(self.ask_for_replicate_period_ms.max(1))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Root of this worker's task directories
    pub fn worker_base_dir(&self) -> PathBuf {
        self.base_dir.join(&self.worker_name)
    }
}
