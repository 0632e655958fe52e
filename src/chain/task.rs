//! On-chain task state and descriptions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Application packaging kind. Unknown kinds are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AppType {
    Docker,
    Other(String),
}

impl From<String> for AppType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "DOCKER" => Self::Docker,
            _ => Self::Other(value),
        }
    }
}

impl From<AppType> for String {
    fn from(value: AppType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for AppType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Docker => f.write_str("DOCKER"),
            Self::Other(other) => f.write_str(other),
        }
    }
}

/// Task lifecycle stage on-chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChainTaskStatus {
    Unset,
    Active,
    Revealing,
    Completed,
    Failed,
}

impl ChainTaskStatus {
    /// `initialize` has been called for the task
    pub fn is_initialized(self) -> bool {
        !matches!(self, Self::Unset)
    }
}

/// Authoritative description of a chain task (deal + task parameters)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDescription {
    pub chain_task_id: String,
    pub requester: String,
    pub app_type: AppType,
    pub app_uri: String,
    #[serde(default)]
    pub cmd: Option<String>,
    /// Milliseconds
    pub max_execution_time: u64,
    #[serde(default)]
    pub dataset_uri: Option<String>,
    #[serde(default)]
    pub is_tee_task: bool,
}
