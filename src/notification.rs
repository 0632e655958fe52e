//! Task notifications
//!
//! The internal message type driving the execution pipeline. Notifications
//! are produced by the demand loop (fresh offers) and by amnesia recovery
//! (missed notifications), and both paths hand them to the same dispatch
//! entry point.

use crate::crypto::Signature;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Backend-signed permission for one worker to contribute to one task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributionAuthorization {
    pub chain_task_id: String,
    pub worker_wallet: String,
    #[serde(default)]
    pub enclave_challenge: Option<String>,
    pub signature: Signature,
}

/// Notification kind. Kinds this worker does not know are preserved as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskNotificationType {
    PleaseContribute,
    PleaseAbortContributionTimeout,
    PleaseAbortConsensusReached,
    PleaseComplete,
    Other(String),
}

impl TaskNotificationType {
    fn as_str(&self) -> &str {
        match self {
            Self::PleaseContribute => "PLEASE_CONTRIBUTE",
            Self::PleaseAbortContributionTimeout => "PLEASE_ABORT_CONTRIBUTION_TIMEOUT",
            Self::PleaseAbortConsensusReached => "PLEASE_ABORT_CONSENSUS_REACHED",
            Self::PleaseComplete => "PLEASE_COMPLETE",
            Self::Other(other) => other,
        }
    }
}

impl From<String> for TaskNotificationType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "PLEASE_CONTRIBUTE" => Self::PleaseContribute,
            "PLEASE_ABORT_CONTRIBUTION_TIMEOUT" => Self::PleaseAbortContributionTimeout,
            "PLEASE_ABORT_CONSENSUS_REACHED" => Self::PleaseAbortConsensusReached,
            "PLEASE_COMPLETE" => Self::PleaseComplete,
            _ => Self::Other(value),
        }
    }
}

impl From<TaskNotificationType> for String {
    fn from(value: TaskNotificationType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for TaskNotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskNotificationExtra {
    #[serde(default)]
    pub contribution_authorization: Option<ContributionAuthorization>,
    #[serde(default)]
    pub block_number: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskNotification {
    pub chain_task_id: String,
    /// Empty means "every subscriber", including this worker
    #[serde(default)]
    pub workers_address: Vec<String>,
    pub task_notification_type: TaskNotificationType,
    #[serde(default, rename = "taskNotificationExtra")]
    pub extra: Option<TaskNotificationExtra>,
}

impl TaskNotification {
    /// Self-addressed contribution request built from a fresh offer
    pub fn please_contribute(authorization: ContributionAuthorization) -> Self {
        Self {
            chain_task_id: authorization.chain_task_id.clone(),
            workers_address: Vec::new(),
            task_notification_type: TaskNotificationType::PleaseContribute,
            extra: Some(TaskNotificationExtra {
                contribution_authorization: Some(authorization),
                block_number: None,
            }),
        }
    }

    pub fn contribution_authorization(&self) -> Option<&ContributionAuthorization> {
        self.extra
            .as_ref()
            .and_then(|extra| extra.contribution_authorization.as_ref())
    }

    /// Whether this worker is among the recipients
    pub fn is_addressed_to(&self, worker_address: &str) -> bool {
        self.workers_address.is_empty()
            || self
                .workers_address
                .iter()
                .any(|a| a.eq_ignore_ascii_case(worker_address))
    }
}
