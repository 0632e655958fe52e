//! Chain client seams.

use super::task::TaskDescription;
use super::worker::{WorkerRecord, WorkerType};
use crate::http::ClientError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Read access to chain state needed by the worker
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Latest block observed by the chain node. `0` means unsynced.
    async fn latest_block_number(&self) -> Result<u64, ClientError>;

    /// Whether the task has left the `UNSET` stage
    async fn is_task_initialized(&self, chain_task_id: &str) -> Result<bool, ClientError>;

    /// `None` when the description cannot be retrieved
    async fn task_description(
        &self,
        chain_task_id: &str,
    ) -> Result<Option<TaskDescription>, ClientError>;
}

/// Registration request sent to the worker registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerRegistration {
    pub worker_id: String,
    pub worker_type: WorkerType,
    /// `bytes32` hex
    pub organization_id: String,
    /// `bytes32[]` hex
    pub application_type_ids: Vec<String>,
    pub details: String,
}

/// On-chain worker registry
#[async_trait]
pub trait WorkerRegistry: Send + Sync {
    async fn retrieve_worker(&self, worker_id: &str) -> Result<Option<WorkerRecord>, ClientError>;

    async fn register_worker(&self, registration: &WorkerRegistration) -> Result<(), ClientError>;
}
