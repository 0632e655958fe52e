//! Execution pipeline entry
//!
//! Contribution requests land here after dispatch. Each accepted replicate
//! holds one execution slot while its preconditions are checked; slot
//! availability is what the demand loop asks before requesting more work.

pub mod precondition;

use crate::chain::{AppType, ChainClient, WorkOrder};
use crate::notification::{ContributionAuthorization, TaskNotification};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

pub use precondition::PreconditionChecker;

/// Per-task failure. Aborts that task only.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskExecutionError {
    #[error("Application is not of type {expected} (declared {declared}) [chainTaskId:{chain_task_id}]")]
    UnsupportedAppType {
        chain_task_id: String,
        expected: AppType,
        declared: AppType,
    },
    #[error("Failed to pull application image, URI:{image_uri} [chainTaskId:{chain_task_id}]")]
    ImagePullFailed {
        chain_task_id: String,
        image_uri: String,
    },
    #[error("Application image not found, URI:{image_uri} [chainTaskId:{chain_task_id}]")]
    ImageNotFound {
        chain_task_id: String,
        image_uri: String,
    },
    #[error("Task description unavailable [chainTaskId:{chain_task_id}]")]
    DescriptionUnavailable { chain_task_id: String },
    #[error("Task aborted ({reason}) [chainTaskId:{chain_task_id}]")]
    Aborted {
        chain_task_id: String,
        reason: AbortReason,
    },
}

impl TaskExecutionError {
    pub fn chain_task_id(&self) -> &str {
        match self {
            Self::UnsupportedAppType { chain_task_id, .. }
            | Self::ImagePullFailed { chain_task_id, .. }
            | Self::ImageNotFound { chain_task_id, .. }
            | Self::DescriptionUnavailable { chain_task_id }
            | Self::Aborted { chain_task_id, .. } => chain_task_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    ContributionTimeout,
    ConsensusReached,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ContributionTimeout => f.write_str("contribution timeout"),
            Self::ConsensusReached => f.write_str("consensus reached"),
        }
    }
}

/// Backpressure query used before asking for work
pub trait ExecutionCapacity: Send + Sync {
    fn can_accept_more(&self) -> bool;
}

/// Downstream consumer of dispatched notifications
#[async_trait]
pub trait ReplicateExecutor: Send + Sync {
    async fn compute_or_contribute(&self, authorization: ContributionAuthorization);

    async fn abort(&self, chain_task_id: &str, reason: AbortReason);

    /// The task reached its final on-chain stage
    async fn complete(&self, chain_task_id: &str);

    /// Notification kinds the worker has no handler for
    async fn on_unhandled(&self, notification: TaskNotification);
}

/// Default slot count: one CPU is left to the worker itself
pub fn default_max_executions() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}

pub struct TaskExecutorService {
    worker_address: String,
    chain: Arc<dyn ChainClient>,
    checker: Arc<PreconditionChecker>,
    slots: Arc<Semaphore>,
    in_flight: Arc<Mutex<HashSet<String>>>,
    aborted: Arc<Mutex<HashMap<String, AbortReason>>>,
}

impl TaskExecutorService {
    pub fn new(
        worker_address: String,
        chain: Arc<dyn ChainClient>,
        checker: Arc<PreconditionChecker>,
        max_executions: usize,
    ) -> Self {
        info!("Task executor ready [maxExecutions:{}]", max_executions);
        Self {
            worker_address,
            chain,
            checker,
            slots: Arc::new(Semaphore::new(max_executions.max(1))),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            aborted: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn clone_ref(&self) -> Self {
        Self {
            worker_address: self.worker_address.clone(),
            chain: self.chain.clone(),
            checker: self.checker.clone(),
            slots: self.slots.clone(),
            in_flight: self.in_flight.clone(),
            aborted: self.aborted.clone(),
        }
    }

    pub fn is_aborted(&self, chain_task_id: &str) -> bool {
        self.aborted.lock().contains_key(chain_task_id)
    }

    /// Release the in-flight entry and any abort recorded against it
    fn finish(&self, chain_task_id: &str) {
        let mut in_flight = self.in_flight.lock();
        in_flight.remove(chain_task_id);
        self.aborted.lock().remove(chain_task_id);
    }

    fn ensure_not_aborted(&self, chain_task_id: &str) -> Result<(), TaskExecutionError> {
        match self.aborted.lock().get(chain_task_id) {
            Some(reason) => Err(TaskExecutionError::Aborted {
                chain_task_id: chain_task_id.to_string(),
                reason: *reason,
            }),
            None => Ok(()),
        }
    }

    /// Resolve the work order for an authorization and check it can run
    pub async fn prepare(
        &self,
        authorization: &ContributionAuthorization,
    ) -> Result<WorkOrder, TaskExecutionError> {
        let chain_task_id = &authorization.chain_task_id;
        self.ensure_not_aborted(chain_task_id)?;

        let description = match self.chain.task_description(chain_task_id).await {
            Ok(Some(description)) => description,
            Ok(None) => {
                return Err(TaskExecutionError::DescriptionUnavailable {
                    chain_task_id: chain_task_id.clone(),
                })
            }
            Err(e) => {
                warn!(
                    "Failed to fetch task description [chainTaskId:{}, error:{}]",
                    chain_task_id, e
                );
                return Err(TaskExecutionError::DescriptionUnavailable {
                    chain_task_id: chain_task_id.clone(),
                });
            }
        };

        let work_order = WorkOrder::from_task_description(&description, &self.worker_address);
        self.checker.check(&work_order).await?;
        self.ensure_not_aborted(chain_task_id)?;

        Ok(work_order)
    }
}

impl ExecutionCapacity for TaskExecutorService {
    fn can_accept_more(&self) -> bool {
        self.slots.available_permits() > 0
    }
}

#[async_trait]
impl ReplicateExecutor for TaskExecutorService {
    async fn compute_or_contribute(&self, authorization: ContributionAuthorization) {
        let chain_task_id = authorization.chain_task_id.clone();

        if !self.in_flight.lock().insert(chain_task_id.clone()) {
            info!("Replicate already in progress [chainTaskId:{}]", chain_task_id);
            return;
        }

        // Take the slot now so the next capacity query already sees it
        let permit = self.slots.clone().try_acquire_owned().ok();
        let worker = self.clone_ref();

        tokio::spawn(async move {
            let _permit = match permit {
                Some(permit) => permit,
                None => match worker.slots.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        worker.finish(&chain_task_id);
                        return;
                    }
                },
            };

            match worker.prepare(&authorization).await {
                Ok(work_order) => {
                    info!(
                        "Replicate ready for execution [chainTaskId:{}, imageUri:{}, env:{:?}]",
                        chain_task_id,
                        work_order.params.app_uri,
                        work_order.container_env()
                    );
                }
                Err(e) => {
                    error!("Replicate not executed: {}", e);
                }
            }

            worker.finish(&chain_task_id);
        });
    }

    async fn abort(&self, chain_task_id: &str, reason: AbortReason) {
        // Only running work can observe the abort; it is cleared in `finish`
        let in_flight = self.in_flight.lock();
        if !in_flight.contains(chain_task_id) {
            info!(
                "Abort for a replicate not in progress [chainTaskId:{}, reason:{}]",
                chain_task_id, reason
            );
            return;
        }
        self.aborted.lock().insert(chain_task_id.to_string(), reason);
        info!(
            "Replicate aborted [chainTaskId:{}, reason:{}]",
            chain_task_id, reason
        );
    }

    async fn complete(&self, chain_task_id: &str) {
        info!("Task completed [chainTaskId:{}]", chain_task_id);
    }

    async fn on_unhandled(&self, notification: TaskNotification) {
        warn!(
            "No handler for notification [chainTaskId:{}, type:{}]",
            notification.chain_task_id, notification.task_notification_type
        );
    }
}
