//! Amnesia recovery
//!
//! Runs once at startup, before the demand loop. Notifications the worker
//! missed while it was down are fetched from the backend and replayed when
//! the task can still be resumed safely. Each notification is handled on
//! its own; a task that cannot be resumed is skipped without affecting the
//! others.

use crate::chain::{ChainClient, TaskDescription};
use crate::core_client::ReplicateBackend;
use crate::notification::{TaskNotification, TaskNotificationType};
use crate::pubsub::NotificationTransport;
use crate::result::ResultStore;
use std::sync::Arc;
use tracing::{info, warn};

pub struct AmnesiaRecovery {
    chain: Arc<dyn ChainClient>,
    backend: Arc<dyn ReplicateBackend>,
    transport: Arc<dyn NotificationTransport>,
    results: Arc<dyn ResultStore>,
}

impl AmnesiaRecovery {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        backend: Arc<dyn ReplicateBackend>,
        transport: Arc<dyn NotificationTransport>,
        results: Arc<dyn ResultStore>,
    ) -> Self {
        Self {
            chain,
            backend,
            transport,
            results,
        }
    }

    /// Replay missed notifications and return the recovered chain task ids
    pub async fn recover_interrupted_replicates(&self) -> Vec<String> {
        let last_block = match self.chain.latest_block_number().await {
            Ok(block) => block,
            Err(e) => {
                warn!("Amnesia recovery skipped, latest block unavailable: {}", e);
                return Vec::new();
            }
        };

        let missed = match self.backend.missed_notifications(last_block).await {
            Ok(missed) => missed,
            Err(e) => {
                warn!(
                    "Amnesia recovery skipped, missed notifications unavailable [lastBlock:{}]: {}",
                    last_block, e
                );
                return Vec::new();
            }
        };

        if missed.is_empty() {
            info!("No interrupted tasks to recover [lastBlock:{}]", last_block);
            return Vec::new();
        }

        info!(
            "Recovering interrupted tasks [count:{}, lastBlock:{}]",
            missed.len(),
            last_block
        );

        let mut recovered = Vec::new();
        for notification in missed {
            if let Some(chain_task_id) = self.recover(notification).await {
                recovered.push(chain_task_id);
            }
        }

        info!(
            "Amnesia recovery done [recovered:{}, tasks:{:?}]",
            recovered.len(),
            recovered
        );
        recovered
    }

    async fn recover(&self, notification: TaskNotification) -> Option<String> {
        let chain_task_id = notification.chain_task_id.clone();
        let has_result = self.results.has_result(&chain_task_id);
        let is_fresh = notification.task_notification_type == TaskNotificationType::PleaseContribute;

        if !has_result && !is_fresh {
            info!(
                "Cannot resume task without a local result [chainTaskId:{}, type:{}]",
                chain_task_id, notification.task_notification_type
            );
            return None;
        }

        let description = self.description(&chain_task_id).await?;

        if let Err(e) = self.transport.subscribe(&chain_task_id).await {
            warn!(
                "Failed to re-subscribe, task not recovered [chainTaskId:{}]: {}",
                chain_task_id, e
            );
            return None;
        }

        self.results.save_result_info(&chain_task_id, &description);

        info!(
            "Recovering task [chainTaskId:{}, type:{}, hasResult:{}]",
            chain_task_id, notification.task_notification_type, has_result
        );
        self.transport.dispatch(notification).await;

        Some(chain_task_id)
    }

    async fn description(&self, chain_task_id: &str) -> Option<TaskDescription> {
        match self.chain.task_description(chain_task_id).await {
            Ok(Some(description)) => Some(description),
            Ok(None) => {
                warn!(
                    "Task description not found, task not recovered [chainTaskId:{}]",
                    chain_task_id
                );
                None
            }
            Err(e) => {
                warn!(
                    "Failed to fetch task description, task not recovered [chainTaskId:{}]: {}",
                    chain_task_id, e
                );
                None
            }
        }
    }
}
