//! Routing of task notifications into the execution pipeline.

use super::registry::SubscriptionRegistry;
use crate::executor::{AbortReason, ReplicateExecutor};
use crate::notification::{TaskNotification, TaskNotificationType};
use std::sync::Arc;
use tracing::{error, info, warn};

/// What the dispatcher did with a notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Addressed to other workers
    NotForThisWorker,
    Contribute,
    /// `PLEASE_CONTRIBUTE` without an authorization
    MissingAuthorization,
    Aborted(AbortReason),
    Completed,
    /// Forwarded through the fallback path
    Unhandled(TaskNotificationType),
}

pub struct NotificationDispatcher {
    worker_address: String,
    executor: Arc<dyn ReplicateExecutor>,
    registry: Arc<SubscriptionRegistry>,
}

impl NotificationDispatcher {
    pub fn new(
        worker_address: String,
        executor: Arc<dyn ReplicateExecutor>,
        registry: Arc<SubscriptionRegistry>,
    ) -> Self {
        Self {
            worker_address,
            executor,
            registry,
        }
    }

    pub async fn handle(&self, notification: TaskNotification) -> DispatchOutcome {
        if !notification.is_addressed_to(&self.worker_address) {
            return DispatchOutcome::NotForThisWorker;
        }

        let chain_task_id = notification.chain_task_id.clone();
        let kind = notification.task_notification_type.clone();
        info!(
            "Received notification [chainTaskId:{}, type:{}]",
            chain_task_id, kind
        );

        match &kind {
            TaskNotificationType::PleaseContribute => {
                match notification.contribution_authorization() {
                    Some(authorization) => {
                        self.executor
                            .compute_or_contribute(authorization.clone())
                            .await;
                        DispatchOutcome::Contribute
                    }
                    None => {
                        error!(
                            "Empty contribution authorization for PLEASE_CONTRIBUTE [chainTaskId:{}]",
                            chain_task_id
                        );
                        DispatchOutcome::MissingAuthorization
                    }
                }
            }
            TaskNotificationType::PleaseAbortContributionTimeout => {
                self.abort(&chain_task_id, AbortReason::ContributionTimeout)
                    .await
            }
            TaskNotificationType::PleaseAbortConsensusReached => {
                self.abort(&chain_task_id, AbortReason::ConsensusReached)
                    .await
            }
            TaskNotificationType::PleaseComplete => {
                self.unsubscribe(&chain_task_id);
                self.executor.complete(&chain_task_id).await;
                DispatchOutcome::Completed
            }
            TaskNotificationType::Other(_) => {
                warn!(
                    "Unhandled notification type, forwarding [chainTaskId:{}, type:{}]",
                    chain_task_id, kind
                );
                self.executor.on_unhandled(notification).await;
                DispatchOutcome::Unhandled(kind.clone())
            }
        }
    }

    fn unsubscribe(&self, chain_task_id: &str) {
        if self.registry.remove(chain_task_id) {
            info!("Unsubscribed from topic [chainTaskId:{}]", chain_task_id);
        }
    }

    async fn abort(&self, chain_task_id: &str, reason: AbortReason) -> DispatchOutcome {
        self.unsubscribe(chain_task_id);
        self.executor.abort(chain_task_id, reason).await;
        DispatchOutcome::Aborted(reason)
    }
}
