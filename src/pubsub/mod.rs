//! Task notification subscriptions
//!
//! A worker subscribes to a chain task's topic before the first
//! notification for that task is dispatched, so follow-up notifications
//! produced while handling it are never missed.

pub mod dispatcher;
pub mod registry;

use crate::http::ClientError;
use crate::notification::TaskNotification;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

pub use dispatcher::{DispatchOutcome, NotificationDispatcher};
pub use registry::{task_topic_name, SubscriptionRegistry};

/// Subscribe/dispatch seam shared by the demand loop and amnesia recovery
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    /// Idempotent
    async fn subscribe(&self, chain_task_id: &str) -> Result<(), ClientError>;

    fn is_subscribed(&self, chain_task_id: &str) -> bool;

    async fn dispatch(&self, notification: TaskNotification);
}

pub struct SubscriptionService {
    registry: Arc<SubscriptionRegistry>,
    dispatcher: NotificationDispatcher,
}

impl SubscriptionService {
    pub fn new(registry: Arc<SubscriptionRegistry>, dispatcher: NotificationDispatcher) -> Self {
        Self {
            registry,
            dispatcher,
        }
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    /// Entry point for notifications pushed on a topic. Topics this worker
    /// is not subscribed to are dropped.
    pub async fn on_topic_message(&self, notification: TaskNotification) -> Option<DispatchOutcome> {
        if !self.registry.contains(&notification.chain_task_id) {
            debug!(
                "Dropping notification for unsubscribed topic [chainTaskId:{}]",
                notification.chain_task_id
            );
            return None;
        }
        Some(self.dispatcher.handle(notification).await)
    }
}

#[async_trait]
impl NotificationTransport for SubscriptionService {
    async fn subscribe(&self, chain_task_id: &str) -> Result<(), ClientError> {
        let topic = task_topic_name(chain_task_id);
        if self.registry.insert(chain_task_id) {
            info!(
                "Subscribed to topic [chainTaskId:{}, topic:{}]",
                chain_task_id, topic
            );
        } else {
            info!(
                "Already subscribed to topic [chainTaskId:{}, topic:{}]",
                chain_task_id, topic
            );
        }
        Ok(())
    }

    fn is_subscribed(&self, chain_task_id: &str) -> bool {
        self.registry.contains(chain_task_id)
    }

    async fn dispatch(&self, notification: TaskNotification) {
        let chain_task_id = notification.chain_task_id.clone();
        let outcome = self.dispatcher.handle(notification).await;
        debug!(
            "Notification dispatched [chainTaskId:{}, outcome:{:?}]",
            chain_task_id, outcome
        );
    }
}
