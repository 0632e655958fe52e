//! Set of chain tasks this worker listens to in the current run.

use parking_lot::RwLock;
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    topics: RwLock<HashSet<String>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the task was already registered
    pub fn insert(&self, chain_task_id: &str) -> bool {
        self.topics.write().insert(chain_task_id.to_string())
    }

    pub fn contains(&self, chain_task_id: &str) -> bool {
        self.topics.read().contains(chain_task_id)
    }

    pub fn remove(&self, chain_task_id: &str) -> bool {
        self.topics.write().remove(chain_task_id)
    }

    pub fn len(&self) -> usize {
        self.topics.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.read().is_empty()
    }

    /// Sorted copy, for logging
    pub fn snapshot(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.topics.read().iter().cloned().collect();
        topics.sort();
        topics
    }
}

/// Topic a chain task's notifications are published on
pub fn task_topic_name(chain_task_id: &str) -> String {
    format!("/topic/task/{}", chain_task_id)
}
