//! Worker startup sequence: amnesia recovery, then the demand loop.

use crate::amnesia::AmnesiaRecovery;
use crate::replicate_demand::{spawn_replicate_demand, ReplicateDemandLoop};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub struct WorkerRuntime {
    recovery: AmnesiaRecovery,
    demand: Arc<ReplicateDemandLoop>,
}

/// A started worker
pub struct RunningWorker {
    /// Tasks replayed by amnesia recovery
    pub recovered: Vec<String>,
    demand: JoinHandle<()>,
}

impl WorkerRuntime {
    pub fn new(recovery: AmnesiaRecovery, demand: Arc<ReplicateDemandLoop>) -> Self {
        Self { recovery, demand }
    }

    /// Recovery completes before the first demand tick is armed
    pub async fn start(self, shutdown: watch::Receiver<bool>) -> RunningWorker {
        let recovered = self.recovery.recover_interrupted_replicates().await;
        info!(
            "Starting replicate demand [recovered:{}, period={}ms]",
            recovered.len(),
            self.demand.period().as_millis()
        );

        RunningWorker {
            recovered,
            demand: spawn_replicate_demand(self.demand, shutdown),
        }
    }
}

impl RunningWorker {
    /// Wait for the demand loop to stop
    pub async fn join(self) {
        if let Err(e) = self.demand.await {
            warn!("Replicate demand loop panicked: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{ChainClient, TaskDescription};
    use crate::core_client::ReplicateBackend;
    use crate::executor::ExecutionCapacity;
    use crate::http::ClientError;
    use crate::notification::{ContributionAuthorization, TaskNotification};
    use crate::pubsub::NotificationTransport;
    use crate::result::ResultStore;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    struct Chain;

    #[async_trait]
    impl ChainClient for Chain {
        async fn latest_block_number(&self) -> Result<u64, ClientError> {
            Ok(10)
        }

        async fn is_task_initialized(&self, _chain_task_id: &str) -> Result<bool, ClientError> {
            Ok(true)
        }

        async fn task_description(
            &self,
            _chain_task_id: &str,
        ) -> Result<Option<TaskDescription>, ClientError> {
            Ok(None)
        }
    }

    #[derive(Default)]
    struct Backend {
        calls: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl ReplicateBackend for Backend {
        async fn available_replicate(
            &self,
            _last_block: u64,
        ) -> Result<Option<ContributionAuthorization>, ClientError> {
            self.calls.lock().push("available");
            Ok(None)
        }

        async fn missed_notifications(
            &self,
            _last_block: u64,
        ) -> Result<Vec<TaskNotification>, ClientError> {
            self.calls.lock().push("missed");
            Ok(vec![])
        }
    }

    struct Transport;

    #[async_trait]
    impl NotificationTransport for Transport {
        async fn subscribe(&self, _chain_task_id: &str) -> Result<(), ClientError> {
            Ok(())
        }

        fn is_subscribed(&self, _chain_task_id: &str) -> bool {
            false
        }

        async fn dispatch(&self, _notification: TaskNotification) {}
    }

    struct NoResults;

    impl ResultStore for NoResults {
        fn has_result(&self, _chain_task_id: &str) -> bool {
            false
        }

        fn save_result_info(&self, _chain_task_id: &str, _description: &TaskDescription) {}
    }

    struct Free;

    impl ExecutionCapacity for Free {
        fn can_accept_more(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn test_recovery_runs_before_demand() {
        let backend = Arc::new(Backend::default());
        let chain: Arc<dyn ChainClient> = Arc::new(Chain);
        let transport: Arc<dyn NotificationTransport> = Arc::new(Transport);

        let recovery = AmnesiaRecovery::new(
            chain.clone(),
            backend.clone(),
            transport.clone(),
            Arc::new(NoResults),
        );
        let demand = Arc::new(ReplicateDemandLoop::new(
            Arc::new(Free),
            chain,
            backend.clone(),
            transport,
            Duration::from_millis(10),
        ));
        let (tx, rx) = watch::channel(false);

        let running = WorkerRuntime::new(recovery, demand).start(rx).await;
        assert!(running.recovered.is_empty());

        tokio::time::sleep(Duration::from_millis(40)).await;
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), running.join())
            .await
            .unwrap();

        let calls = backend.calls.lock();
        assert_eq!(calls[0], "missed");
        assert!(calls[1..].iter().all(|call| *call == "available"));
        assert!(calls.len() > 1);
    }
}
