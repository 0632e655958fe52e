//! Replicate demand loop
//!
//! On every tick the worker asks the backend for one replicate, provided it
//! has a free execution slot and trusts its view of the chain. Accepted
//! offers are subscribed to first and then dispatched as a
//! `PLEASE_CONTRIBUTE` notification addressed to this worker.

use crate::chain::ChainClient;
use crate::core_client::ReplicateBackend;
use crate::executor::ExecutionCapacity;
use crate::notification::TaskNotification;
use crate::pubsub::NotificationTransport;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Exit point of a single demand cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A previous cycle is still running
    Busy,
    WorkerFull,
    /// Latest block is 0
    ChainUnsynced,
    ChainUnavailable,
    NoOffer,
    OfferFailed,
    /// Offer for a task already handled in this run
    AlreadySubscribed { chain_task_id: String },
    TaskNotInitialized { chain_task_id: String },
    InitializationCheckFailed { chain_task_id: String },
    SubscribeFailed { chain_task_id: String },
    Dispatched { chain_task_id: String },
}

pub struct ReplicateDemandLoop {
    capacity: Arc<dyn ExecutionCapacity>,
    chain: Arc<dyn ChainClient>,
    backend: Arc<dyn ReplicateBackend>,
    transport: Arc<dyn NotificationTransport>,
    period: Duration,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag however the cycle exits
struct CycleGuard<'a>(&'a AtomicBool);

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ReplicateDemandLoop {
    pub fn new(
        capacity: Arc<dyn ExecutionCapacity>,
        chain: Arc<dyn ChainClient>,
        backend: Arc<dyn ReplicateBackend>,
        transport: Arc<dyn NotificationTransport>,
        period: Duration,
    ) -> Self {
        Self {
            capacity,
            chain,
            backend,
            transport,
            period,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Run one cycle unless another one is in flight
    pub async fn ask_for_replicate(&self) -> CycleOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Previous replicate demand still running, skipping tick");
            return CycleOutcome::Busy;
        }
        let _guard = CycleGuard(&self.in_flight);

        self.cycle().await
    }

    async fn cycle(&self) -> CycleOutcome {
        if !self.capacity.can_accept_more() {
            debug!("Worker cannot accept more replicates");
            return CycleOutcome::WorkerFull;
        }

        let last_block = match self.chain.latest_block_number().await {
            Ok(0) => {
                warn!("Chain is not synchronized, not asking for replicate [lastBlock:0]");
                return CycleOutcome::ChainUnsynced;
            }
            Ok(block) => block,
            Err(e) if e.is_timeout() => {
                warn!("Chain gateway timed out, not asking for replicate");
                return CycleOutcome::ChainUnavailable;
            }
            Err(e) => {
                warn!("Failed to read latest block, not asking for replicate: {}", e);
                return CycleOutcome::ChainUnavailable;
            }
        };

        let authorization = match self.backend.available_replicate(last_block).await {
            Ok(Some(authorization)) => authorization,
            Ok(None) => {
                debug!("No replicate available [lastBlock:{}]", last_block);
                return CycleOutcome::NoOffer;
            }
            Err(e) if e.is_timeout() => {
                warn!("Replicate request timed out [lastBlock:{}]", last_block);
                return CycleOutcome::OfferFailed;
            }
            Err(e) => {
                warn!("Failed to ask for replicate [lastBlock:{}]: {}", last_block, e);
                return CycleOutcome::OfferFailed;
            }
        };
        let chain_task_id = authorization.chain_task_id.clone();

        if self.transport.is_subscribed(&chain_task_id) {
            warn!(
                "Replicate offered for a task already in progress [chainTaskId:{}]",
                chain_task_id
            );
            return CycleOutcome::AlreadySubscribed { chain_task_id };
        }

        match self.chain.is_task_initialized(&chain_task_id).await {
            Ok(true) => {}
            Ok(false) => {
                warn!(
                    "Task not initialized on-chain, dropping offer [chainTaskId:{}]",
                    chain_task_id
                );
                return CycleOutcome::TaskNotInitialized { chain_task_id };
            }
            Err(e) => {
                warn!(
                    "Failed to check task initialization [chainTaskId:{}]: {}",
                    chain_task_id, e
                );
                return CycleOutcome::InitializationCheckFailed { chain_task_id };
            }
        }

        if let Err(e) = self.transport.subscribe(&chain_task_id).await {
            warn!(
                "Failed to subscribe, dropping offer [chainTaskId:{}]: {}",
                chain_task_id, e
            );
            return CycleOutcome::SubscribeFailed { chain_task_id };
        }

        info!(
            "Replicate accepted [chainTaskId:{}, lastBlock:{}]",
            chain_task_id, last_block
        );
        self.transport
            .dispatch(TaskNotification::please_contribute(authorization))
            .await;

        CycleOutcome::Dispatched { chain_task_id }
    }

    /// Tick until `shutdown` flips to true. A tick that fires while a cycle
    /// is running is dropped; the running cycle is awaited before returning.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Replicate demand loop started (period={}ms)",
            self.period.as_millis()
        );

        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut current: Option<JoinHandle<CycleOutcome>> = None;

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    if current.as_ref().is_some_and(|handle| !handle.is_finished()) {
                        debug!("Replicate demand tick skipped, cycle in flight");
                        continue;
                    }
                    let demand = self.clone();
                    current = Some(tokio::spawn(async move { demand.ask_for_replicate().await }));
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        if let Some(handle) = current {
            if let Err(e) = handle.await {
                warn!("Replicate demand cycle ended abnormally: {}", e);
            }
        }
        info!("Replicate demand loop stopped");
    }
}

/// Start the demand loop in background
pub fn spawn_replicate_demand(
    demand: Arc<ReplicateDemandLoop>,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(demand.run(shutdown))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::TaskDescription;
    use crate::crypto::Signature;
    use crate::http::ClientError;
    use crate::notification::{ContributionAuthorization, TaskNotificationType};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use std::sync::atomic::AtomicUsize;

    struct Capacity(bool);

    impl ExecutionCapacity for Capacity {
        fn can_accept_more(&self) -> bool {
            self.0
        }
    }

    #[derive(Default)]
    struct FakeChain {
        block: u64,
        initialized: bool,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ChainClient for FakeChain {
        async fn latest_block_number(&self) -> Result<u64, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.block)
        }

        async fn is_task_initialized(&self, _chain_task_id: &str) -> Result<bool, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.initialized)
        }

        async fn task_description(
            &self,
            _chain_task_id: &str,
        ) -> Result<Option<TaskDescription>, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }
    }

    #[derive(Default)]
    struct FakeBackend {
        offer: Option<ContributionAuthorization>,
        asked_with: Mutex<Vec<u64>>,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl ReplicateBackend for FakeBackend {
        async fn available_replicate(
            &self,
            last_block: u64,
        ) -> Result<Option<ContributionAuthorization>, ClientError> {
            self.asked_with.lock().push(last_block);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(self.offer.clone())
        }

        async fn missed_notifications(
            &self,
            _last_block: u64,
        ) -> Result<Vec<TaskNotification>, ClientError> {
            Ok(vec![])
        }
    }

    #[derive(Default)]
    struct RecordingTransport {
        events: Mutex<Vec<String>>,
        dispatched: Mutex<Vec<TaskNotification>>,
        subscribed: Mutex<HashSet<String>>,
    }

    #[async_trait]
    impl NotificationTransport for RecordingTransport {
        async fn subscribe(&self, chain_task_id: &str) -> Result<(), ClientError> {
            self.events.lock().push(format!("subscribe:{}", chain_task_id));
            self.subscribed.lock().insert(chain_task_id.to_string());
            Ok(())
        }

        fn is_subscribed(&self, chain_task_id: &str) -> bool {
            self.subscribed.lock().contains(chain_task_id)
        }

        async fn dispatch(&self, notification: TaskNotification) {
            self.events
                .lock()
                .push(format!("dispatch:{}", notification.chain_task_id));
            self.dispatched.lock().push(notification);
        }
    }

    fn offer(chain_task_id: &str) -> ContributionAuthorization {
        ContributionAuthorization {
            chain_task_id: chain_task_id.to_string(),
            worker_wallet: "0xme".to_string(),
            enclave_challenge: Some("0xenclave".to_string()),
            signature: Signature::from_parts(&[1u8; 32], &[2u8; 32], 27),
        }
    }

    fn demand(
        can_accept: bool,
        chain: Arc<FakeChain>,
        backend: Arc<FakeBackend>,
        transport: Arc<RecordingTransport>,
    ) -> ReplicateDemandLoop {
        ReplicateDemandLoop::new(
            Arc::new(Capacity(can_accept)),
            chain,
            backend,
            transport,
            Duration::from_millis(10),
        )
    }

    #[tokio::test]
    async fn test_full_worker_makes_no_calls() {
        let chain = Arc::new(FakeChain {
            block: 100,
            initialized: true,
            ..Default::default()
        });
        let backend = Arc::new(FakeBackend {
            offer: Some(offer("0xabc")),
            ..Default::default()
        });
        let transport = Arc::new(RecordingTransport::default());

        let outcome = demand(false, chain.clone(), backend.clone(), transport.clone())
            .ask_for_replicate()
            .await;

        assert_eq!(outcome, CycleOutcome::WorkerFull);
        assert_eq!(chain.calls.load(Ordering::SeqCst), 0);
        assert!(backend.asked_with.lock().is_empty());
        assert!(transport.events.lock().is_empty());
    }

    #[tokio::test]
    async fn test_unsynced_chain_requests_no_offer() {
        let chain = Arc::new(FakeChain::default());
        let backend = Arc::new(FakeBackend {
            offer: Some(offer("0xabc")),
            ..Default::default()
        });
        let transport = Arc::new(RecordingTransport::default());

        let outcome = demand(true, chain, backend.clone(), transport.clone())
            .ask_for_replicate()
            .await;

        assert_eq!(outcome, CycleOutcome::ChainUnsynced);
        assert!(backend.asked_with.lock().is_empty());
        assert!(transport.events.lock().is_empty());
    }

    #[tokio::test]
    async fn test_no_offer_ends_cycle() {
        let chain = Arc::new(FakeChain {
            block: 42,
            initialized: true,
            ..Default::default()
        });
        let backend = Arc::new(FakeBackend::default());
        let transport = Arc::new(RecordingTransport::default());

        let outcome = demand(true, chain, backend.clone(), transport.clone())
            .ask_for_replicate()
            .await;

        assert_eq!(outcome, CycleOutcome::NoOffer);
        assert_eq!(backend.asked_with.lock().as_slice(), [42]);
        assert!(transport.events.lock().is_empty());
    }

    #[tokio::test]
    async fn test_slow_backend_ends_cycle() {
        use crate::core_client::{CoreClient, CoreClientConfig};
        use httpmock::prelude::*;

        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/replicates/available");
            then.status(200)
                .delay(Duration::from_millis(500))
                .json_body(serde_json::json!({}));
        });
        let backend = Arc::new(CoreClient::new(CoreClientConfig {
            core_url: server.base_url(),
            token: None,
            timeout: Duration::from_millis(50),
        }));
        let chain = Arc::new(FakeChain {
            block: 100,
            initialized: true,
            ..Default::default()
        });
        let transport = Arc::new(RecordingTransport::default());

        let demand = ReplicateDemandLoop::new(
            Arc::new(Capacity(true)),
            chain,
            backend,
            transport.clone(),
            Duration::from_millis(10),
        );

        assert_eq!(demand.ask_for_replicate().await, CycleOutcome::OfferFailed);
        assert!(transport.events.lock().is_empty());
    }

    #[tokio::test]
    async fn test_uninitialized_task_is_not_subscribed() {
        let chain = Arc::new(FakeChain {
            block: 100,
            initialized: false,
            ..Default::default()
        });
        let backend = Arc::new(FakeBackend {
            offer: Some(offer("0xabc")),
            ..Default::default()
        });
        let transport = Arc::new(RecordingTransport::default());

        let outcome = demand(true, chain, backend, transport.clone())
            .ask_for_replicate()
            .await;

        assert_eq!(
            outcome,
            CycleOutcome::TaskNotInitialized {
                chain_task_id: "0xabc".to_string()
            }
        );
        assert!(transport.events.lock().is_empty());
    }

    #[tokio::test]
    async fn test_valid_offer_subscribes_then_dispatches() {
        let chain = Arc::new(FakeChain {
            block: 100,
            initialized: true,
            ..Default::default()
        });
        let backend = Arc::new(FakeBackend {
            offer: Some(offer("0xabc")),
            ..Default::default()
        });
        let transport = Arc::new(RecordingTransport::default());

        let outcome = demand(true, chain, backend.clone(), transport.clone())
            .ask_for_replicate()
            .await;

        assert_eq!(
            outcome,
            CycleOutcome::Dispatched {
                chain_task_id: "0xabc".to_string()
            }
        );
        assert_eq!(backend.asked_with.lock().as_slice(), [100]);
        assert_eq!(
            transport.events.lock().as_slice(),
            ["subscribe:0xabc", "dispatch:0xabc"]
        );

        let dispatched = transport.dispatched.lock();
        assert_eq!(
            dispatched[0].task_notification_type,
            TaskNotificationType::PleaseContribute
        );
        assert!(dispatched[0].workers_address.is_empty());
        assert_eq!(dispatched[0].contribution_authorization(), Some(&offer("0xabc")));
    }

    #[tokio::test]
    async fn test_offer_for_subscribed_task_is_not_dispatched_again() {
        let chain = Arc::new(FakeChain {
            block: 100,
            initialized: true,
            ..Default::default()
        });
        let backend = Arc::new(FakeBackend {
            offer: Some(offer("0xabc")),
            ..Default::default()
        });
        let transport = Arc::new(RecordingTransport::default());
        let demand = demand(true, chain, backend, transport.clone());

        demand.ask_for_replicate().await;
        let second = demand.ask_for_replicate().await;

        assert_eq!(
            second,
            CycleOutcome::AlreadySubscribed {
                chain_task_id: "0xabc".to_string()
            }
        );
        assert_eq!(transport.dispatched.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_overlapping_cycle_is_skipped() {
        let chain = Arc::new(FakeChain {
            block: 100,
            initialized: true,
            ..Default::default()
        });
        let backend = Arc::new(FakeBackend {
            delay: Some(Duration::from_millis(100)),
            ..Default::default()
        });
        let transport = Arc::new(RecordingTransport::default());
        let demand = Arc::new(demand(true, chain, backend.clone(), transport));

        let running = {
            let demand = demand.clone();
            tokio::spawn(async move { demand.ask_for_replicate().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(demand.ask_for_replicate().await, CycleOutcome::Busy);
        assert_eq!(running.await.unwrap(), CycleOutcome::NoOffer);
        assert_eq!(backend.asked_with.lock().len(), 1);

        assert_eq!(demand.ask_for_replicate().await, CycleOutcome::NoOffer);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let chain = Arc::new(FakeChain {
            block: 7,
            initialized: true,
            ..Default::default()
        });
        let backend = Arc::new(FakeBackend::default());
        let transport = Arc::new(RecordingTransport::default());
        let demand = Arc::new(demand(true, chain, backend.clone(), transport));
        let (tx, rx) = watch::channel(false);

        let handle = spawn_replicate_demand(demand, rx);
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(!backend.asked_with.lock().is_empty());
    }
}
