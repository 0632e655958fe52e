//! Replicate Worker for a Decentralized Compute Network
//!
//! The worker asks the scheduler backend for replicates, checks them
//! against chain state and hands accepted ones to the local execution
//! pipeline. On startup it first replays notifications missed while it
//! was offline.
//!
//! ## Module Structure
//!
//! - `crypto/`: Signature codec
//! - `chain/`: On-chain records and the chain gateway client
//! - `executor/`: Execution preconditions and capacity
//! - `pubsub/`: Topic subscriptions and notification dispatch
//! - `replicate_demand`: Periodic replicate demand
//! - `amnesia`: Startup recovery of interrupted replicates
//! - `runtime`: Startup sequencing

// ============================================================================
// CORE
// ============================================================================

/// Signature codec
pub mod crypto;

/// Blockchain integration (records, gateway client)
pub mod chain;

/// Task notifications exchanged with the backend
pub mod notification;

/// Worker configuration
pub mod config;

// ============================================================================
// CLIENTS
// ============================================================================

/// Shared HTTP helpers
pub mod http;

/// Scheduler backend client
pub mod core_client;

/// Docker image management
pub mod docker;

// ============================================================================
// WORKER
// ============================================================================

/// Execution pipeline entry
pub mod executor;

/// Local results
pub mod result;

/// Topic subscriptions and dispatch
pub mod pubsub;

pub mod replicate_demand;

pub mod amnesia;

/// Worker registry registration
pub mod registration;

pub mod runtime;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use amnesia::AmnesiaRecovery;
pub use chain::{
    AppType, ChainClient, ChainGatewayClient, ChainGatewayConfig, ChainModelError,
    ChainTaskStatus, TaskDescription, WorkOrder, WorkerRecord, WorkerRegistry, WorkerStatus,
    WorkerType,
};
pub use config::{ConfigError, WorkerConfig};
pub use core_client::{CoreClient, CoreClientConfig, ReplicateBackend};
pub use crypto::{Signature, SignatureError, SignatureParts};
pub use docker::{DockerImageManager, ImageManager};
pub use executor::{
    AbortReason, ExecutionCapacity, PreconditionChecker, ReplicateExecutor, TaskExecutionError,
    TaskExecutorService,
};
pub use http::ClientError;
pub use notification::{
    ContributionAuthorization, TaskNotification, TaskNotificationExtra, TaskNotificationType,
};
pub use pubsub::{
    DispatchOutcome, NotificationDispatcher, NotificationTransport, SubscriptionRegistry,
    SubscriptionService,
};
pub use registration::{ensure_registered, RegistrationError, RegistrationOutcome};
pub use replicate_demand::{spawn_replicate_demand, CycleOutcome, ReplicateDemandLoop};
pub use result::{FsResultStore, ResultInfo, ResultStore};
pub use runtime::{RunningWorker, WorkerRuntime};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Exit status when the worker cannot register on-chain
pub const REGISTRATION_FAILURE_EXIT_CODE: i32 = 2;
