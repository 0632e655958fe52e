//! Replicate Worker
//!
//! Registers the worker on-chain, replays missed notifications and then
//! keeps asking the scheduler backend for replicates until interrupted.

use anyhow::{Context, Result};
use clap::Parser;
use replicate_worker::{
    ensure_registered, AmnesiaRecovery, ChainGatewayClient, ChainGatewayConfig, CoreClient,
    CoreClientConfig, DockerImageManager, FsResultStore, NotificationDispatcher,
    PreconditionChecker, ReplicateDemandLoop, SubscriptionRegistry, SubscriptionService,
    TaskExecutorService, WorkerConfig, WorkerRuntime, REGISTRATION_FAILURE_EXIT_CODE,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "replicate-worker")]
#[command(about = "Replicate worker for the decentralized compute network")]
struct Args {
    /// TOML config file
    #[arg(short, long, env = "WORKER_CONFIG")]
    config: Option<PathBuf>,

    /// Worker name
    #[arg(long, env = "WORKER_NAME")]
    name: Option<String>,

    /// Worker wallet address
    #[arg(long, env = "WORKER_WALLET_ADDRESS")]
    wallet_address: Option<String>,

    /// Scheduler backend URL
    #[arg(long, env = "CORE_URL")]
    core_url: Option<String>,

    /// Chain gateway URL
    #[arg(long, env = "CHAIN_GATEWAY_URL")]
    chain_gateway_url: Option<String>,

    /// Backend bearer token
    #[arg(long, env = "CORE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Base directory for task data
    #[arg(short, long, env = "WORKER_BASE_DIR")]
    base_dir: Option<PathBuf>,

    /// Replicate demand period in milliseconds
    #[arg(long, env = "ASK_FOR_REPLICATE_PERIOD_MS")]
    period_ms: Option<u64>,

    /// Maximum concurrent executions
    #[arg(long, env = "WORKER_MAX_EXECUTIONS")]
    max_executions: Option<usize>,
}

impl Args {
    fn into_config(self) -> Result<WorkerConfig> {
        let mut config = match &self.config {
            Some(path) => WorkerConfig::load(path)?,
            None => WorkerConfig::default(),
        };

        if let Some(name) = self.name {
            config.worker_name = name;
        }
        if let Some(wallet_address) = self.wallet_address {
            config.wallet_address = wallet_address;
        }
        if let Some(core_url) = self.core_url {
            config.core_url = core_url;
        }
        if let Some(chain_gateway_url) = self.chain_gateway_url {
            config.chain_gateway_url = chain_gateway_url;
        }
        if self.token.is_some() {
            config.token = self.token;
        }
        if let Some(base_dir) = self.base_dir {
            config.base_dir = base_dir;
        }
        if let Some(period_ms) = self.period_ms {
            config.ask_for_replicate_period_ms = period_ms;
        }
        if let Some(max_executions) = self.max_executions {
            config.max_executions = max_executions;
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("replicate_worker=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .init();

    let config = Args::parse().into_config()?;

    info!("Starting Replicate Worker");
    info!("  Worker: {}", config.worker_name);
    info!("  Wallet: {}", config.wallet_address);
    info!("  Core: {}", config.core_url);
    info!("  Chain gateway: {}", config.chain_gateway_url);
    info!("  Max executions: {}", config.max_executions);

    let worker_dir = config.worker_base_dir();
    std::fs::create_dir_all(&worker_dir)
        .with_context(|| format!("Failed to create {}", worker_dir.display()))?;

    let gateway = Arc::new(ChainGatewayClient::new(ChainGatewayConfig {
        gateway_url: config.chain_gateway_url.clone(),
        timeout: config.http_timeout(),
    }));

    if let Err(e) = ensure_registered(gateway.as_ref(), &config).await {
        error!("Worker registration failed, exiting: {}", e);
        std::process::exit(REGISTRATION_FAILURE_EXIT_CODE);
    }

    let core = Arc::new(CoreClient::new(CoreClientConfig {
        core_url: config.core_url.clone(),
        token: config.token.clone(),
        timeout: config.http_timeout(),
    }));
    let images = Arc::new(DockerImageManager::new().await?);
    let results = Arc::new(FsResultStore::new(worker_dir));

    let checker = Arc::new(PreconditionChecker::new(
        images,
        config.supported_app_type.clone(),
    ));
    let executor = Arc::new(TaskExecutorService::new(
        config.wallet_address.clone(),
        gateway.clone(),
        checker,
        config.max_executions,
    ));

    let registry = Arc::new(SubscriptionRegistry::new());
    let dispatcher =
        NotificationDispatcher::new(config.wallet_address.clone(), executor.clone(), registry.clone());
    let subscriptions = Arc::new(SubscriptionService::new(registry, dispatcher));

    let recovery = AmnesiaRecovery::new(
        gateway.clone(),
        core.clone(),
        subscriptions.clone(),
        results,
    );
    let demand = Arc::new(ReplicateDemandLoop::new(
        executor,
        gateway,
        core,
        subscriptions.clone(),
        config.ask_for_replicate_period(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let running = WorkerRuntime::new(recovery, demand).start(shutdown_rx).await;
    info!(
        "Replicate Worker ready [recovered:{:?}]",
        running.recovered
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down, waiting for in-flight demand");
    let _ = shutdown_tx.send(true);
    running.join().await;
    info!(
        "Replicate Worker stopped [subscribedTasks:{:?}]",
        subscriptions.registry().snapshot()
    );

    Ok(())
}
