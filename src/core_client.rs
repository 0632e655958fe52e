//! Core (scheduler backend) client
//!
//! The core hands out replicates and remembers which notifications a worker
//! missed while it was offline. Both queries are bounded by the last block
//! the worker has seen so the core never offers work on chain state the
//! worker cannot verify yet.

use crate::http::{self, ClientError};
use crate::notification::{ContributionAuthorization, TaskNotification};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Replicate offers and missed notifications
#[async_trait]
pub trait ReplicateBackend: Send + Sync {
    /// `None` when nothing is offered
    async fn available_replicate(
        &self,
        last_block: u64,
    ) -> Result<Option<ContributionAuthorization>, ClientError>;

    /// Empty when nothing was missed
    async fn missed_notifications(
        &self,
        last_block: u64,
    ) -> Result<Vec<TaskNotification>, ClientError>;
}

#[derive(Debug, Clone)]
pub struct CoreClientConfig {
    pub core_url: String,
    pub token: Option<String>,
    pub timeout: Duration,
}

impl Default for CoreClientConfig {
    fn default() -> Self {
        Self {
            core_url: "http://localhost:13000".to_string(),
            token: None,
            timeout: Duration::from_secs(10),
        }
    }
}

pub struct CoreClient {
    core_url: String,
    token: Option<String>,
    http_client: reqwest::Client,
}

impl CoreClient {
    pub fn new(config: CoreClientConfig) -> Self {
        Self {
            core_url: config.core_url.trim_end_matches('/').to_string(),
            token: config.token,
            http_client: http::build_client(config.timeout),
        }
    }

    fn get(&self, url: &str, last_block: u64) -> reqwest::RequestBuilder {
        let request = self
            .http_client
            .get(url)
            .query(&[("blockNumber", last_block)]);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl ReplicateBackend for CoreClient {
    async fn available_replicate(
        &self,
        last_block: u64,
    ) -> Result<Option<ContributionAuthorization>, ClientError> {
        let url = format!("{}/replicates/available", self.core_url);
        let offer: Option<ContributionAuthorization> =
            http::send_optional_json(self.get(&url, last_block), &url).await?;

        if let Some(auth) = &offer {
            debug!("Core offered replicate [chainTaskId:{}]", auth.chain_task_id);
        }
        Ok(offer)
    }

    async fn missed_notifications(
        &self,
        last_block: u64,
    ) -> Result<Vec<TaskNotification>, ClientError> {
        let url = format!("{}/replicates/interrupted", self.core_url);
        let missed: Option<Vec<TaskNotification>> =
            http::send_optional_json(self.get(&url, last_block), &url).await?;
        Ok(missed.unwrap_or_default())
    }
}
