//! Chain gateway client
//!
//! Reads chain state through the gateway REST API instead of talking to a
//! node directly:
//!
//! - `GET  /api/v1/chain/block`                    latest block
//! - `GET  /api/v1/chain/tasks/{id}`               task stage
//! - `GET  /api/v1/chain/tasks/{id}/description`   task description
//! - `GET  /api/v1/chain/workers/{address}`        registry tuple
//! - `POST /api/v1/chain/workers`                  registration

use super::client::{ChainClient, WorkerRegistration, WorkerRegistry};
use super::task::{ChainTaskStatus, TaskDescription};
use super::worker::{RawWorkerTuple, WorkerRecord};
use crate::http::{self, ClientError};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ChainGatewayConfig {
    pub gateway_url: String,
    pub timeout: Duration,
}

impl Default for ChainGatewayConfig {
    fn default() -> Self {
        Self {
            gateway_url: "http://localhost:8545".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockResponse {
    block_number: u64,
}

#[derive(Debug, Deserialize)]
struct TaskStatusResponse {
    status: ChainTaskStatus,
}

pub struct ChainGatewayClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl ChainGatewayClient {
    pub fn new(config: ChainGatewayConfig) -> Self {
        Self {
            base_url: config.gateway_url.trim_end_matches('/').to_string(),
            http_client: http::build_client(config.timeout),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/chain{}", self.base_url, path)
    }
}

#[async_trait]
impl ChainClient for ChainGatewayClient {
    async fn latest_block_number(&self) -> Result<u64, ClientError> {
        let url = self.url("/block");
        let block: BlockResponse = http::send_json(self.http_client.get(&url), &url).await?;
        debug!("Latest block from gateway: {}", block.block_number);
        Ok(block.block_number)
    }

    async fn is_task_initialized(&self, chain_task_id: &str) -> Result<bool, ClientError> {
        let url = self.url(&format!("/tasks/{}", chain_task_id));
        let task: Option<TaskStatusResponse> =
            http::send_optional_json(self.http_client.get(&url), &url).await?;
        Ok(task.map(|t| t.status.is_initialized()).unwrap_or(false))
    }

    async fn task_description(
        &self,
        chain_task_id: &str,
    ) -> Result<Option<TaskDescription>, ClientError> {
        let url = self.url(&format!("/tasks/{}/description", chain_task_id));
        http::send_optional_json(self.http_client.get(&url), &url).await
    }
}

#[async_trait]
impl WorkerRegistry for ChainGatewayClient {
    async fn retrieve_worker(&self, worker_id: &str) -> Result<Option<WorkerRecord>, ClientError> {
        let url = self.url(&format!("/workers/{}", worker_id));
        let raw: Option<RawWorkerTuple> =
            http::send_optional_json(self.http_client.get(&url), &url).await?;

        match raw {
            Some(raw) => Ok(Some(WorkerRecord::try_from(raw)?)),
            None => Ok(None),
        }
    }

    async fn register_worker(&self, registration: &WorkerRegistration) -> Result<(), ClientError> {
        let url = self.url("/workers");
        http::send_expect_success(self.http_client.post(&url).json(registration), &url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::bytes32::string_to_bytes32;
    use crate::chain::worker::{WorkerStatus, WorkerType};
    use httpmock::prelude::*;

    fn client_for(server: &MockServer) -> ChainGatewayClient {
        ChainGatewayClient::new(ChainGatewayConfig {
            gateway_url: server.base_url(),
            timeout: Duration::from_secs(2),
        })
    }

    #[tokio::test]
    async fn test_latest_block_number() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/chain/block");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"blockNumber": 100}"#);
        });

        assert_eq!(client_for(&server).latest_block_number().await.unwrap(), 100);
    }

    #[tokio::test]
    async fn test_latest_block_server_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/chain/block");
            then.status(503);
        });

        let err = client_for(&server).latest_block_number().await.unwrap_err();
        assert!(matches!(err, ClientError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_task_initialization_stages() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/chain/tasks/0xactive");
            then.status(200).body(r#"{"status": "ACTIVE"}"#);
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/chain/tasks/0xunset");
            then.status(200).body(r#"{"status": "UNSET"}"#);
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/chain/tasks/0xmissing");
            then.status(404);
        });

        let client = client_for(&server);
        assert!(client.is_task_initialized("0xactive").await.unwrap());
        assert!(!client.is_task_initialized("0xunset").await.unwrap());
        assert!(!client.is_task_initialized("0xmissing").await.unwrap());
    }

    #[tokio::test]
    async fn test_task_description_absent_on_404() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/chain/tasks/0xabc/description");
            then.status(404);
        });

        let desc = client_for(&server).task_description("0xabc").await.unwrap();
        assert!(desc.is_none());
    }

    #[tokio::test]
    async fn test_retrieve_worker_maps_tuple() {
        let server = MockServer::start();
        let body = serde_json::json!({
            "workerId": "0xw",
            "status": 1,
            "workerType": 1,
            "organizationId": string_to_bytes32("acme").unwrap(),
            "applicationTypeIds": [string_to_bytes32("docker").unwrap()],
            "details": "",
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/chain/workers/0xw");
            then.status(200).json_body(body);
        });

        let record = client_for(&server).retrieve_worker("0xw").await.unwrap().unwrap();
        assert_eq!(record.status, WorkerStatus::Active);
        assert_eq!(record.worker_type, WorkerType::TeeSgx);
        assert_eq!(record.application_type_ids, vec!["docker"]);
    }

    #[tokio::test]
    async fn test_retrieve_worker_with_unknown_ordinal_fails() {
        let server = MockServer::start();
        let body = serde_json::json!({
            "workerId": "0xw",
            "status": 9,
            "workerType": 1,
            "organizationId": string_to_bytes32("acme").unwrap(),
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/v1/chain/workers/0xw");
            then.status(200).json_body(body);
        });

        let err = client_for(&server).retrieve_worker("0xw").await.unwrap_err();
        assert!(matches!(err, ClientError::Chain(_)));
    }

    #[tokio::test]
    async fn test_register_worker_posts_payload() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/v1/chain/workers")
                .json_body_partial(r#"{"workerId": "0xw", "workerType": "TEE_SGX"}"#);
            then.status(200);
        });

        let registration = WorkerRegistration {
            worker_id: "0xw".to_string(),
            worker_type: WorkerType::TeeSgx,
            organization_id: string_to_bytes32("acme").unwrap(),
            application_type_ids: vec![],
            details: String::new(),
        };

        client_for(&server).register_worker(&registration).await.unwrap();
        mock.assert();
    }
}
