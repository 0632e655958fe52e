//! Shared HTTP plumbing for the core and chain gateway clients.

use crate::chain::ChainModelError;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;

/// Failure talking to a remote collaborator
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("Request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("Failed to parse response from {url}: {reason}")]
    Decode { url: String, reason: String },
    #[error("Invalid chain data: {0}")]
    Chain(#[from] ChainModelError),
}

impl ClientError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport { source, .. } if source.is_timeout())
    }
}

/// Build a client with a per-request timeout
pub fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

/// Send a request and decode a JSON body.
///
/// `404`, `204` and an empty `200` body all mean "absent", which is not
/// an error.
pub async fn send_optional_json<T: DeserializeOwned>(
    request: RequestBuilder,
    url: &str,
) -> Result<Option<T>, ClientError> {
    let response = request.send().await.map_err(|source| ClientError::Transport {
        url: url.to_string(),
        source,
    })?;

    let status = response.status();
    if status == StatusCode::NOT_FOUND || status == StatusCode::NO_CONTENT {
        return Ok(None);
    }
    if !status.is_success() {
        return Err(ClientError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let body = response
        .bytes()
        .await
        .map_err(|source| ClientError::Transport {
            url: url.to_string(),
            source,
        })?;

    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    serde_json::from_slice(&body)
        .map(Some)
        .map_err(|e| ClientError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })
}

/// Like [`send_optional_json`] but absence is an error.
pub async fn send_json<T: DeserializeOwned>(
    request: RequestBuilder,
    url: &str,
) -> Result<T, ClientError> {
    send_optional_json(request, url)
        .await?
        .ok_or_else(|| ClientError::Decode {
            url: url.to_string(),
            reason: "empty response".to_string(),
        })
}

/// Send a request whose response body is irrelevant.
pub async fn send_expect_success(request: RequestBuilder, url: &str) -> Result<(), ClientError> {
    let response = request.send().await.map_err(|source| ClientError::Transport {
        url: url.to_string(),
        source,
    })?;

    if !response.status().is_success() {
        return Err(ClientError::Status {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }
    Ok(())
}
