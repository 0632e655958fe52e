//! Docker image management for application containers

use async_trait::async_trait;
use bollard::image::CreateImageOptions;
use bollard::Docker;
use futures::StreamExt;
use tracing::{debug, error, info};

/// Image pull and lookup. Boolean results, no partial states.
#[async_trait]
pub trait ImageManager: Send + Sync {
    async fn pull_image(&self, chain_task_id: &str, image_uri: &str) -> bool;

    async fn image_present(&self, image_uri: &str) -> bool;
}

pub struct DockerImageManager {
    docker: Docker,
}

impl DockerImageManager {
    /// Connect to the local Docker daemon
    pub async fn new() -> anyhow::Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| anyhow::anyhow!("Failed to connect to Docker: {}", e))?;

        // Verify connection
        docker
            .ping()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to ping Docker: {}", e))?;

        info!("Connected to Docker daemon");
        Ok(Self { docker })
    }
}

#[async_trait]
impl ImageManager for DockerImageManager {
    async fn pull_image(&self, chain_task_id: &str, image_uri: &str) -> bool {
        info!(
            "Image pull started [chainTaskId:{}, image:{}]",
            chain_task_id, image_uri
        );

        let options = CreateImageOptions {
            from_image: image_uri,
            ..Default::default()
        };

        let mut stream = self.docker.create_image(Some(options), None, None);
        while let Some(result) = stream.next().await {
            match result {
                Ok(info) => {
                    if let Some(status) = info.status {
                        debug!("Pull status: {}", status);
                    }
                }
                Err(e) => {
                    error!(
                        "Image pull failed [chainTaskId:{}, image:{}, error:{}]",
                        chain_task_id, image_uri, e
                    );
                    return false;
                }
            }
        }

        info!(
            "Image pull completed [chainTaskId:{}, image:{}]",
            chain_task_id, image_uri
        );
        true
    }

    async fn image_present(&self, image_uri: &str) -> bool {
        match self.docker.inspect_image(image_uri).await {
            Ok(image) => image.id.map(|id| !id.is_empty()).unwrap_or(false),
            Err(e) => {
                debug!("Image not resolvable [image:{}, error:{}]", image_uri, e);
                false
            }
        }
    }
}
