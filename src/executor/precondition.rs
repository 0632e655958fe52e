//! Execution preconditions
//!
//! Checked before any execution resource is committed to a work order.
//! Pulling an image and resolving it afterwards are separate checks: a
//! pull can succeed against one tag while the executor later resolves a
//! different reference.

use super::TaskExecutionError;
use crate::chain::{AppType, WorkOrder};
use crate::docker::ImageManager;
use std::sync::Arc;
use tracing::{error, info};

pub struct PreconditionChecker {
    image_manager: Arc<dyn ImageManager>,
    supported_app_type: AppType,
}

impl PreconditionChecker {
    pub fn new(image_manager: Arc<dyn ImageManager>, supported_app_type: AppType) -> Self {
        Self {
            image_manager,
            supported_app_type,
        }
    }

    pub fn check_app_type(
        &self,
        work_order_id: &str,
        declared: &AppType,
    ) -> Result<(), TaskExecutionError> {
        if *declared == self.supported_app_type {
            return Ok(());
        }

        let err = TaskExecutionError::UnsupportedAppType {
            chain_task_id: work_order_id.to_string(),
            expected: self.supported_app_type.clone(),
            declared: declared.clone(),
        };
        error!("{}", err);
        Err(err)
    }

    /// Fetch the application image declared by the work order
    pub async fn ensure_app_available(&self, work_order: &WorkOrder) -> Result<(), TaskExecutionError> {
        let image_uri = &work_order.params.app_uri;
        info!(
            "Downloading container image [workOrderId:{}, imageUri:{}]",
            work_order.work_order_id, image_uri
        );

        if self
            .image_manager
            .pull_image(&work_order.work_order_id, image_uri)
            .await
        {
            return Ok(());
        }

        let err = TaskExecutionError::ImagePullFailed {
            chain_task_id: work_order.work_order_id.clone(),
            image_uri: image_uri.clone(),
        };
        error!("{}", err);
        Err(err)
    }

    /// Confirm the image resolves by the reference the executor will use
    pub async fn check_image_present(
        &self,
        work_order_id: &str,
        image_uri: &str,
    ) -> Result<(), TaskExecutionError> {
        if self.image_manager.image_present(image_uri).await {
            return Ok(());
        }

        let err = TaskExecutionError::ImageNotFound {
            chain_task_id: work_order_id.to_string(),
            image_uri: image_uri.to_string(),
        };
        error!("{}", err);
        Err(err)
    }

    /// All checks, in order
    pub async fn check(&self, work_order: &WorkOrder) -> Result<(), TaskExecutionError> {
        self.check_app_type(&work_order.work_order_id, &work_order.params.app_type)?;
        self.ensure_app_available(work_order).await?;
        self.check_image_present(&work_order.work_order_id, &work_order.params.app_uri)
            .await
    }
}
