//! Work orders handed to the execution pipeline.

use super::task::{AppType, TaskDescription};
use serde::{Deserialize, Serialize};

const WORK_ORDER_ID_ENV: &str = "WORK_ORDER_ID";
const WORKER_ID_ENV: &str = "WORKER_ID";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkOrderParams {
    pub app_uri: String,
    pub app_type: AppType,
    #[serde(default)]
    pub cmd: Option<String>,
    pub max_execution_time_ms: u64,
}

/// A unit of work offered to this worker. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkOrder {
    pub work_order_id: String,
    pub requester_id: String,
    pub worker_id: String,
    pub params: WorkOrderParams,
}

impl WorkOrder {
    pub fn from_task_description(description: &TaskDescription, worker_id: &str) -> Self {
        Self {
            work_order_id: description.chain_task_id.clone(),
            requester_id: description.requester.clone(),
            worker_id: worker_id.to_string(),
            params: WorkOrderParams {
                app_uri: description.app_uri.clone(),
                app_type: description.app_type.clone(),
                cmd: description.cmd.clone(),
                max_execution_time_ms: description.max_execution_time,
            },
        }
    }

    /// Environment exposed to the application container
    pub fn container_env(&self) -> Vec<String> {
        vec![
            format!("{}={}", WORK_ORDER_ID_ENV, self.work_order_id),
            format!("{}={}", WORKER_ID_ENV, self.worker_id),
        ]
    }
}
