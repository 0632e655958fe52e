//! Blockchain integration
//!
//! Typed projections of on-chain records plus the client seams used to
//! read them. All chain access goes through a chain gateway over HTTP.

pub mod bytes32;
pub mod client;
pub mod gateway;
pub mod task;
pub mod work_order;
pub mod worker;

use thiserror::Error;

pub use client::{ChainClient, WorkerRegistration, WorkerRegistry};
pub use gateway::{ChainGatewayClient, ChainGatewayConfig};
pub use task::{AppType, ChainTaskStatus, TaskDescription};
pub use work_order::{WorkOrder, WorkOrderParams};
pub use worker::{RawWorkerTuple, WorkerRecord, WorkerStatus, WorkerType};

/// Failure to map raw chain data into a typed record
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainModelError {
    #[error("Unknown {kind} ordinal: {ordinal}")]
    UnknownEnumOrdinal { kind: &'static str, ordinal: u64 },
    #[error("Invalid bytes32 value: {0}")]
    InvalidBytes32(String),
}
