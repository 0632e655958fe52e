//! Startup registration in the on-chain worker registry.

use crate::chain::bytes32::string_to_bytes32;
use crate::chain::{
    ChainModelError, WorkerRecord, WorkerRegistration, WorkerRegistry, WorkerStatus, WorkerType,
};
use crate::config::WorkerConfig;
use crate::http::ClientError;
use thiserror::Error;
use tracing::info;

/// Fatal at startup. The binary exits with status 2.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("Worker {worker_id} is not allowed to work (status {status:?})")]
    Unusable {
        worker_id: String,
        status: WorkerStatus,
    },
    #[error("Worker registry lookup failed: {0}")]
    Lookup(#[source] ClientError),
    #[error("Worker registration failed: {0}")]
    Register(#[source] ClientError),
    #[error("Invalid registration field: {0}")]
    Encoding(#[from] ChainModelError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    AlreadyRegistered(WorkerRecord),
    Registered,
}

pub async fn ensure_registered(
    registry: &dyn WorkerRegistry,
    config: &WorkerConfig,
) -> Result<RegistrationOutcome, RegistrationError> {
    let worker_id = &config.wallet_address;

    if let Some(record) = registry
        .retrieve_worker(worker_id)
        .await
        .map_err(RegistrationError::Lookup)?
    {
        if !record.is_usable() {
            return Err(RegistrationError::Unusable {
                worker_id: worker_id.clone(),
                status: record.status,
            });
        }
        info!(
            "Worker already registered [workerId:{}, status:{:?}, type:{}]",
            worker_id, record.status, record.worker_type
        );
        return Ok(RegistrationOutcome::AlreadyRegistered(record));
    }

    let registration = WorkerRegistration {
        worker_id: worker_id.clone(),
        worker_type: WorkerType::TeeSgx,
        organization_id: string_to_bytes32(&config.organization_id)?,
        application_type_ids: config
            .application_type_ids
            .iter()
            .map(|id| string_to_bytes32(id))
            .collect::<Result<Vec<_>, _>>()?,
        details: config.details.clone(),
    };

    registry
        .register_worker(&registration)
        .await
        .map_err(RegistrationError::Register)?;

    info!(
        "Worker registered [workerId:{}, type:{}]",
        worker_id, registration.worker_type
    );
    Ok(RegistrationOutcome::Registered)
}
