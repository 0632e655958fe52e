//! Worker registry records
//!
//! The registry returns workers as a raw tuple of ordinals and `bytes32`
//! values. Ordinals are resolved through explicit lookups: an ordinal the
//! worker does not know about is an error, never a default.

use super::bytes32::bytes32_to_string;
use super::ChainModelError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Worker status, in on-chain declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerStatus {
    Null,
    Active,
    Offline,
    Decommissioned,
    Compromised,
}

impl WorkerStatus {
    pub fn from_ordinal(ordinal: u64) -> Result<Self, ChainModelError> {
        match ordinal {
            0 => Ok(Self::Null),
            1 => Ok(Self::Active),
            2 => Ok(Self::Offline),
            3 => Ok(Self::Decommissioned),
            4 => Ok(Self::Compromised),
            _ => Err(ChainModelError::UnknownEnumOrdinal {
                kind: "worker status",
                ordinal,
            }),
        }
    }

    pub fn ordinal(self) -> u64 {
        match self {
            Self::Null => 0,
            Self::Active => 1,
            Self::Offline => 2,
            Self::Decommissioned => 3,
            Self::Compromised => 4,
        }
    }
}

/// Worker type, in on-chain declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkerType {
    #[serde(rename = "NULL")]
    Null,
    #[serde(rename = "TEE_SGX")]
    TeeSgx,
    #[serde(rename = "MPC")]
    Mpc,
    #[serde(rename = "ZK")]
    Zk,
}

impl WorkerType {
    pub fn from_ordinal(ordinal: u64) -> Result<Self, ChainModelError> {
        match ordinal {
            0 => Ok(Self::Null),
            1 => Ok(Self::TeeSgx),
            2 => Ok(Self::Mpc),
            3 => Ok(Self::Zk),
            _ => Err(ChainModelError::UnknownEnumOrdinal {
                kind: "worker type",
                ordinal,
            }),
        }
    }

    pub fn ordinal(self) -> u64 {
        match self {
            Self::Null => 0,
            Self::TeeSgx => 1,
            Self::Mpc => 2,
            Self::Zk => 3,
        }
    }
}

impl fmt::Display for WorkerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "NULL",
            Self::TeeSgx => "TEE_SGX",
            Self::Mpc => "MPC",
            Self::Zk => "ZK",
        };
        f.write_str(name)
    }
}

/// Registry lookup result exactly as the gateway relays it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawWorkerTuple {
    pub worker_id: String,
    pub status: u64,
    pub worker_type: u64,
    /// `bytes32` hex
    pub organization_id: String,
    /// `bytes32[]` hex
    #[serde(default)]
    pub application_type_ids: Vec<String>,
    #[serde(default)]
    pub details: String,
}

/// A worker as known on-chain. Rebuilt on every query, never patched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerRecord {
    pub worker_id: String,
    pub status: WorkerStatus,
    pub worker_type: WorkerType,
    pub organization_id: String,
    pub application_type_ids: Vec<String>,
    pub details: String,
}

impl WorkerRecord {
    pub fn from_chain_tuple(
        worker_id: &str,
        status: u64,
        worker_type: u64,
        raw_organization_id: &str,
        raw_application_type_ids: &[String],
        details: &str,
    ) -> Result<Self, ChainModelError> {
        let status = WorkerStatus::from_ordinal(status)?;
        let worker_type = WorkerType::from_ordinal(worker_type)?;
        let organization_id = bytes32_to_string(raw_organization_id)?;
        let application_type_ids = raw_application_type_ids
            .iter()
            .map(|raw| bytes32_to_string(raw))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            worker_id: worker_id.to_string(),
            status,
            worker_type,
            organization_id,
            application_type_ids,
            details: details.to_string(),
        })
    }

    /// Whether the registry still allows this worker to take work
    pub fn is_usable(&self) -> bool {
        !matches!(
            self.status,
            WorkerStatus::Decommissioned | WorkerStatus::Compromised
        )
    }
}

impl TryFrom<RawWorkerTuple> for WorkerRecord {
    type Error = ChainModelError;

    fn try_from(raw: RawWorkerTuple) -> Result<Self, Self::Error> {
        Self::from_chain_tuple(
            &raw.worker_id,
            raw.status,
            raw.worker_type,
            &raw.organization_id,
            &raw.application_type_ids,
            &raw.details,
        )
    }
}
