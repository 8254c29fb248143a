use crate::error::{ControlError, ControlResult};
use crate::rpc::protocol::WorkerAddr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Liveness of a worker as seen by the master.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Liveness {
    Alive,
    Dead,
}

/// Fields the master reads out of a worker registration payload.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkerRegistration {
    pub ip: Option<String>,
    pub rest_port: Option<i64>,
    pub internet_ip: Option<String>,
}

/// A worker ("slave") node.
///
/// Keyed by `ip`. Objects refer to a worker by its ip, never by holding the
/// worker itself, so severing an assignment is clearing an identifier.
#[derive(Debug, Clone, Serialize)]
pub struct Worker {
    pub ip: String,
    /// Externally routable address, used for preview URLs when present.
    pub internet_ip: Option<String>,
    pub rest_port: u16,
    pub liveness: Liveness,
    /// Consecutive failed health probes since the last success.
    pub offline_count: u32,
    /// Health cycles skipped since the last probe (backoff bookkeeping).
    pub skipped_cycles: u32,
    /// Last load the worker reported.
    pub total_load: f64,
    /// Objects this worker runs: imported from the worker at registration and
    /// kept in sync with assignments made by the master.
    pub assigned_object_ids: BTreeSet<i64>,
    /// Registration payload as received, kept for persistence and listing.
    pub raw_params: Value,
}

impl Worker {
    /// Builds a worker from its registration payload.
    ///
    /// A new worker starts dead until its first probe answers.
    pub fn from_registration(raw: &Value) -> ControlResult<Self> {
        let reg: WorkerRegistration = serde_json::from_value(raw.clone())
            .map_err(|e| ControlError::Malformed(format!("invalid worker registration: {}", e)))?;

        let ip = reg
            .ip
            .filter(|ip| !ip.is_empty())
            .ok_or_else(|| ControlError::Malformed("get ip failed".to_string()))?;

        let rest_port = reg
            .rest_port
            .and_then(|port| u16::try_from(port).ok())
            .ok_or_else(|| ControlError::Malformed(format!("get rest_port failed for {}", ip)))?;

        Ok(Self {
            ip,
            internet_ip: reg.internet_ip.filter(|addr| !addr.is_empty()),
            rest_port,
            liveness: Liveness::Dead,
            offline_count: 0,
            skipped_cycles: 0,
            total_load: 0.0,
            assigned_object_ids: BTreeSet::new(),
            raw_params: raw.clone(),
        })
    }

    pub fn addr(&self) -> WorkerAddr {
        WorkerAddr::new(self.ip.clone(), self.rest_port)
    }

    pub fn is_alive(&self) -> bool {
        self.liveness == Liveness::Alive
    }

    /// Only alive workers below the load ceiling take new objects.
    pub fn is_eligible(&self, load_max: f64) -> bool {
        self.is_alive() && self.total_load < load_max
    }

    pub fn name(&self) -> &str {
        self.raw_params
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    /// Address clients should use to reach this worker.
    pub fn public_ip(&self) -> &str {
        self.internet_ip.as_deref().unwrap_or(&self.ip)
    }
}
