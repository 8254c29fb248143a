//! Control-plane error taxonomy.
//!
//! Background loops only log; every synchronous control-plane operation returns
//! one of these variants so the HTTP layer can turn it into a status code and a
//! human-readable message.

use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControlError {
    /// Missing or invalid id, type, or other required field.
    #[error("{0}")]
    Malformed(String),

    /// Unknown worker ip or object id.
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Duplicate(String),

    #[error("username/password is error")]
    Unauthorized,

    /// The load balancer found no worker that is alive and below the load ceiling.
    #[error("no eligible worker for object {0}")]
    NoEligibleWorker(i64),

    /// The object has no assigned worker, or that worker is not alive.
    #[error("object {0} has no live worker")]
    NotAssigned(i64),

    /// RPC timed out or the connection was refused.
    #[error("worker {ip} unreachable: {reason}")]
    WorkerUnreachable { ip: String, reason: String },

    /// The worker answered, but the answer describes a failure.
    #[error("worker {ip} rejected request: {reason}")]
    WorkerRejected { ip: String, reason: String },

    #[error("persistence failure: {0}")]
    Persistence(#[from] anyhow::Error),
}

impl ControlError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ControlError::Malformed(_) => StatusCode::BAD_REQUEST,
            ControlError::NotFound(_) => StatusCode::NOT_FOUND,
            ControlError::Duplicate(_) => StatusCode::CONFLICT,
            ControlError::Unauthorized => StatusCode::UNAUTHORIZED,
            ControlError::NotAssigned(_) => StatusCode::SERVICE_UNAVAILABLE,
            ControlError::NoEligibleWorker(_)
            | ControlError::WorkerUnreachable { .. }
            | ControlError::WorkerRejected { .. } => StatusCode::BAD_GATEWAY,
            ControlError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type ControlResult<T> = std::result::Result<T, ControlError>;
