use crate::error::{ControlError, ControlResult};
use crate::slaves::types::Worker;

/// Outcome of an assignment attempt that succeeded.
#[derive(Debug, Clone)]
pub enum Assignment {
    /// Another caller placed the object on a live worker while this one waited.
    Existing(Worker),
    /// The object was just added to this worker.
    Assigned(Worker),
}

impl Assignment {
    pub fn worker(&self) -> &Worker {
        match self {
            Assignment::Existing(worker) | Assignment::Assigned(worker) => worker,
        }
    }
}

/// What happened on the wire for a start/stop task request.
///
/// The desired task list is updated in every case.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskDispatch {
    Sent { worker_ip: String },
    /// No live worker right now; the reconciler takes it from here.
    Deferred { reason: String },
    /// The assigned worker did not answer.
    Unreachable { ip: String, reason: String },
}

impl TaskDispatch {
    /// Control-plane view: an unreachable worker is a failure, a deferral is not.
    pub fn into_result(self) -> ControlResult<TaskDispatch> {
        match self {
            TaskDispatch::Unreachable { ip, reason } => {
                Err(ControlError::WorkerUnreachable { ip, reason })
            }
            other => Ok(other),
        }
    }
}
