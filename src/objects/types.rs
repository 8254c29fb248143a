use crate::error::{ControlError, ControlResult};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Whether the object's tasks are believed to be running on a worker.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ObjectStatus {
    Stopped,
    Running,
}

impl ObjectStatus {
    /// Numeric form reported to control-plane clients.
    pub fn code(self) -> u8 {
        match self {
            ObjectStatus::Stopped => 0,
            ObjectStatus::Running => 1,
        }
    }
}

/// A managed processing object (e.g. a stream ingest) and the tasks it should run.
#[derive(Debug, Clone, Serialize)]
pub struct ManagedObject {
    pub id: i64,
    /// Object definition as supplied by the client; always carries `type`.
    pub raw_params: Value,
    pub status: ObjectStatus,
    /// Ip of the worker the object is assigned to.
    pub assigned_worker: Option<String>,
    /// Task blobs (`{ "task": name, "params": {..} }`) in insertion order.
    pub desired_tasks: Vec<Value>,
}

impl ManagedObject {
    /// Builds an object from its definition. The id must be a positive integer.
    pub fn from_blob(raw: &Value) -> ControlResult<Self> {
        let id = raw
            .get("id")
            .and_then(Value::as_i64)
            .filter(|id| *id > 0)
            .ok_or_else(|| ControlError::Malformed("get id failed".to_string()))?;

        Ok(Self {
            id,
            raw_params: raw.clone(),
            status: ObjectStatus::Stopped,
            assigned_worker: None,
            desired_tasks: Vec::new(),
        })
    }

    pub fn object_type(&self) -> Option<&str> {
        self.raw_params.get("type").and_then(Value::as_str)
    }

    pub fn name(&self) -> &str {
        self.raw_params
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    pub fn add_task(&mut self, task: Value) {
        self.desired_tasks.push(task);
    }

    /// Removes the first desired task named `name`.
    pub fn remove_task(&mut self, name: &str) -> bool {
        match self
            .desired_tasks
            .iter()
            .position(|task| task_name(task) == Some(name))
        {
            Some(idx) => {
                self.desired_tasks.remove(idx);
                true
            }
            None => false,
        }
    }

    /// First desired task; drives the algorithm/preview columns of the object listing.
    pub fn peek_task(&self) -> Option<&Value> {
        self.desired_tasks.first()
    }
}

/// Name embedded in a task blob.
pub fn task_name(task: &Value) -> Option<&str> {
    task.get("task").and_then(Value::as_str)
}

/// Preview mode requested by a task blob (`params.preview`).
pub fn task_preview(task: &Value) -> Option<&str> {
    task.get("params")
        .and_then(|params| params.get("preview"))
        .and_then(Value::as_str)
}
