//! Worker RPC Protocol
//!
//! Endpoints exposed by every worker node and the DTOs exchanged with them.
//! Worker acknowledgements wrap their payload in a `data` object; fields the
//! master does not understand are ignored.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// --- Worker Endpoints ---

/// Liveness probe. Also reports whether the worker has been initialized since it started.
pub const ENDPOINT_STATUS: &str = "/api/system/status";
/// Pushes the worker's own addressing (re-initialization after start or recovery).
pub const ENDPOINT_INIT: &str = "/api/system/init";
/// Pushes the cluster-wide output sink configuration.
pub const ENDPOINT_SET_OUTPUT: &str = "/api/system/set/output";
/// Prefix of the add-object endpoint; the object type is appended.
pub const ENDPOINT_ADD_OBJECT: &str = "/api/obj/add";
pub const ENDPOINT_DELETE_OBJECT: &str = "/api/obj/del";
/// Lists the object ids currently running on the worker.
pub const ENDPOINT_OBJECT_STATUS: &str = "/api/obj/status";
pub const ENDPOINT_START_TASK: &str = "/api/task/start";
pub const ENDPOINT_STOP_TASK: &str = "/api/task/stop";

pub fn add_object_path(object_type: &str) -> String {
    format!("{}/{}", ENDPOINT_ADD_OBJECT, object_type)
}

/// Network address of a worker's REST API.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkerAddr {
    pub ip: String,
    pub port: u16,
}

impl WorkerAddr {
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self { ip: ip.into(), port }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}:{}{}", self.ip, self.port, path)
    }
}

impl std::fmt::Display for WorkerAddr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

// --- Requests ---

/// Body of the init push.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InitRequest {
    pub ip: String,
    pub internet_ip: String,
}

/// Body of start-task and stop-task calls.
///
/// `data` is the task blob as stored in the object's desired task list
/// (`{ "task": name, "params": {..} }`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskCommand {
    pub id: i64,
    pub data: Value,
}

// --- Acknowledgements ---

#[derive(Debug, Deserialize)]
pub struct Ack<T> {
    pub data: Option<T>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusData {
    /// `0` right after the worker process started, before the master initialized it.
    pub system_init: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoadData {
    pub load: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ObjectStatusData {
    #[serde(default)]
    pub obj: Vec<ObjectIdEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ObjectIdEntry {
    pub id: Option<i64>,
}

/// Extracts `data` from an acknowledgement, falling back to the default when the
/// body does not have the expected shape.
pub fn ack_data<T: DeserializeOwned + Default>(body: &Value) -> T {
    serde_json::from_value::<Ack<T>>(body.clone())
        .ok()
        .and_then(|ack| ack.data)
        .unwrap_or_default()
}

/// Result of a status probe that got an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStatus {
    /// False when the worker restarted and has not been initialized since.
    pub initialized: bool,
}

impl WorkerStatus {
    pub fn from_ack(body: &Value) -> Self {
        let data: StatusData = ack_data(body);
        Self {
            initialized: data.system_init != Some(0),
        }
    }
}

/// Load value reported by a worker; `None` when missing or negative.
pub fn load_from_ack(body: &Value) -> Option<f64> {
    let data: LoadData = ack_data(body);
    data.load.filter(|load| *load >= 0.0)
}

/// Non-negative object ids listed by the worker's object-status endpoint.
pub fn object_ids_from_ack(body: &Value) -> Vec<i64> {
    let data: ObjectStatusData = ack_data(body);
    data.obj
        .into_iter()
        .filter_map(|entry| entry.id)
        .filter(|id| *id >= 0)
        .collect()
}

/// Failure described by an answer whose `code` is a non-zero integer.
///
/// Answers without a `code` are accepted; not every worker endpoint sets one.
pub fn rejection_from_ack(body: &Value) -> Option<String> {
    let code = body.get("code").and_then(Value::as_i64)?;
    if code == 0 {
        return None;
    }
    let msg = body.get("msg").and_then(Value::as_str).unwrap_or("");
    Some(format!("code {}: {}", code, msg))
}
