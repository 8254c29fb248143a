//! Control-Plane Protocol
//!
//! Routes served by the master and the DTOs exchanged with operators.
//!
//! Every answer is wrapped in the `{code, msg, data}` envelope: `code` is `0`
//! on success and `-1` on failure, with the failure described in `msg`. The
//! HTTP status code carries the error class.

use crate::error::ControlError;
use crate::objects::types::{ManagedObject, task_name, task_preview};
use crate::slaves::types::Worker;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// --- API Endpoints ---

pub const ROUTE_LOGIN: &str = "/api/system/login";
pub const ROUTE_LOGOUT: &str = "/api/system/logout";
/// Replaces the cluster-wide output sink and pushes it to every alive worker.
pub const ROUTE_SET_OUTPUT: &str = "/api/system/set/output";
pub const ROUTE_SYSTEM_INFO: &str = "/api/system/get/info";
pub const ROUTE_SLAVE_ADD: &str = "/api/system/slave/add";
pub const ROUTE_SLAVE_DEL: &str = "/api/system/slave/del";
pub const ROUTE_SLAVE_STATUS: &str = "/api/system/slave/status";
/// Adds an object; the path segment becomes the object's `type`.
pub const ROUTE_OBJECT_ADD: &str = "/api/obj/add/:type";
pub const ROUTE_OBJECT_DEL: &str = "/api/obj/del";
/// Paginated object listing (`offset`, `limit`, optional `type`).
pub const ROUTE_OBJECT_STATUS: &str = "/api/obj/status";
pub const ROUTE_TASK_START: &str = "/api/task/start";
pub const ROUTE_TASK_STOP: &str = "/api/task/stop";
/// Static catalog of tasks workers can run.
pub const ROUTE_TASK_SUPPORT: &str = "/api/task/support";

/// Page size of the object listing when `limit` is not given.
pub const DEFAULT_PAGE_LIMIT: usize = 20;

// --- Envelope ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiResponse {
    pub code: i32,
    pub msg: String,
    pub data: Value,
}

impl ApiResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            code: 0,
            msg: "success".to_string(),
            data,
        }
    }

    pub fn from_error(err: &ControlError) -> Self {
        Self {
            code: -1,
            msg: err.to_string(),
            data: Value::Null,
        }
    }
}

// --- Requests ---

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SlaveIpRequest {
    pub ip: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ObjectIdRequest {
    pub id: Option<i64>,
}

/// Start/stop task body: `{ "id": .., "data": { "task": name, "params": {..} } }`.
#[derive(Debug, Deserialize)]
pub struct TaskRequest {
    pub id: Option<i64>,
    pub data: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ObjectStatusQuery {
    pub offset: Option<usize>,
    pub limit: Option<usize>,
    #[serde(rename = "type")]
    pub object_type: Option<String>,
}

// --- Views ---

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerView {
    pub name: String,
    pub ip: String,
    pub port: u16,
    pub internet_ip: String,
    /// `1` alive, `0` dead.
    pub status: u8,
    pub load: f64,
    pub obj_num: usize,
}

impl From<&Worker> for WorkerView {
    fn from(worker: &Worker) -> Self {
        Self {
            name: worker.name().to_string(),
            ip: worker.ip.clone(),
            port: worker.rest_port,
            internet_ip: worker.internet_ip.clone().unwrap_or_default(),
            status: u8::from(worker.is_alive()),
            load: worker.total_load,
            obj_num: worker.assigned_object_ids.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObjectView {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub object_type: String,
    /// Name of the first desired task, or `none`.
    pub alg: String,
    /// Preview mode of the first desired task, or `none`.
    pub preview: String,
    /// `1` running, `0` stopped.
    pub status: u8,
    pub worker: Option<String>,
    pub preview_url: Option<String>,
}

impl ObjectView {
    /// `worker` is the object's assigned worker, if it is still registered.
    pub fn new(object: &ManagedObject, worker: Option<&Worker>, preview_port: u16) -> Self {
        let first = object.peek_task();
        let alg = first.and_then(task_name).unwrap_or("none").to_string();
        let preview = first.and_then(task_preview).unwrap_or("none").to_string();
        let preview_url =
            worker.map(|w| preview_url(&preview, w.public_ip(), preview_port, object.id));

        Self {
            id: object.id,
            name: object.name().to_string(),
            object_type: object.object_type().unwrap_or("").to_string(),
            alg,
            preview,
            status: object.status.code(),
            worker: object.assigned_worker.clone(),
            preview_url,
        }
    }
}

/// Where a client can watch the object's output stream.
pub fn preview_url(mode: &str, host: &str, port: u16, id: i64) -> String {
    if mode == "http-flv" {
        format!(
            "http://{}:{}/live?port=1935&app=myapp&stream=stream{}",
            host, port, id
        )
    } else {
        format!("http://{}:{}/m3u8/stream{}/play.m3u8", host, port, id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogEntry {
    pub name: String,
    pub disabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemInfo {
    pub name: String,
    pub version: String,
    /// Summary of the output sink; absent until one is configured.
    pub output: Option<Value>,
}
