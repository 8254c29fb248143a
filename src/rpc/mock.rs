//! Scripted in-process worker transport for tests.
//!
//! Every call is recorded. A `(ip, path)` pair without a scripted reply behaves
//! like an unreachable worker.

use super::client::WorkerRpc;
use super::protocol::*;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone)]
pub struct RpcCall {
    pub method: Method,
    pub ip: String,
    pub path: String,
    pub body: Option<Value>,
    pub timeout: Duration,
}

#[derive(Clone, Default)]
pub struct MockWorkerRpc {
    replies: Arc<Mutex<HashMap<(String, String), Value>>>,
    delays: Arc<Mutex<HashMap<(String, String), Duration>>>,
    calls: Arc<Mutex<Vec<RpcCall>>>,
}

impl MockWorkerRpc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_reply(&self, ip: &str, path: &str, body: Value) {
        self.replies
            .lock()
            .insert((ip.to_string(), path.to_string()), body);
    }

    pub fn set_unreachable(&self, ip: &str, path: &str) {
        self.replies.lock().remove(&(ip.to_string(), path.to_string()));
    }

    /// Holds every answer from `(ip, path)` back for `delay`.
    pub fn set_delay(&self, ip: &str, path: &str, delay: Duration) {
        self.delays
            .lock()
            .insert((ip.to_string(), path.to_string()), delay);
    }

    /// Scripts every worker endpoint for `ip` as a healthy, initialized worker.
    pub fn worker_up(&self, ip: &str, load: f64) {
        self.set_reply(ip, ENDPOINT_STATUS, json!({"code": 0, "data": {"system_init": 1}}));
        self.set_reply(ip, ENDPOINT_INIT, json!({"code": 0}));
        self.set_reply(ip, ENDPOINT_SET_OUTPUT, json!({"code": 0}));
        self.set_reply(ip, &add_object_path("rtsp"), json!({"code": 0, "data": {"load": load}}));
        self.set_reply(ip, ENDPOINT_DELETE_OBJECT, json!({"code": 0, "data": {"load": load}}));
        self.set_reply(ip, ENDPOINT_START_TASK, json!({"code": 0}));
        self.set_reply(ip, ENDPOINT_STOP_TASK, json!({"code": 0}));
        self.set_reply(ip, ENDPOINT_OBJECT_STATUS, json!({"code": 0, "data": {"obj": []}}));
    }

    /// Removes every scripted reply for `ip`.
    pub fn worker_down(&self, ip: &str) {
        self.replies.lock().retain(|(reply_ip, _), _| reply_ip != ip);
    }

    /// The worker answers status probes as freshly restarted.
    pub fn worker_restarted(&self, ip: &str) {
        self.set_reply(ip, ENDPOINT_STATUS, json!({"code": 0, "data": {"system_init": 0}}));
    }

    pub fn calls(&self) -> Vec<RpcCall> {
        self.calls.lock().clone()
    }

    pub fn calls_to(&self, ip: &str, path: &str) -> Vec<RpcCall> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.ip == ip && call.path == path)
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    async fn answer(
        &self,
        method: Method,
        addr: &WorkerAddr,
        path: &str,
        body: Option<&Value>,
        timeout: Duration,
    ) -> Result<Value> {
        self.calls.lock().push(RpcCall {
            method,
            ip: addr.ip.clone(),
            path: path.to_string(),
            body: body.cloned(),
            timeout,
        });

        let key = (addr.ip.clone(), path.to_string());
        let delay = self.delays.lock().get(&key).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.replies
            .lock()
            .get(&key)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("connection refused: {}", addr.url(path)))
    }
}

#[async_trait]
impl WorkerRpc for MockWorkerRpc {
    async fn get(&self, addr: &WorkerAddr, path: &str, timeout: Duration) -> Result<Value> {
        self.answer(Method::Get, addr, path, None, timeout).await
    }

    async fn post(
        &self,
        addr: &WorkerAddr,
        path: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<Value> {
        self.answer(Method::Post, addr, path, Some(body), timeout).await
    }
}
