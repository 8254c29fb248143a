//! Worker RPC Client
//!
//! `WorkerRpc` is the transport seam: a GET/POST that either yields the parsed
//! response body or fails. Timeouts, refused connections and other transport
//! errors are all reported as `Err` and treated as "no response" by callers.
//! `WorkerClient` layers the typed worker operations on top of it.

use super::protocol::*;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

#[async_trait]
pub trait WorkerRpc: Send + Sync {
    async fn get(&self, addr: &WorkerAddr, path: &str, timeout: Duration) -> Result<Value>;

    async fn post(
        &self,
        addr: &WorkerAddr,
        path: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<Value>;
}

/// HTTP transport backed by `reqwest`.
pub struct HttpWorkerRpc {
    http_client: reqwest::Client,
}

impl HttpWorkerRpc {
    pub fn new() -> Self {
        Self {
            http_client: reqwest::Client::new(),
        }
    }

    /// Any HTTP answer counts as a response; a body that is not JSON becomes `Null`.
    async fn read_body(response: reqwest::Response) -> Result<Value> {
        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::debug!("Worker answered with non-JSON body: {}", e);
                Ok(Value::Null)
            }
        }
    }
}

impl Default for HttpWorkerRpc {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkerRpc for HttpWorkerRpc {
    async fn get(&self, addr: &WorkerAddr, path: &str, timeout: Duration) -> Result<Value> {
        let response = self
            .http_client
            .get(addr.url(path))
            .timeout(timeout)
            .send()
            .await?;

        Self::read_body(response).await
    }

    async fn post(
        &self,
        addr: &WorkerAddr,
        path: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<Value> {
        let response = self
            .http_client
            .post(addr.url(path))
            .json(body)
            .timeout(timeout)
            .send()
            .await?;

        Self::read_body(response).await
    }
}

/// Typed operations against a worker node.
#[derive(Clone)]
pub struct WorkerClient {
    rpc: Arc<dyn WorkerRpc>,
}

impl WorkerClient {
    pub fn new(rpc: Arc<dyn WorkerRpc>) -> Self {
        Self { rpc }
    }

    pub fn http() -> Self {
        Self::new(Arc::new(HttpWorkerRpc::new()))
    }

    pub async fn status(&self, addr: &WorkerAddr, timeout: Duration) -> Result<WorkerStatus> {
        let body = self.rpc.get(addr, ENDPOINT_STATUS, timeout).await?;
        Ok(WorkerStatus::from_ack(&body))
    }

    pub async fn init(
        &self,
        addr: &WorkerAddr,
        req: &InitRequest,
        timeout: Duration,
    ) -> Result<()> {
        let body = serde_json::to_value(req)?;
        self.rpc.post(addr, ENDPOINT_INIT, &body, timeout).await?;
        Ok(())
    }

    pub async fn set_output(
        &self,
        addr: &WorkerAddr,
        sink: &Value,
        timeout: Duration,
    ) -> Result<()> {
        self.rpc.post(addr, ENDPOINT_SET_OUTPUT, sink, timeout).await?;
        Ok(())
    }

    /// Returns the worker's load after taking the object, if it reported a valid one.
    pub async fn add_object(
        &self,
        addr: &WorkerAddr,
        object_type: &str,
        params: &Value,
        timeout: Duration,
    ) -> Result<Option<f64>> {
        let body = self
            .rpc
            .post(addr, &add_object_path(object_type), params, timeout)
            .await?;
        Ok(load_from_ack(&body))
    }

    pub async fn start_task(
        &self,
        addr: &WorkerAddr,
        cmd: &TaskCommand,
        timeout: Duration,
    ) -> Result<()> {
        let body = serde_json::to_value(cmd)?;
        self.rpc.post(addr, ENDPOINT_START_TASK, &body, timeout).await?;
        Ok(())
    }

    pub async fn object_status(&self, addr: &WorkerAddr, timeout: Duration) -> Result<Vec<i64>> {
        let body = self.rpc.get(addr, ENDPOINT_OBJECT_STATUS, timeout).await?;
        Ok(object_ids_from_ack(&body))
    }

    /// Raw POST, for cluster-wide pushes whose path is chosen by the caller.
    pub async fn post_raw(
        &self,
        addr: &WorkerAddr,
        path: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<Value> {
        self.rpc.post(addr, path, body, timeout).await
    }
}
