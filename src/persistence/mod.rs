//! Persistence Module
//!
//! Durable copy of what the master needs to rebuild its registries after a
//! restart: the output sink, the raw worker registrations and the raw object
//! definitions (each carrying its desired tasks under `data.task`).
//!
//! The core registries never write here. The HTTP layer mirrors every
//! successful mutation, and `ClusterMaster::restore` replays a loaded
//! `PersistedState` at startup.

pub mod json_store;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Everything stored, in registration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    /// Output sink, stored under the `system` key.
    #[serde(rename = "system", default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub slaves: Vec<Value>,
    #[serde(default)]
    pub objects: Vec<Value>,
}

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load(&self) -> Result<PersistedState>;

    async fn set_output(&self, sink: &Value) -> Result<()>;

    /// Inserts or replaces the registration keyed by `ip`.
    async fn upsert_slave(&self, ip: &str, raw: &Value) -> Result<()>;

    async fn delete_slave(&self, ip: &str) -> Result<()>;

    /// Inserts or replaces the object definition keyed by `id`.
    async fn upsert_object(&self, id: i64, raw: &Value) -> Result<()>;

    async fn delete_object(&self, id: i64) -> Result<()>;

    /// Appends a task to the object's stored `data.task` list.
    async fn push_task(&self, id: i64, task: &Value) -> Result<()>;

    /// Removes the first stored task named `name`. Returns whether one was removed.
    async fn pull_task(&self, id: i64, name: &str) -> Result<bool>;
}
