//! JSON File Store
//!
//! Keeps the whole `PersistedState` in memory and rewrites the file after every
//! mutation. A write goes to `<file>.tmp` first and is renamed over the real
//! file, so a crash mid-write leaves the previous state intact.

use super::{PersistedState, StateStore};
use crate::objects::types::task_name;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

pub struct JsonFileStore {
    /// `None` keeps everything in memory.
    path: Option<PathBuf>,
    state: Mutex<PersistedState>,
}

impl JsonFileStore {
    /// Opens the store at `path`. A missing file starts an empty state; a file
    /// that exists but cannot be parsed is an error.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let state = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("parsing state file {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No state file at {}, starting empty", path.display());
                PersistedState::default()
            }
            Err(e) => {
                return Err(e).with_context(|| format!("reading state file {}", path.display()));
            }
        };

        Ok(Self {
            path: Some(path),
            state: Mutex::new(state),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(PersistedState::default()),
        }
    }

    async fn flush(&self, state: &PersistedState) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }

        let body = serde_json::to_vec_pretty(state)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, path)
            .await
            .with_context(|| format!("replacing {}", path.display()))?;

        Ok(())
    }
}

fn slave_ip(raw: &Value) -> Option<&str> {
    raw.get("ip").and_then(Value::as_str)
}

fn object_id(raw: &Value) -> Option<i64> {
    raw.get("id").and_then(Value::as_i64)
}

/// The object's `data.task` array, created if missing.
fn task_list(raw: &mut Value) -> Option<&mut Vec<Value>> {
    let data = raw
        .as_object_mut()?
        .entry("data")
        .or_insert_with(|| Value::Object(Map::new()));
    data.as_object_mut()?
        .entry("task")
        .or_insert_with(|| Value::Array(Vec::new()))
        .as_array_mut()
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn load(&self) -> Result<PersistedState> {
        Ok(self.state.lock().await.clone())
    }

    async fn set_output(&self, sink: &Value) -> Result<()> {
        let mut state = self.state.lock().await;
        state.output = Some(sink.clone());
        self.flush(&state).await
    }

    async fn upsert_slave(&self, ip: &str, raw: &Value) -> Result<()> {
        let mut state = self.state.lock().await;
        match state.slaves.iter_mut().find(|s| slave_ip(s) == Some(ip)) {
            Some(existing) => *existing = raw.clone(),
            None => state.slaves.push(raw.clone()),
        }
        self.flush(&state).await
    }

    async fn delete_slave(&self, ip: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.slaves.retain(|s| slave_ip(s) != Some(ip));
        self.flush(&state).await
    }

    async fn upsert_object(&self, id: i64, raw: &Value) -> Result<()> {
        let mut state = self.state.lock().await;
        match state.objects.iter_mut().find(|o| object_id(o) == Some(id)) {
            Some(existing) => *existing = raw.clone(),
            None => state.objects.push(raw.clone()),
        }
        self.flush(&state).await
    }

    async fn delete_object(&self, id: i64) -> Result<()> {
        let mut state = self.state.lock().await;
        state.objects.retain(|o| object_id(o) != Some(id));
        self.flush(&state).await
    }

    async fn push_task(&self, id: i64, task: &Value) -> Result<()> {
        let mut state = self.state.lock().await;
        let Some(object) = state.objects.iter_mut().find(|o| object_id(o) == Some(id)) else {
            bail!("object {} is not stored", id);
        };
        let Some(tasks) = task_list(object) else {
            bail!("stored object {} has a non-object data field", id);
        };
        tasks.push(task.clone());
        self.flush(&state).await
    }

    async fn pull_task(&self, id: i64, name: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        let Some(tasks) = state
            .objects
            .iter_mut()
            .find(|o| object_id(o) == Some(id))
            .and_then(task_list)
        else {
            return Ok(false);
        };

        let Some(pos) = tasks.iter().position(|t| task_name(t) == Some(name)) else {
            return Ok(false);
        };
        tasks.remove(pos);
        self.flush(&state).await?;

        Ok(true)
    }
}
