//! Master Configuration
//!
//! Command-line flags (with defaults for every value) and the static task
//! catalog file. `MasterConfig::default()` yields the same values as running
//! the binary with no flags, which is what the tests use.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How the health monitor throttles probes of a worker that keeps failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProbePolicy {
    /// Probe every cycle until the failure threshold is reached, then once every
    /// `probe_backoff_cycles` cycles, counted whether or not the probe ran.
    Counted,
    /// `offline_count <= 1 || offline_count % backoff == 0`. A worker whose
    /// count settles on a non-multiple is never probed again.
    Legacy,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "media-master", version, about = "Media cluster master node")]
pub struct MasterConfig {
    /// Address the control-plane HTTP server binds to.
    #[arg(long, default_value = "0.0.0.0:8081")]
    pub bind: SocketAddr,

    /// JSON file holding persisted system config, workers and objects.
    #[arg(long, default_value = "data/master_state.json")]
    pub state_file: PathBuf,

    /// Static list of tasks workers are able to run.
    #[arg(long, default_value = "cfg/task.json")]
    pub task_catalog: PathBuf,

    #[arg(long, default_value_t = 10)]
    pub health_interval_secs: u64,

    #[arg(long, default_value_t = 3)]
    pub reconcile_interval_secs: u64,

    /// Workers reporting a load at or above this value get no new objects.
    #[arg(long, default_value_t = 100.0)]
    pub load_max: f64,

    /// Consecutive failed probes after which an alive worker is declared dead.
    #[arg(long, default_value_t = 3)]
    pub offline_threshold: u32,

    #[arg(long, default_value_t = 60)]
    pub probe_backoff_cycles: u32,

    #[arg(long, value_enum, default_value_t = ProbePolicy::Counted)]
    pub probe_policy: ProbePolicy,

    /// Timeout for status probes and configuration pushes to an alive worker.
    #[arg(long, default_value_t = 3)]
    pub alive_timeout_secs: u64,

    /// Timeout for status probes and configuration pushes to a dead worker.
    #[arg(long, default_value_t = 1)]
    pub dead_timeout_secs: u64,

    /// Timeout for add-object and start-task calls.
    #[arg(long, default_value_t = 5)]
    pub control_timeout_secs: u64,

    /// Timeout for stop-task and delete-object calls (graceful teardown on the worker).
    #[arg(long, default_value_t = 30)]
    pub teardown_timeout_secs: u64,

    /// Port of the worker-side HTTP preview server, used to build preview URLs.
    #[arg(long, default_value_t = 8080)]
    pub preview_http_port: u16,

    #[arg(long, default_value = "admin")]
    pub admin_user: String,

    #[arg(long, default_value = "123456")]
    pub admin_password: String,

    /// Delay before replaying persisted workers, giving them time to come up.
    #[arg(long, default_value_t = 3)]
    pub startup_delay_secs: u64,

    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self::parse_from(["media-master"])
    }
}

impl MasterConfig {
    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }

    /// Probe/init timeout depends on whether the worker is currently believed alive.
    pub fn probe_timeout(&self, alive: bool) -> Duration {
        if alive {
            Duration::from_secs(self.alive_timeout_secs)
        } else {
            Duration::from_secs(self.dead_timeout_secs)
        }
    }

    pub fn control_timeout(&self) -> Duration {
        Duration::from_secs(self.control_timeout_secs)
    }

    pub fn teardown_timeout(&self) -> Duration {
        Duration::from_secs(self.teardown_timeout_secs)
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_secs(self.startup_delay_secs)
    }
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    tasks: Vec<CatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    name: Option<String>,
    config: Option<String>,
}

/// Names of the tasks the cluster supports, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskCatalog {
    pub names: Vec<String>,
}

impl TaskCatalog {
    /// Reads `{ "tasks": [{ "name": .., "config": .. }] }`.
    ///
    /// Loading stops at the first entry missing `name` or `config`; the entries
    /// before it are kept.
    pub fn parse(json: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(json)?;
        let mut names = Vec::with_capacity(file.tasks.len());

        for entry in file.tasks {
            match (entry.name, entry.config) {
                (Some(name), Some(_)) => names.push(name),
                _ => {
                    tracing::warn!("Task catalog entry without name or config, stopping");
                    break;
                }
            }
        }

        Ok(Self { names })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading task catalog {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("parsing task catalog {}", path.display()))
    }

    /// Like `load`, but a missing or broken file yields an empty catalog.
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::load(path) {
            Ok(catalog) => {
                tracing::info!("Loaded {} task(s) from {}", catalog.names.len(), path.display());
                catalog
            }
            Err(e) => {
                tracing::warn!("{:#}", e);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_cluster_constants() {
        let config = MasterConfig::default();

        assert_eq!(config.offline_threshold, 3);
        assert_eq!(config.probe_backoff_cycles, 60);
        assert_eq!(config.probe_policy, ProbePolicy::Counted);
        assert_eq!(config.health_interval(), Duration::from_secs(10));
        assert_eq!(config.reconcile_interval(), Duration::from_secs(3));
        assert_eq!(config.probe_timeout(true), Duration::from_secs(3));
        assert_eq!(config.probe_timeout(false), Duration::from_secs(1));
        assert_eq!(config.teardown_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_flags_override_defaults() {
        let config = MasterConfig::parse_from([
            "media-master",
            "--probe-policy",
            "legacy",
            "--load-max",
            "50",
            "--bind",
            "127.0.0.1:9000",
        ]);

        assert_eq!(config.probe_policy, ProbePolicy::Legacy);
        assert_eq!(config.load_max, 50.0);
        assert_eq!(config.bind.port(), 9000);
    }

    #[test]
    fn test_catalog_keeps_file_order() {
        let json = r#"{"tasks": [
            {"name": "yolov3", "config": "cfg/yolov3.json"},
            {"name": "facenet", "config": "cfg/facenet.json"}
        ]}"#;

        let catalog = TaskCatalog::parse(json).unwrap();

        assert_eq!(catalog.names, vec!["yolov3", "facenet"]);
    }

    #[test]
    fn test_catalog_stops_at_incomplete_entry() {
        let json = r#"{"tasks": [
            {"name": "yolov3", "config": "cfg/yolov3.json"},
            {"name": "broken"},
            {"name": "facenet", "config": "cfg/facenet.json"}
        ]}"#;

        let catalog = TaskCatalog::parse(json).unwrap();

        assert_eq!(catalog.names, vec!["yolov3"]);
    }

    #[test]
    fn test_catalog_missing_file_is_empty() {
        let catalog = TaskCatalog::load_or_empty(Path::new("/nonexistent/task.json"));
        assert!(catalog.names.is_empty());
        assert!(TaskCatalog::parse("not json").is_err());
    }
}
