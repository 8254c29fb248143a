//! Cluster Master
//!
//! Owns the two registries, the worker client and the process-wide output sink,
//! and implements the control-plane operations on top of them. The balancer,
//! health monitor and reconciler extend this type from their own modules.
//!
//! ## Locking
//! Registry locks are taken per call and never held across an `.await`.
//! Assignment attempts are serialized by `assign_gate` so that two callers can
//! never place the same object on two workers.

use super::types::*;
use crate::config::{MasterConfig, TaskCatalog};
use crate::error::{ControlError, ControlResult};
use crate::objects::registry::ObjectRegistry;
use crate::objects::types::{ManagedObject, ObjectStatus, task_name};
use crate::persistence::PersistedState;
use crate::rpc::client::WorkerClient;
use crate::rpc::protocol::*;
use crate::slaves::registry::SlaveRegistry;
use crate::slaves::types::{Liveness, Worker};

use anyhow::Result;
use parking_lot::RwLock;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

pub struct ClusterMaster {
    pub slaves: SlaveRegistry,
    pub objects: ObjectRegistry,
    pub config: MasterConfig,
    pub catalog: TaskCatalog,
    pub(super) client: WorkerClient,
    /// Current output sink, pushed to every worker on (re)initialization.
    output: RwLock<Option<Value>>,
    pub(super) assign_gate: tokio::sync::Mutex<()>,
}

impl ClusterMaster {
    pub fn new(config: MasterConfig, catalog: TaskCatalog, client: WorkerClient) -> Arc<Self> {
        Arc::new(Self {
            slaves: SlaveRegistry::new(),
            objects: ObjectRegistry::new(),
            config,
            catalog,
            client,
            output: RwLock::new(None),
            assign_gate: tokio::sync::Mutex::new(()),
        })
    }

    /// Spawns the health monitor and the task reconciler and returns immediately.
    pub async fn start(self: Arc<Self>) {
        tracing::info!(
            "Starting background loops (health every {:?}, reconcile every {:?})",
            self.config.health_interval(),
            self.config.reconcile_interval()
        );

        let _health_handle = {
            let master = self.clone();
            tokio::spawn(async move {
                master.health_loop().await;
            })
        };

        let _reconcile_handle = {
            let master = self.clone();
            tokio::spawn(async move {
                master.reconcile_loop().await;
            })
        };
    }

    /// Rebuilds both registries from persisted state. Workers are probed as
    /// they are replayed so objects can re-attach to the worker still running them.
    pub async fn restore(&self, state: PersistedState) {
        if let Some(output) = state.output {
            *self.output.write() = Some(output);
        }

        for raw in &state.slaves {
            if let Err(e) = self.register_worker(raw).await {
                tracing::warn!("Skipping persisted worker {}: {}", raw, e);
            }
        }

        for raw in &state.objects {
            if let Err(e) = self.add_object(raw) {
                tracing::warn!("Skipping persisted object: {}", e);
            }
        }

        tracing::info!(
            "Restored {} worker(s) and {} object(s)",
            self.slaves.len(),
            self.objects.len()
        );
    }

    // --- Output sink ---

    pub fn output(&self) -> Option<Value> {
        self.output.read().clone()
    }

    /// Replaces the output sink and pushes it to every alive worker.
    pub async fn set_output(&self, sink: Value) -> usize {
        *self.output.write() = Some(sink.clone());
        self.broadcast_to_alive_workers(ENDPOINT_SET_OUTPUT, &sink).await
    }

    // --- Workers ---

    /// Registers a worker and probes it once.
    ///
    /// The returned snapshot reflects the probe: alive or not, and the objects
    /// it reported running.
    pub async fn register_worker(&self, raw: &Value) -> ControlResult<Worker> {
        let worker = self.slaves.add(raw)?;
        self.probe_new_worker(&worker).await;

        Ok(self.slaves.lookup(&worker.ip).unwrap_or(worker))
    }

    async fn probe_new_worker(&self, worker: &Worker) {
        let addr = worker.addr();

        let status = match self.client.status(&addr, self.config.control_timeout()).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!("Worker {} did not answer its first probe: {}", addr, e);
                self.slaves.mark_dead(&worker.ip);
                return;
            }
        };

        self.slaves.update(&worker.ip, |w| {
            w.liveness = Liveness::Alive;
            w.offline_count = 0;
        });

        // A worker that kept running across a master restart is already initialized
        if !status.initialized {
            let Some(current) = self.slaves.lookup(&worker.ip) else {
                return;
            };
            if let Err(e) = self.push_configuration(&current).await {
                tracing::warn!("Initializing worker {} failed: {}", addr, e);
                self.slaves.mark_dead(&worker.ip);
                return;
            }
        }

        match self.client.object_status(&addr, self.config.control_timeout()).await {
            Ok(ids) => {
                if !ids.is_empty() {
                    tracing::info!("Worker {} reports {} running object(s)", addr, ids.len());
                }
                let ids = self.unclaimed_objects(&worker.ip, ids);
                self.slaves.import_objects(&worker.ip, &ids);
            }
            Err(e) => {
                tracing::warn!("Listing objects of worker {} failed: {}", addr, e);
            }
        }

        tracing::debug!("Worker {} registered alive", addr);
    }

    /// Drops reported ids whose object is already assigned to another worker.
    fn unclaimed_objects(&self, ip: &str, ids: Vec<i64>) -> Vec<i64> {
        ids.into_iter()
            .filter(|id| {
                let owner = self.objects.lookup(*id).and_then(|o| o.assigned_worker);
                match owner {
                    Some(owner) if owner != ip => {
                        tracing::warn!(
                            "Worker {} reports object {} already assigned to {}, ignoring",
                            ip,
                            id,
                            owner
                        );
                        false
                    }
                    _ => true,
                }
            })
            .collect()
    }

    /// Removes a worker. Objects it held lose their assignment; the reconciler
    /// places those that still have desired tasks elsewhere.
    pub fn deregister_worker(&self, ip: &str) -> ControlResult<Worker> {
        let removed = self
            .slaves
            .remove(ip)
            .ok_or_else(|| ControlError::NotFound(format!("slave {} not found", ip)))?;

        let severed = self.objects.clear_worker(ip);
        if !severed.is_empty() {
            tracing::info!("Worker {} removed, {} object(s) unassigned", ip, severed.len());
        }

        Ok(removed)
    }

    /// Pushes the worker's own addressing and then the output sink.
    pub(super) async fn push_configuration(&self, worker: &Worker) -> Result<()> {
        let addr = worker.addr();
        let timeout = self.config.probe_timeout(worker.is_alive());
        let req = InitRequest {
            ip: worker.ip.clone(),
            internet_ip: worker.internet_ip.clone().unwrap_or_default(),
        };

        self.client.init(&addr, &req, timeout).await?;

        if let Some(sink) = self.output()
            && let Err(e) = self.client.set_output(&addr, &sink, timeout).await
        {
            tracing::warn!("Pushing output sink to {} failed: {}", addr, e);
        }

        Ok(())
    }

    /// Best-effort POST to every alive worker. Returns how many answered.
    pub async fn broadcast_to_alive_workers(&self, path: &str, payload: &Value) -> usize {
        let targets: Vec<Worker> = self
            .slaves
            .list()
            .into_iter()
            .filter(Worker::is_alive)
            .collect();

        let mut delivered = 0;
        for worker in targets {
            match self
                .client
                .post_raw(&worker.addr(), path, payload, self.config.control_timeout())
                .await
            {
                Ok(_) => delivered += 1,
                Err(e) => tracing::warn!("Broadcast {} to {} failed: {}", path, worker.addr(), e),
            }
        }

        delivered
    }

    // --- Objects ---

    /// Adds an object.
    ///
    /// Tasks listed under `data.task` become the desired task list. If a worker
    /// already reports running this object id, the object is attached to it
    /// instead of waiting for a fresh assignment.
    pub fn add_object(&self, raw: &Value) -> ControlResult<ManagedObject> {
        let mut raw = raw.clone();
        if let Some(map) = raw.as_object_mut() {
            map.remove("_id");
        }

        let mut object = ManagedObject::from_blob(&raw)?;

        if let Some(tasks) = raw.pointer("/data/task").and_then(Value::as_array) {
            for task in tasks.iter().filter(|t| t.is_object()) {
                object.add_task(task.clone());
            }
        }

        if let Some(worker) = self.slaves.lookup_by_assigned_object(object.id) {
            tracing::info!("Object {} already running on {}", object.id, worker.addr());
            object.assigned_worker = Some(worker.ip);
            object.status = ObjectStatus::Running;
        }

        self.objects.insert(object)
    }

    /// Deletes an object, asking its worker to tear it down first.
    ///
    /// The object is removed locally even when the worker cannot be reached.
    pub async fn delete_object(&self, id: i64) -> ControlResult<ManagedObject> {
        if self.objects.lookup(id).is_none() {
            return Err(ControlError::NotFound(format!("get obj {} failed", id)));
        }

        let body = json!({ "id": id });
        let timeout = self.config.teardown_timeout();
        match self
            .send_to_assigned_worker(id, ENDPOINT_DELETE_OBJECT, &body, timeout)
            .await
        {
            Ok((worker, ack)) => match load_from_ack(&ack) {
                Some(load) => self.slaves.set_load(&worker.ip, load),
                None => {
                    tracing::warn!("Worker {} sent no load after deleting {}", worker.addr(), id)
                }
            },
            Err(ControlError::NotAssigned(_)) => {}
            Err(e) => tracing::warn!("Deleting object {} on its worker failed: {}", id, e),
        }

        let removed = self
            .objects
            .remove(id)
            .ok_or_else(|| ControlError::NotFound(format!("get obj {} failed", id)))?;
        self.slaves.release_object(id);

        Ok(removed)
    }

    /// Records a desired task and starts it if the object has (or gets) a worker.
    ///
    /// `task` is `{ "task": name, "params": {..} }`. The task stays desired
    /// whatever happens on the wire; the reconciler retries deferred ones.
    pub async fn start_task(&self, id: i64, task: Value) -> ControlResult<TaskDispatch> {
        if task_name(&task).is_none() {
            return Err(ControlError::Malformed("get id or task params failed".to_string()));
        }

        self.objects.add_task(id, task.clone())?;

        if let Some(worker) = self.live_worker_of(id) {
            return Ok(self.send_start(id, &worker, task).await);
        }

        let assignment = match self.assign_object(id).await {
            Ok(assignment) => assignment,
            Err(e) => {
                tracing::debug!("Task for object {} deferred: {}", id, e);
                self.objects.set_status(id, ObjectStatus::Stopped);
                return Ok(TaskDispatch::Deferred {
                    reason: e.to_string(),
                });
            }
        };

        match assignment {
            Assignment::Existing(worker) => Ok(self.send_start(id, &worker, task).await),
            Assignment::Assigned(worker) => {
                // Fresh worker: it needs every desired task, not just this one
                self.replay_tasks(id, &worker).await;
                Ok(TaskDispatch::Sent { worker_ip: worker.ip })
            }
        }
    }

    async fn send_start(&self, id: i64, worker: &Worker, task: Value) -> TaskDispatch {
        let cmd = TaskCommand { id, data: task };
        match self
            .client
            .start_task(&worker.addr(), &cmd, self.config.control_timeout())
            .await
        {
            Ok(()) => {
                self.objects.set_status(id, ObjectStatus::Running);
                TaskDispatch::Sent {
                    worker_ip: worker.ip.clone(),
                }
            }
            Err(e) => TaskDispatch::Unreachable {
                ip: worker.ip.clone(),
                reason: e.to_string(),
            },
        }
    }

    /// Removes the first desired task named in `data.task` and stops it on the worker.
    pub async fn stop_task(&self, id: i64, data: Value) -> ControlResult<TaskDispatch> {
        let name = task_name(&data)
            .map(str::to_string)
            .ok_or_else(|| ControlError::Malformed("get id/task failed".to_string()))?;

        if !self.objects.remove_task(id, &name)? {
            return Err(ControlError::NotFound(format!(
                "del task failed, id:{}, task:{}",
                id, name
            )));
        }

        let remaining = self
            .objects
            .lookup(id)
            .map(|o| o.desired_tasks.len())
            .unwrap_or(0);
        if remaining == 0 {
            self.objects.set_status(id, ObjectStatus::Stopped);
        }

        let body = json!({ "id": id, "data": data });
        match self
            .send_to_assigned_worker(id, ENDPOINT_STOP_TASK, &body, self.config.teardown_timeout())
            .await
        {
            Ok((worker, _)) => Ok(TaskDispatch::Sent { worker_ip: worker.ip }),
            Err(ControlError::NotAssigned(_)) => Ok(TaskDispatch::Deferred {
                reason: format!("object {} has no live worker", id),
            }),
            Err(ControlError::WorkerUnreachable { ip, reason }) => {
                Ok(TaskDispatch::Unreachable { ip, reason })
            }
            Err(e) => Err(e),
        }
    }

    /// Sends a request to the worker an object is assigned to.
    ///
    /// Fails fast with `NotAssigned` when the object has no worker or the worker
    /// is not alive. An answer carrying a non-zero `code` is `WorkerRejected`.
    pub async fn send_to_assigned_worker(
        &self,
        id: i64,
        path: &str,
        payload: &Value,
        timeout: Duration,
    ) -> ControlResult<(Worker, Value)> {
        if self.objects.lookup(id).is_none() {
            return Err(ControlError::NotFound(format!("get obj {} failed", id)));
        }

        let worker = self.live_worker_of(id).ok_or(ControlError::NotAssigned(id))?;

        match self.client.post_raw(&worker.addr(), path, payload, timeout).await {
            Ok(ack) => match rejection_from_ack(&ack) {
                Some(reason) => Err(ControlError::WorkerRejected {
                    ip: worker.ip,
                    reason,
                }),
                None => Ok((worker, ack)),
            },
            Err(e) => Err(ControlError::WorkerUnreachable {
                ip: worker.ip,
                reason: e.to_string(),
            }),
        }
    }

    /// The worker an object is assigned to, if it is registered and alive.
    pub fn live_worker_of(&self, id: i64) -> Option<Worker> {
        let ip = self.objects.lookup(id)?.assigned_worker?;
        self.slaves.lookup(&ip).filter(Worker::is_alive)
    }

    /// Starts every desired task of an object on `worker`, in order.
    pub(super) async fn replay_tasks(&self, id: i64, worker: &Worker) {
        let Some(object) = self.objects.lookup(id) else {
            return;
        };

        let addr = worker.addr();
        for task in object.desired_tasks {
            let cmd = TaskCommand { id, data: task };
            if let Err(e) = self
                .client
                .start_task(&addr, &cmd, self.config.control_timeout())
                .await
            {
                tracing::warn!("Starting task on {} for object {} failed: {}", addr, id, e);
            }
        }

        self.objects.set_status(id, ObjectStatus::Running);
    }

    /// Summary of the configured output sink for the system-info query.
    pub fn output_summary(&self) -> Option<Value> {
        let sink = self.output()?;
        let data = sink.get("data")?;
        Some(json!({
            "type": sink.get("type")?,
            "host": data.get("host")?,
            "port": data.get("port").cloned().unwrap_or(Value::from(-1)),
            "username": data.get("username")?,
            "password": data.get("password")?,
            "exchange": data.get("exchange")?,
            "routingkey": data.get("routingkey")?,
        }))
    }
}
