//! Load Balancer
//!
//! Greedy least-loaded placement with a hard ceiling: among workers that are
//! alive and below `load_max`, the smallest reported load wins and ties go to
//! the earliest registered worker. Nothing is reserved ahead of the worker's
//! answer; a failed placement is simply retried on the next reconcile tick.

use super::master::ClusterMaster;
use super::types::Assignment;
use crate::error::{ControlError, ControlResult};
use crate::rpc::protocol::{ENDPOINT_DELETE_OBJECT, load_from_ack, rejection_from_ack};
use crate::slaves::types::Worker;

use serde_json::json;

/// Picks the eligible worker with the lowest load.
///
/// Workers must be in registration order; on equal loads the first one seen is kept.
pub fn select_least_loaded(workers: &[Worker], load_max: f64) -> Option<&Worker> {
    let mut best: Option<&Worker> = None;

    for worker in workers.iter().filter(|w| w.is_eligible(load_max)) {
        match best {
            Some(current) if worker.total_load >= current.total_load => {}
            _ => best = Some(worker),
        }
    }

    best
}

impl ClusterMaster {
    /// Places an object on the least-loaded eligible worker.
    ///
    /// On success the worker's load is refreshed from its answer and the object
    /// points at the worker. A worker that does not answer is marked dead and
    /// the object stays unassigned.
    pub async fn assign_object(&self, id: i64) -> ControlResult<Assignment> {
        let _gate = self.assign_gate.lock().await;

        // Someone may have placed it while we waited for the gate
        if let Some(worker) = self.live_worker_of(id) {
            return Ok(Assignment::Existing(worker));
        }

        let object = self
            .objects
            .lookup(id)
            .ok_or_else(|| ControlError::NotFound(format!("get obj {} failed", id)))?;

        let workers = self.slaves.list();
        let worker = select_least_loaded(&workers, self.config.load_max)
            .cloned()
            .ok_or(ControlError::NoEligibleWorker(id))?;

        let object_type = object.object_type().ok_or_else(|| {
            tracing::warn!("Object {} has no type", id);
            ControlError::Malformed(format!("get obj type failed, id:{}", id))
        })?;

        let addr = worker.addr();
        let load = match self
            .client
            .add_object(&addr, object_type, &object.raw_params, self.config.control_timeout())
            .await
        {
            Ok(load) => load,
            Err(e) => {
                tracing::warn!("Worker {} is offline: {}", addr, e);
                self.slaves.mark_dead(&worker.ip);
                return Err(ControlError::WorkerUnreachable {
                    ip: worker.ip,
                    reason: e.to_string(),
                });
            }
        };

        match load {
            Some(load) => self.slaves.set_load(&worker.ip, load),
            None => tracing::warn!("Worker {}: no valid load in add-object answer", addr),
        }

        if !self.objects.set_assignment(id, Some(worker.ip.clone())) {
            // Deleted while the worker was being asked; take it back off the worker
            tracing::debug!("Object {} vanished during assignment", id);
            self.withdraw_object(&worker, id).await;
            return Err(ControlError::NotFound(format!("get obj {} failed", id)));
        }
        self.slaves.record_assignment(&worker.ip, id);

        tracing::debug!("Assigned object {} to {}", id, addr);

        let worker = self.slaves.lookup(&worker.ip).unwrap_or(worker);
        Ok(Assignment::Assigned(worker))
    }

    async fn withdraw_object(&self, worker: &Worker, id: i64) {
        let addr = worker.addr();
        let body = json!({ "id": id });
        let timeout = self.config.teardown_timeout();

        match self.client.post_raw(&addr, ENDPOINT_DELETE_OBJECT, &body, timeout).await {
            Ok(ack) => match rejection_from_ack(&ack) {
                Some(reason) => {
                    tracing::warn!("Worker {} refused to drop object {}: {}", addr, id, reason)
                }
                None => {
                    if let Some(load) = load_from_ack(&ack) {
                        self.slaves.set_load(&worker.ip, load);
                    }
                }
            },
            Err(e) => tracing::warn!("Dropping object {} from worker {} failed: {}", id, addr, e),
        }
    }
}
