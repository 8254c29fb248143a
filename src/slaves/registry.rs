//! Slave Registry
//!
//! Authoritative set of worker nodes, kept in registration order (the load
//! balancer breaks ties by that order). All access goes through a single
//! mutex held for one scan or mutation at a time; callers receive clones and
//! must never hold anything from here across a network call.

use super::types::*;
use crate::error::{ControlError, ControlResult};

use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeSet;

pub struct SlaveRegistry {
    workers: Mutex<Vec<Worker>>,
}

impl SlaveRegistry {
    pub fn new() -> Self {
        Self {
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Registers a worker from its registration payload.
    pub fn add(&self, raw: &Value) -> ControlResult<Worker> {
        let worker = Worker::from_registration(raw)?;
        let mut workers = self.workers.lock();

        if workers.iter().any(|w| w.ip == worker.ip) {
            tracing::warn!("Worker {} already registered", worker.ip);
            return Err(ControlError::Duplicate(format!("slave {} exist", worker.ip)));
        }

        workers.push(worker.clone());
        tracing::info!("Registered worker {} ({} total)", worker.addr(), workers.len());

        Ok(worker)
    }

    pub fn remove(&self, ip: &str) -> Option<Worker> {
        let mut workers = self.workers.lock();
        let idx = workers.iter().position(|w| w.ip == ip)?;
        let removed = workers.remove(idx);
        tracing::info!("Removed worker {} ({} left)", removed.addr(), workers.len());
        Some(removed)
    }

    pub fn lookup(&self, ip: &str) -> Option<Worker> {
        self.workers.lock().iter().find(|w| w.ip == ip).cloned()
    }

    /// Finds the worker that reports running `object_id`.
    ///
    /// After a master restart this is how an object re-attaches to the worker
    /// that is still running it instead of being assigned a second time.
    pub fn lookup_by_assigned_object(&self, object_id: i64) -> Option<Worker> {
        self.workers
            .lock()
            .iter()
            .find(|w| w.assigned_object_ids.contains(&object_id))
            .cloned()
    }

    /// Snapshot of all workers in registration order.
    pub fn list(&self) -> Vec<Worker> {
        self.workers.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.workers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.lock().is_empty()
    }

    /// Applies `f` to the worker with the given ip, if it is still registered.
    pub fn update<F, R>(&self, ip: &str, f: F) -> Option<R>
    where
        F: FnOnce(&mut Worker) -> R,
    {
        let mut workers = self.workers.lock();
        workers.iter_mut().find(|w| w.ip == ip).map(f)
    }

    pub fn mark_dead(&self, ip: &str) {
        self.update(ip, |w| w.liveness = Liveness::Dead);
    }

    /// Overwrites the worker's load with a value it reported.
    pub fn set_load(&self, ip: &str, load: f64) {
        self.update(ip, |w| w.total_load = load);
    }

    /// Records that `object_id` now runs on `ip` and on no other worker.
    ///
    /// Returns false when the worker is no longer registered.
    pub fn record_assignment(&self, ip: &str, object_id: i64) -> bool {
        let mut workers = self.workers.lock();
        if !workers.iter().any(|w| w.ip == ip) {
            return false;
        }

        for worker in workers.iter_mut() {
            if worker.ip == ip {
                worker.assigned_object_ids.insert(object_id);
            } else {
                worker.assigned_object_ids.remove(&object_id);
            }
        }
        true
    }

    /// Forgets `object_id` on every worker (the object was deleted).
    pub fn release_object(&self, object_id: i64) {
        for worker in self.workers.lock().iter_mut() {
            worker.assigned_object_ids.remove(&object_id);
        }
    }

    /// Replaces the set of objects a worker runs with what it reported.
    pub fn import_objects(&self, ip: &str, object_ids: &[i64]) {
        let mut workers = self.workers.lock();
        for worker in workers.iter_mut() {
            if worker.ip == ip {
                worker.assigned_object_ids = object_ids.iter().copied().collect();
            } else {
                for id in object_ids {
                    worker.assigned_object_ids.remove(id);
                }
            }
        }
    }

    /// Drops every object of a worker, returning the ids it had.
    pub fn clear_assignments(&self, ip: &str) -> BTreeSet<i64> {
        self.update(ip, |w| std::mem::take(&mut w.assigned_object_ids))
            .unwrap_or_default()
    }
}

impl Default for SlaveRegistry {
    fn default() -> Self {
        Self::new()
    }
}
