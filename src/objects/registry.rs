//! Object Registry
//!
//! Authoritative list of managed objects in insertion order (the order the
//! paginated listing and the reconciler sweep use). Same access discipline as
//! the slave registry: one short critical section per call, snapshots out.

use super::types::*;
use crate::error::{ControlError, ControlResult};

use parking_lot::Mutex;
use serde_json::Value;

pub struct ObjectRegistry {
    objects: Mutex<Vec<ManagedObject>>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(Vec::new()),
        }
    }

    /// Adds an object from its definition.
    pub fn add(&self, raw: &Value) -> ControlResult<ManagedObject> {
        let object = ManagedObject::from_blob(raw)?;
        self.insert(object)
    }

    /// Adds an already built object (startup replay carries tasks and assignment).
    pub fn insert(&self, object: ManagedObject) -> ControlResult<ManagedObject> {
        let mut objects = self.objects.lock();

        if objects.iter().any(|o| o.id == object.id) {
            return Err(ControlError::Duplicate(format!("obj {} exist", object.id)));
        }

        objects.push(object.clone());
        tracing::debug!("Added object {} ({} total)", object.id, objects.len());

        Ok(object)
    }

    pub fn remove(&self, id: i64) -> Option<ManagedObject> {
        let mut objects = self.objects.lock();
        let idx = objects.iter().position(|o| o.id == id)?;
        Some(objects.remove(idx))
    }

    pub fn lookup(&self, id: i64) -> Option<ManagedObject> {
        self.objects.lock().iter().find(|o| o.id == id).cloned()
    }

    pub fn list(&self) -> Vec<ManagedObject> {
        self.objects.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }

    /// Objects at positions `[offset, offset + limit)` and the registry size.
    pub fn page(&self, offset: usize, limit: usize) -> (Vec<ManagedObject>, usize) {
        let objects = self.objects.lock();
        let total = objects.len();
        let window = objects.iter().skip(offset).take(limit).cloned().collect();
        (window, total)
    }

    pub fn update<F, R>(&self, id: i64, f: F) -> Option<R>
    where
        F: FnOnce(&mut ManagedObject) -> R,
    {
        let mut objects = self.objects.lock();
        objects.iter_mut().find(|o| o.id == id).map(f)
    }

    pub fn add_task(&self, id: i64, task: Value) -> ControlResult<()> {
        self.update(id, |o| o.add_task(task))
            .ok_or_else(|| ControlError::NotFound(format!("get obj {} failed", id)))
    }

    /// Removes the first task named `name`; `Ok(false)` when the object has no such task.
    pub fn remove_task(&self, id: i64, name: &str) -> ControlResult<bool> {
        self.update(id, |o| o.remove_task(name))
            .ok_or_else(|| ControlError::NotFound(format!("get obj {} failed", id)))
    }

    pub fn peek_task(&self, id: i64) -> Option<Value> {
        self.objects
            .lock()
            .iter()
            .find(|o| o.id == id)
            .and_then(|o| o.peek_task().cloned())
    }

    pub fn set_status(&self, id: i64, status: ObjectStatus) {
        self.update(id, |o| o.status = status);
    }

    /// Points the object at a worker, or clears the assignment with `None`.
    pub fn set_assignment(&self, id: i64, worker_ip: Option<String>) -> bool {
        self.update(id, |o| o.assigned_worker = worker_ip).is_some()
    }

    /// Severs every object assigned to `worker_ip`, returning their ids.
    pub fn clear_worker(&self, worker_ip: &str) -> Vec<i64> {
        let mut cleared = Vec::new();
        for object in self.objects.lock().iter_mut() {
            if object.assigned_worker.as_deref() == Some(worker_ip) {
                object.assigned_worker = None;
                cleared.push(object.id);
            }
        }
        cleared
    }
}

impl Default for ObjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}
