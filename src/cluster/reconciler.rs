//! Task Reconciler
//!
//! Closes the gap between desired and running tasks. Every tick, each object
//! with desired tasks but no live worker is assigned one and its whole task
//! list is replayed there in insertion order. Objects that already have a live
//! worker are left alone: their tasks went out with the start/stop requests.

use super::master::ClusterMaster;
use super::types::Assignment;
use crate::objects::types::ObjectStatus;

use std::sync::Arc;

/// Result of reconciling a single object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Placed { worker_ip: String },
    Failed,
}

impl ClusterMaster {
    pub(super) async fn reconcile_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.reconcile_interval());

        loop {
            interval.tick().await;
            self.reconcile_sweep().await;
        }
    }

    /// One pass over every object; returns what happened to the ones that needed a worker.
    pub async fn reconcile_sweep(&self) -> Vec<(i64, ReconcileOutcome)> {
        let mut outcomes = Vec::new();

        for object in self.objects.list() {
            if object.desired_tasks.is_empty() {
                continue;
            }
            if self.live_worker_of(object.id).is_some() {
                continue;
            }

            let outcome = match self.assign_object(object.id).await {
                Ok(Assignment::Assigned(worker)) => {
                    tracing::info!(
                        "Replaying {} task(s) of object {} on {}",
                        object.desired_tasks.len(),
                        object.id,
                        worker.addr()
                    );
                    self.replay_tasks(object.id, &worker).await;
                    ReconcileOutcome::Placed {
                        worker_ip: worker.ip,
                    }
                }
                // Placed by a concurrent start-task, which sent the tasks itself
                Ok(Assignment::Existing(_)) => continue,
                Err(e) => {
                    tracing::debug!("Assigning object {} failed: {}", object.id, e);
                    self.objects.set_status(object.id, ObjectStatus::Stopped);
                    ReconcileOutcome::Failed
                }
            };

            outcomes.push((object.id, outcome));
        }

        outcomes
    }
}
