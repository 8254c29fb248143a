//! Fleet Orchestration Module
//!
//! The master's view of the cluster and the loops that keep it true.
//!
//! ## Components
//! - **`master`**: `ClusterMaster`, owner of both registries and the output sink;
//!   control-plane operations (register worker, add object, start/stop task, ...).
//! - **`balancer`**: least-loaded placement of an object on an eligible worker.
//! - **`health`**: periodic worker probing and the liveness state machine
//!   (offline -> dead -> recovered, restart detection).
//! - **`reconciler`**: periodic (re)assignment of objects whose desired tasks
//!   have no live worker, replaying their tasks in order.

pub mod balancer;
pub mod health;
pub mod master;
pub mod reconciler;
pub mod types;
