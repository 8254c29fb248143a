//! Media Processing Cluster Master Library
//!
//! Control-plane core of a master/worker media processing cluster. The master
//! keeps track of worker ("slave") nodes and managed objects (stream ingests),
//! places each object on the least-loaded live worker and keeps the tasks
//! desired for it running there across worker failures and restarts.
//!
//! ## Architecture Modules
//! - **`api`**: Operator-facing HTTP control plane (axum) and its DTOs.
//! - **`cluster`**: `ClusterMaster`, the load balancer, the health monitor and
//!   the task reconciler.
//! - **`config`**: Command-line configuration and the task catalog file.
//! - **`error`**: Control-plane error taxonomy and its HTTP mapping.
//! - **`objects`**: Managed objects and their desired task lists.
//! - **`persistence`**: Durable state replayed at startup.
//! - **`rpc`**: Worker REST protocol and the client used to talk to workers.
//! - **`slaves`**: Worker nodes and their registry.

pub mod api;
pub mod cluster;
pub mod config;
pub mod error;
pub mod objects;
pub mod persistence;
pub mod rpc;
pub mod slaves;
