//! Slave Registry Module
//!
//! Tracks the worker ("slave") machines of the cluster: identity, liveness
//! counters, last reported load and the objects each one runs.

pub mod registry;
pub mod types;
