//! Object Registry Module
//!
//! Managed objects (stream ingests and the like), their definition, the worker
//! they are assigned to and the ordered list of tasks they should be running.
//! The desired task list is the source of truth; workers converge to it.

pub mod registry;
pub mod types;

#[cfg(test)]
mod tests;
