//! Worker RPC Module
//!
//! Outbound calls from the master to worker nodes. Every call carries an explicit
//! timeout and a call that times out or is refused is indistinguishable from a
//! worker that never answered.
//!
//! ## Submodules
//! - **`protocol`**: worker endpoints, request bodies and acknowledgement parsing.
//! - **`client`**: the `WorkerRpc` transport trait, its `reqwest` implementation and
//!   the typed `WorkerClient`.

pub mod client;
pub mod protocol;

#[cfg(test)]
pub mod mock;

#[cfg(test)]
mod tests;
