//! Health Monitor
//!
//! Periodically probes every worker and drives its liveness state machine:
//!
//! | was   | probe                   | transition  | effect                                   |
//! |-------|-------------------------|-------------|------------------------------------------|
//! | any   | no answer, below limit  | `Offline`   | `offline_count += 1`                     |
//! | Alive | no answer, hits limit   | `WentDead`  | dead, every object of the worker severed |
//! | Dead  | no answer               | `Offline`   | `offline_count += 1`                     |
//! | Dead  | answer                  | `Recovered` | configuration pushed, then alive         |
//! | Dead  | answer, not initialized | `Recovered` | as above, and objects unassigned         |
//! | Alive | answer, not initialized | `Restarted` | configuration pushed, objects unassigned |
//! | Alive | answer                  | `Healthy`   | `offline_count = 0`                      |
//!
//! Each sweep works on a snapshot of the registry so control-plane requests
//! are never blocked behind a probe.

use super::master::ClusterMaster;
use crate::config::ProbePolicy;
use crate::rpc::protocol::WorkerStatus;
use crate::slaves::types::{Liveness, Worker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    NoResponse,
    Responded(WorkerStatus),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Another failed probe; `offline_count` is the new count.
    Offline { offline_count: u32 },
    WentDead { offline_count: u32 },
    /// A dead worker answered. `restarted` when it lost its objects while dead.
    Recovered { restarted: bool },
    Restarted,
    Healthy,
}

/// Decides the transition for one probe result.
pub fn next_transition(
    liveness: Liveness,
    offline_count: u32,
    outcome: ProbeOutcome,
    threshold: u32,
) -> Transition {
    match (liveness, outcome) {
        (_, ProbeOutcome::NoResponse) => {
            let offline_count = offline_count.saturating_add(1);
            if liveness == Liveness::Alive && offline_count >= threshold {
                Transition::WentDead { offline_count }
            } else {
                Transition::Offline { offline_count }
            }
        }
        (Liveness::Dead, ProbeOutcome::Responded(status)) => Transition::Recovered {
            restarted: !status.initialized,
        },
        (Liveness::Alive, ProbeOutcome::Responded(status)) if !status.initialized => {
            Transition::Restarted
        }
        (Liveness::Alive, ProbeOutcome::Responded(_)) => Transition::Healthy,
    }
}

/// Whether a worker gets probed this cycle.
pub fn should_probe(worker: &Worker, policy: ProbePolicy, backoff: u32, threshold: u32) -> bool {
    let backoff = backoff.max(1);
    match policy {
        ProbePolicy::Legacy => worker.offline_count <= 1 || worker.offline_count % backoff == 0,
        ProbePolicy::Counted => {
            worker.offline_count < threshold || worker.skipped_cycles + 1 >= backoff
        }
    }
}

impl ClusterMaster {
    pub(super) async fn health_loop(self: std::sync::Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.health_interval());

        loop {
            interval.tick().await;
            self.health_sweep().await;
        }
    }

    /// One pass over every registered worker. Returns the transitions applied.
    pub async fn health_sweep(&self) -> Vec<(String, Transition)> {
        let mut applied = Vec::new();

        for worker in self.slaves.list() {
            let probe = should_probe(
                &worker,
                self.config.probe_policy,
                self.config.probe_backoff_cycles,
                self.config.offline_threshold,
            );

            if !probe {
                self.slaves.update(&worker.ip, |w| {
                    w.skipped_cycles = w.skipped_cycles.saturating_add(1)
                });
                continue;
            }

            let transition = self.check_worker(&worker).await;
            applied.push((worker.ip.clone(), transition));
        }

        applied
    }

    /// Probes one worker and applies the resulting transition.
    pub async fn check_worker(&self, worker: &Worker) -> Transition {
        let timeout = self.config.probe_timeout(worker.is_alive());
        let outcome = match self.client.status(&worker.addr(), timeout).await {
            Ok(status) => ProbeOutcome::Responded(status),
            Err(e) => {
                tracing::debug!("Probe of {} failed: {}", worker.addr(), e);
                ProbeOutcome::NoResponse
            }
        };

        let transition = next_transition(
            worker.liveness,
            worker.offline_count,
            outcome,
            self.config.offline_threshold,
        );

        self.apply_transition(worker, transition).await
    }

    /// Applies a transition; returns what was actually applied (a recovery whose
    /// configuration push fails is counted as another failed probe).
    async fn apply_transition(&self, worker: &Worker, transition: Transition) -> Transition {
        let addr = worker.addr();

        match transition {
            Transition::Offline { offline_count } => {
                self.slaves.update(&worker.ip, |w| {
                    w.offline_count = offline_count;
                    w.skipped_cycles = 0;
                });
            }
            Transition::WentDead { offline_count } => {
                tracing::warn!("Worker {} is offline", addr);
                self.slaves.update(&worker.ip, |w| {
                    w.offline_count = offline_count;
                    w.skipped_cycles = 0;
                    w.liveness = Liveness::Dead;
                });
                self.sever_worker(&worker.ip);
            }
            Transition::Recovered { restarted } => {
                tracing::info!("Worker {} is online", addr);
                if let Err(e) = self.push_configuration(worker).await {
                    tracing::warn!("Re-initializing worker {} failed: {}", addr, e);
                    let offline_count = worker.offline_count.saturating_add(1);
                    self.slaves.update(&worker.ip, |w| {
                        w.offline_count = offline_count;
                        w.skipped_cycles = 0;
                    });
                    return Transition::Offline { offline_count };
                }
                // Objects it still points at are gone from the worker
                if restarted {
                    self.sever_worker(&worker.ip);
                }
                self.slaves.update(&worker.ip, |w| {
                    w.liveness = Liveness::Alive;
                    w.offline_count = 0;
                    w.skipped_cycles = 0;
                });
            }
            Transition::Restarted => {
                tracing::warn!("Detected worker {} restart", addr);
                if let Err(e) = self.push_configuration(worker).await {
                    tracing::warn!("Re-initializing worker {} failed: {}", addr, e);
                }
                self.sever_worker(&worker.ip);
                self.slaves.update(&worker.ip, |w| {
                    w.offline_count = 0;
                    w.skipped_cycles = 0;
                });
            }
            Transition::Healthy => {
                self.slaves.update(&worker.ip, |w| {
                    w.offline_count = 0;
                    w.skipped_cycles = 0;
                });
            }
        }

        transition
    }

    /// Unassigns every object from a worker so the reconciler can place them again.
    fn sever_worker(&self, ip: &str) {
        let severed = self.objects.clear_worker(ip);
        self.slaves.clear_assignments(ip);
        if !severed.is_empty() {
            tracing::info!("Unassigned {} object(s) from {}", severed.len(), ip);
        }
    }
}
