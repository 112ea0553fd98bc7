//! The `get_pool_status` snapshot and its wire-compatible JSON shape
//! (SPEC_FULL.md §6.3).

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::state::{PoolState, WorkerStatus};
use crate::types::Version;

/// `{sec, nsec}`, used for both a monotonic timestamp (relative to the
/// pool's start epoch) and a plain duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SecNsec {
    pub sec: u64,
    pub nsec: u32,
}

impl From<Duration> for SecNsec {
    fn from(d: Duration) -> Self {
        SecNsec {
            sec: d.as_secs(),
            nsec: d.subsec_nanos(),
        }
    }
}

/// Per-worker status entry.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerStatusEntry {
    pub addr: (String, String),
    pub disabled: Option<(SecNsec, SecNsec)>,
    pub versions: Vec<Version>,
    pub idle: bool,
}

/// A consistent snapshot of the pool, taken on the event loop
/// (SPEC_FULL.md §4.5).
#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub workers: Vec<WorkerStatusEntry>,
    pub job_queue_length: u64,
    pub event_queue_length: u64,
}

impl Status {
    /// Build a snapshot from the event-loop-local `PoolState` plus the
    /// two shared counters. `epoch` is the pool's start time, used to turn
    /// `last_check` (an opaque `Instant`) into a relative `{sec, nsec}`
    /// pair for serialization.
    pub fn snapshot(
        state: &PoolState,
        epoch: Instant,
        job_queue_length: u64,
        event_queue_length: u64,
    ) -> Self {
        let workers = state
            .iter_workers()
            .map(|worker| {
                let disabled = match &worker.status {
                    WorkerStatus::Ok => None,
                    WorkerStatus::Disabled {
                        last_check,
                        wait_interval,
                    } => Some((
                        SecNsec::from(last_check.saturating_duration_since(epoch)),
                        SecNsec::from(*wait_interval),
                    )),
                };
                WorkerStatusEntry {
                    addr: (worker.addr.host.clone(), hex::encode(worker.addr.pubkey)),
                    disabled,
                    versions: worker.versions.clone(),
                    idle: state.is_idle(&worker.addr.host),
                }
            })
            .collect();

        Status {
            workers,
            job_queue_length,
            event_queue_length,
        }
    }
}
