//! The event type the loop dispatches on, and the scheduled-event wrapper
//! used by the binary heap in `shared`.

use std::cmp::Ordering;
use std::time::Instant;

use tokio::sync::oneshot;

use crate::status::Status;
use crate::types::{Job, Version, WorkerAddr};

/// The seven event cases handled by the event loop (SPEC_FULL.md §4.1).
pub enum Event {
    AddWorker { host: String, pubkey: [u8; 32] },
    NewJob(Job),
    WorkerIdle(WorkerAddr),
    VersionRefresh(WorkerAddr),
    WorkerFailed(WorkerAddr),
    WorkerVersions(WorkerAddr, Vec<Version>),
    Status(oneshot::Sender<Status>),
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::AddWorker { host, .. } => write!(f, "AddWorker({host})"),
            Event::NewJob(_) => write!(f, "NewJob"),
            Event::WorkerIdle(addr) => write!(f, "WorkerIdle({addr})"),
            Event::VersionRefresh(addr) => write!(f, "VersionRefresh({addr})"),
            Event::WorkerFailed(addr) => write!(f, "WorkerFailed({addr})"),
            Event::WorkerVersions(addr, _) => write!(f, "WorkerVersions({addr})"),
            Event::Status(_) => write!(f, "Status"),
        }
    }
}

/// An event tagged with its due time and an insertion sequence number, so
/// the heap orders by `(due, seq)` and ties resolve in insertion order.
pub struct Scheduled {
    pub due: Instant,
    pub seq: u64,
    pub event: Event,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}
impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    /// Reversed so `BinaryHeap` (a max-heap) pops the *earliest* due time
    /// first, breaking ties by insertion order.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}
