//! `PoolState`: the event-loop-local registry of workers, the idle set, and
//! the backlog. Never wrapped in a mutex — it is moved into the event-loop
//! task at construction and touched only from there (SPEC_FULL.md §3).

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::seq::IteratorRandom;
use rand::SeedableRng;

use crate::types::{Job, Version, WorkerAddr};

/// A worker's health status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerStatus {
    Ok,
    Disabled { last_check: Instant, wait_interval: Duration },
}

impl WorkerStatus {
    pub fn is_disabled(&self) -> bool {
        matches!(self, WorkerStatus::Disabled { .. })
    }
}

/// A registered worker: its identity, health, and advertised versions.
#[derive(Debug, Clone)]
pub struct Worker {
    pub addr: WorkerAddr,
    pub status: WorkerStatus,
    pub versions: Vec<Version>,
}

/// The event-loop-owned pool state.
pub struct PoolState {
    workers: std::collections::HashMap<String, Worker>,
    idle: HashSet<String>,
    backlog: VecDeque<Job>,
    rng: StdRng,
}

impl PoolState {
    pub fn new(rng_seed: u64) -> Self {
        Self {
            workers: std::collections::HashMap::new(),
            idle: HashSet::new(),
            backlog: VecDeque::new(),
            rng: StdRng::seed_from_u64(rng_seed),
        }
    }

    pub fn worker(&self, host: &str) -> Option<&Worker> {
        self.workers.get(host)
    }

    pub fn worker_mut(&mut self, host: &str) -> Option<&mut Worker> {
        self.workers.get_mut(host)
    }

    pub fn contains_worker(&self, host: &str) -> bool {
        self.workers.contains_key(host)
    }

    pub fn insert_worker(&mut self, worker: Worker) {
        self.workers.insert(worker.addr.host.clone(), worker);
    }

    pub fn is_idle(&self, host: &str) -> bool {
        self.idle.contains(host)
    }

    pub fn mark_idle(&mut self, host: &str) {
        self.idle.insert(host.to_string());
    }

    pub fn remove_idle(&mut self, host: &str) {
        self.idle.remove(host);
    }

    /// Remove and return a uniformly random idle worker's address, if any.
    pub fn take_random_idle(&mut self) -> Option<WorkerAddr> {
        let host = self.idle.iter().choose(&mut self.rng).cloned()?;
        self.idle.remove(&host);
        self.workers.get(&host).map(|w| w.addr.clone())
    }

    pub fn has_workers(&self) -> bool {
        !self.workers.is_empty()
    }

    pub fn push_backlog(&mut self, job: Job) {
        self.backlog.push_back(job);
    }

    pub fn pop_backlog(&mut self) -> Option<Job> {
        self.backlog.pop_front()
    }

    pub fn backlog_is_empty(&self) -> bool {
        self.backlog.is_empty()
    }

    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    /// Iterate all workers, for `Status` snapshot building.
    pub fn iter_workers(&self) -> impl Iterator<Item = &Worker> {
        self.workers.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(host: &str) -> WorkerAddr {
        WorkerAddr::new(host, [0u8; 32])
    }

    #[test]
    fn idle_set_stays_subset_of_ok_workers() {
        let mut state = PoolState::new(0);
        state.insert_worker(Worker {
            addr: addr("w1"),
            status: WorkerStatus::Ok,
            versions: vec![],
        });
        state.mark_idle("w1");
        assert!(state.is_idle("w1"));

        state.worker_mut("w1").unwrap().status = WorkerStatus::Disabled {
            last_check: Instant::now(),
            wait_interval: Duration::ZERO,
        };
        // A disabled worker must be evicted from idle by the caller before
        // this invariant holds; exercised by the engine's handlers.
        state.remove_idle("w1");
        assert!(!state.is_idle("w1"));
    }

    #[test]
    fn take_random_idle_only_returns_idle_workers() {
        let mut state = PoolState::new(42);
        state.insert_worker(Worker {
            addr: addr("w1"),
            status: WorkerStatus::Ok,
            versions: vec![],
        });
        assert!(state.take_random_idle().is_none());
        state.mark_idle("w1");
        let picked = state.take_random_idle().unwrap();
        assert_eq!(picked.host, "w1");
        assert!(!state.is_idle("w1"));
    }
}
