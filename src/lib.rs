//! A dispatcher for a pool of remote compile/run workers: admission
//! control on the job queue, health-tracked exponential backoff for
//! unreachable workers, and event-loop-driven fan-out of jobs to idle
//! workers.
//!
//! The event loop (`engine::run`) is the only place pool state is
//! mutated; everything else talks to it through [`Shared`](shared::Shared)'s
//! queue and the [`WPool`] handle.

mod backoff;
mod config;
mod engine;
mod error;
mod event;
mod shared;
mod state;
mod status;
mod types;
mod worker_client;

mod api;

pub use api::WPool;
pub use config::PoolConfig;
pub use error::PoolError;
pub use status::{SecNsec, Status, WorkerStatusEntry};
pub use types::{merge_versions, Job, RunError, RunRequest, RunResponse, RunResult, Version, WorkerAddr};
pub use worker_client::{HttpWorkerClient, WorkerClient};
