//! Pool configuration. Mirrors this codebase's usual pattern of a small
//! config struct with sane defaults, constructible from environment
//! variables at the call site the same way a `SERVER_PORT`/`DATABASE_URL`
//! pair is read in a `main.rs`.

use std::time::Duration;

/// Admission and health-check tuning for a `WPool`.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of jobs that may be admitted but not yet dispatched
    /// to a worker. `submit_job` returns `None` once this is reached.
    pub max_queued_jobs: u64,

    /// Seed for the pool's internal RNG (worker selection). Fixed by
    /// default for reproducible tests; override for production so
    /// restarts don't reuse the same selection sequence.
    pub rng_seed: u64,

    /// Timeout applied to each outbound HTTP call to a worker.
    pub worker_request_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_queued_jobs: 64,
            rng_seed: 0,
            worker_request_timeout: Duration::from_secs(10),
        }
    }
}

impl PoolConfig {
    /// Read `max_queued_jobs` and `worker_request_timeout` (seconds) from
    /// `MAX_QUEUED_JOBS` / `WORKER_REQUEST_TIMEOUT_SECS`, falling back to
    /// `PoolConfig::default()` for anything unset or unparsable.
    pub fn from_env() -> Self {
        let default = Self::default();
        let max_queued_jobs = std::env::var("MAX_QUEUED_JOBS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default.max_queued_jobs);
        let worker_request_timeout = std::env::var("WORKER_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(default.worker_request_timeout);
        let rng_seed = std::env::var("WPOOL_RNG_SEED")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(|| rand::random());

        Self {
            max_queued_jobs,
            rng_seed,
            worker_request_timeout,
        }
    }
}
