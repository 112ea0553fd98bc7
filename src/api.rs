//! The public API surface (SPEC_FULL.md §6.1): `WPool::new`, `submit_job`,
//! `add_worker`, `get_available_versions`, `get_pool_status`.

use std::sync::Arc;
use std::time::Instant;

use ed25519_dalek::SigningKey;
use tokio::sync::{oneshot, watch};

use crate::config::PoolConfig;
use crate::engine::{self, Context};
use crate::error::PoolError;
use crate::event::Event;
use crate::state::PoolState;
use crate::status::Status;
use crate::types::{Job, RunRequest, RunResponse, Version, WorkerAddr};
use crate::worker_client::{HttpWorkerClient, WorkerClient};

/// Handle to a running worker pool. Cheap to clone (an `Arc` around the
/// shared state plus a channel handle); every clone talks to the same
/// event-loop task.
#[derive(Clone)]
pub struct WPool {
    ctx: Context,
    max_queued_jobs: u64,
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl WPool {
    /// Construct a pool using the production `HttpWorkerClient` and spawn
    /// its event-loop task.
    pub fn new(secret_key: SigningKey, config: PoolConfig) -> Self {
        let worker_client = Arc::new(HttpWorkerClient::new(config.worker_request_timeout));
        Self::with_worker_client(secret_key, config, worker_client)
    }

    /// Construct a pool against an arbitrary `WorkerClient` implementation
    /// — the seam integration tests use to stub out the network.
    pub fn with_worker_client(
        secret_key: SigningKey,
        config: PoolConfig,
        worker_client: Arc<dyn WorkerClient>,
    ) -> Self {
        let shared = Arc::new(crate::shared::Shared::new());
        let ctx = Context {
            shared,
            worker_client,
            secret_key: Arc::new(secret_key),
            epoch: Instant::now(),
        };
        let state = PoolState::new(config.rng_seed);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let loop_ctx = ctx.clone();
        tokio::spawn(engine::run(loop_ctx, state, shutdown_rx));

        Self {
            ctx,
            max_queued_jobs: config.max_queued_jobs,
            shutdown_tx: Arc::new(shutdown_tx),
        }
    }

    /// Submit a job for execution. Returns `None` iff the pool was at
    /// capacity (`max_queued_jobs`); otherwise the worker's response, or a
    /// synthetic backend-error response if no worker could service it.
    pub async fn submit_job(&self, request: RunRequest) -> Option<RunResponse> {
        let (tx, rx) = oneshot::channel();
        let job = Job {
            request,
            respond_to: tx,
        };
        let admitted = self.ctx.shared.try_admit(
            self.max_queued_jobs,
            Instant::now(),
            Event::NewJob(job),
        );
        if !admitted {
            return None;
        }
        match rx.await {
            Ok(response) => Some(response),
            Err(_) => Some(RunResponse::backend_error()),
        }
    }

    /// Register a new worker. Errors synchronously if `host` is not ASCII;
    /// otherwise the registration is processed asynchronously by the
    /// event loop (SPEC_FULL.md §4.3).
    pub fn add_worker(&self, host: String, pubkey: [u8; 32]) -> Result<(), PoolError> {
        if host.bytes().any(|b| b >= 128) {
            return Err(PoolError::NonAsciiHost(host));
        }
        self.ctx.shared.push(Instant::now(), Event::AddWorker { host, pubkey });
        Ok(())
    }

    /// Sorted, deduplicated union of every worker's advertised versions.
    pub fn get_available_versions(&self) -> Vec<Version> {
        self.ctx.shared.versions()
    }

    /// A consistent snapshot of the pool, taken on the event loop.
    pub async fn get_pool_status(&self) -> Result<Status, PoolError> {
        let (tx, rx) = oneshot::channel();
        self.ctx.shared.push(Instant::now(), Event::Status(tx));
        rx.await.map_err(|_| PoolError::LoopGone)
    }

    /// Stop the event-loop task. Not part of the source design (see
    /// SPEC_FULL.md §9) — added so tests and embedding binaries can tear a
    /// pool down cleanly instead of leaking the task.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rand::rngs::OsRng;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// A `WorkerClient` whose answers are scripted per-call, for the
    /// scenario tests in SPEC_FULL.md §8.
    struct ScriptedClient {
        get_versions: Mutex<Vec<Option<Vec<Version>>>>,
        run_job_result: RunResponse,
        run_job_calls: AtomicUsize,
    }

    #[async_trait]
    impl WorkerClient for ScriptedClient {
        async fn get_versions(&self, _addr: &WorkerAddr) -> Option<Vec<Version>> {
            let mut script = self.get_versions.lock().unwrap();
            if script.is_empty() {
                None
            } else {
                script.remove(0)
            }
        }

        async fn run_job(
            &self,
            _secret_key: &SigningKey,
            _addr: &WorkerAddr,
            _request: &RunRequest,
        ) -> Option<RunResponse> {
            self.run_job_calls.fetch_add(1, Ordering::SeqCst);
            Some(self.run_job_result.clone())
        }
    }

    fn test_request() -> RunRequest {
        RunRequest {
            version: Version::from("9.8.1"),
            source: "main = print 1".into(),
            args: vec![],
            stdin: String::new(),
        }
    }

    #[tokio::test]
    async fn empty_pool_rejects_with_backend_error() {
        let client = Arc::new(ScriptedClient {
            get_versions: Mutex::new(vec![]),
            run_job_result: RunResponse::backend_error(),
            run_job_calls: AtomicUsize::new(0),
        });
        let pool = WPool::with_worker_client(
            SigningKey::generate(&mut OsRng),
            PoolConfig::default(),
            client,
        );

        let response = pool.submit_job(test_request()).await.unwrap();
        assert!(!response.is_ok());
        assert_eq!(pool.get_available_versions(), vec![]);

        let status = pool.get_pool_status().await.unwrap();
        assert_eq!(status.job_queue_length, 0);
        pool.shutdown();
    }

    #[tokio::test]
    async fn capacity_rejects_excess_submissions() {
        let client = Arc::new(ScriptedClient {
            get_versions: Mutex::new(vec![]),
            run_job_result: RunResponse::backend_error(),
            run_job_calls: AtomicUsize::new(0),
        });
        let mut config = PoolConfig::default();
        config.max_queued_jobs = 2;
        let pool = WPool::with_worker_client(SigningKey::generate(&mut OsRng), config, client);

        let (r1, r2, r3) = tokio::join!(
            pool.submit_job(test_request()),
            pool.submit_job(test_request()),
            pool.submit_job(test_request()),
        );
        let results = [r1, r2, r3];
        let admitted = results.iter().filter(|r| r.is_some()).count();
        let rejected = results.iter().filter(|r| r.is_none()).count();
        assert_eq!(admitted, 2);
        assert_eq!(rejected, 1);
        pool.shutdown();
    }

    #[tokio::test]
    async fn happy_path_dispatches_to_recovered_worker() {
        let client = Arc::new(ScriptedClient {
            get_versions: Mutex::new(vec![Some(vec![
                Version::from("9.6.3"),
                Version::from("9.8.1"),
            ])]),
            run_job_result: RunResponse::Ok(crate::types::RunResult {
                stdout: "1".into(),
                stderr: String::new(),
                exit_code: 0,
            }),
            run_job_calls: AtomicUsize::new(0),
        });
        let pool = WPool::with_worker_client(
            SigningKey::generate(&mut OsRng),
            PoolConfig::default(),
            client,
        );

        pool.add_worker("worker-1".into(), [7u8; 32]).unwrap();

        // Give the event loop a moment to process AddWorker -> VersionRefresh.
        let mut versions = pool.get_available_versions();
        for _ in 0..50 {
            if !versions.is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            versions = pool.get_available_versions();
        }
        assert_eq!(versions, vec![Version::from("9.6.3"), Version::from("9.8.1")]);

        let status = pool.get_pool_status().await.unwrap();
        assert!(status.workers[0].idle);

        let response = pool.submit_job(test_request()).await.unwrap();
        assert!(response.is_ok());
        pool.shutdown();
    }

    #[tokio::test]
    async fn add_worker_rejects_non_ascii_host() {
        let client = Arc::new(ScriptedClient {
            get_versions: Mutex::new(vec![]),
            run_job_result: RunResponse::backend_error(),
            run_job_calls: AtomicUsize::new(0),
        });
        let pool = WPool::with_worker_client(
            SigningKey::generate(&mut OsRng),
            PoolConfig::default(),
            client,
        );

        let err = pool.add_worker("wörker".into(), [0u8; 32]).unwrap_err();
        assert_eq!(err, PoolError::NonAsciiHost("wörker".into()));
        pool.shutdown();
    }
}
