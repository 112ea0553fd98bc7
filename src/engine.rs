//! The event loop: the single task that owns `PoolState` and drains the
//! scheduled-event queue (SPEC_FULL.md §4.1). This is the 40% of the
//! design the spec calls "the hard part" — every mutation of worker
//! health, the idle set, and the backlog happens here and only here.

use std::sync::Arc;
use std::time::Instant;

use ed25519_dalek::SigningKey;
use tokio::sync::watch;

use crate::backoff;
use crate::event::Event;
use crate::shared::{DueOutcome, Shared};
use crate::state::{PoolState, Worker, WorkerStatus};
use crate::status::Status;
use crate::types::{Job, RunResponse, Version, WorkerAddr};
use crate::worker_client::WorkerClient;

/// Everything the event loop needs that doesn't change for the life of the
/// pool. Cloned (cheaply, via `Arc`) into every background task it spawns.
#[derive(Clone)]
pub struct Context {
    pub shared: Arc<Shared>,
    pub worker_client: Arc<dyn WorkerClient>,
    pub secret_key: Arc<SigningKey>,
    pub epoch: Instant,
}

/// Runs until `shutdown` fires. Intended to be the body of a single
/// `tokio::spawn`.
pub async fn run(ctx: Context, mut state: PoolState, mut shutdown: watch::Receiver<bool>) {
    tracing::info!("pool event loop started");
    loop {
        if *shutdown.borrow() {
            tracing::info!("pool event loop shutting down");
            return;
        }

        let now = Instant::now();
        match ctx.shared.try_pop_due(now) {
            DueOutcome::Due(event) => {
                handle_event(&ctx, &mut state, event, now);
            }
            DueOutcome::Future(due) => {
                tokio::select! {
                    _ = ctx.shared.wait_until(due) => {}
                    _ = shutdown.changed() => {}
                }
            }
            DueOutcome::Empty => {
                tokio::select! {
                    _ = ctx.shared.wait_forever() => {}
                    _ = shutdown.changed() => {}
                }
            }
        }
    }
}

/// Dispatch table mirroring SPEC_FULL.md §4.1's handler table one arm per
/// event case.
fn handle_event(ctx: &Context, state: &mut PoolState, event: Event, now: Instant) {
    match event {
        Event::AddWorker { host, pubkey } => handle_add_worker(ctx, state, host, pubkey, now),
        Event::NewJob(job) => handle_new_job(ctx, state, job),
        Event::WorkerIdle(addr) => handle_worker_idle(ctx, state, addr),
        Event::VersionRefresh(addr) => {
            spawn_version_refresh(ctx.clone(), addr);
        }
        Event::WorkerFailed(addr) => handle_worker_failed(ctx, state, addr, now),
        Event::WorkerVersions(addr, versions) => handle_worker_versions(ctx, state, addr, versions),
        Event::Status(respond_to) => handle_status(ctx, state, respond_to),
    }
}

fn handle_add_worker(ctx: &Context, state: &mut PoolState, host: String, pubkey: [u8; 32], now: Instant) {
    let addr = WorkerAddr::new(host.clone(), pubkey);
    if state.contains_worker(&host) {
        tracing::info!(%host, "worker already registered, scheduling a refresh anyway");
    } else {
        state.insert_worker(Worker {
            addr: addr.clone(),
            status: WorkerStatus::Disabled {
                last_check: now,
                wait_interval: std::time::Duration::ZERO,
            },
            versions: Vec::new(),
        });
        tracing::info!(%host, "worker registered");
    }
    ctx.shared.push(now, Event::VersionRefresh(addr));
}

fn handle_new_job(ctx: &Context, state: &mut PoolState, job: Job) {
    if !state.has_workers() {
        ctx.shared.decrement_queued_jobs();
        tracing::warn!("no workers registered, failing job immediately");
        let respond_to = job.respond_to;
        tokio::spawn(async move {
            let _ = respond_to.send(RunResponse::backend_error());
        });
        return;
    }

    match state.take_random_idle() {
        Some(addr) => {
            ctx.shared.decrement_queued_jobs();
            spawn_dispatch(ctx.clone(), addr, job);
        }
        None => {
            state.push_backlog(job);
        }
    }
}

fn handle_worker_idle(ctx: &Context, state: &mut PoolState, addr: WorkerAddr) {
    let disabled = state
        .worker(&addr.host)
        .map(|w| w.status.is_disabled())
        .unwrap_or(false);

    if disabled {
        // A health check is in flight for this worker; it owns the
        // worker until it resolves.
        state.remove_idle(&addr.host);
        return;
    }

    match state.pop_backlog() {
        Some(job) => {
            ctx.shared.decrement_queued_jobs();
            state.remove_idle(&addr.host);
            spawn_dispatch(ctx.clone(), addr, job);
        }
        None => {
            state.mark_idle(&addr.host);
        }
    }
}

fn spawn_version_refresh(ctx: Context, addr: WorkerAddr) {
    tokio::spawn(async move {
        match ctx.worker_client.get_versions(&addr).await {
            Some(versions) => ctx.shared.push(Instant::now(), Event::WorkerVersions(addr, versions)),
            None => ctx.shared.push(Instant::now(), Event::WorkerFailed(addr)),
        }
    });
}

fn handle_worker_failed(ctx: &Context, state: &mut PoolState, addr: WorkerAddr, now: Instant) {
    let Some(worker) = state.worker_mut(&addr.host) else {
        tracing::warn!(host = %addr.host, "WorkerFailed for unknown worker, dropping");
        return;
    };

    let iv = match &worker.status {
        WorkerStatus::Ok => backoff::START_IV,
        WorkerStatus::Disabled { wait_interval, .. } => backoff::next_iv(*wait_interval),
    };
    worker.status = WorkerStatus::Disabled {
        last_check: now,
        wait_interval: iv,
    };
    tracing::warn!(host = %addr.host, interval_ms = iv.as_millis() as u64, "worker health check failed");

    ctx.shared.push(now + iv, Event::VersionRefresh(addr));
}

fn handle_worker_versions(ctx: &Context, state: &mut PoolState, addr: WorkerAddr, versions: Vec<Version>) {
    let recovered = match state.worker(&addr.host) {
        Some(worker) => worker.status.is_disabled(),
        None => {
            tracing::warn!(host = %addr.host, "WorkerVersions for unknown worker, dropping");
            return;
        }
    };

    ctx.shared.merge_versions(&versions);

    let worker = state.worker_mut(&addr.host).expect("checked present above");
    worker.status = WorkerStatus::Ok;
    worker.versions = versions;

    if recovered {
        tracing::info!(host = %addr.host, "worker recovered");
        ctx.shared.push(Instant::now(), Event::WorkerIdle(addr));
    }
}

fn handle_status(ctx: &Context, state: &PoolState, respond_to: tokio::sync::oneshot::Sender<Status>) {
    let status = Status::snapshot(
        state,
        ctx.epoch,
        ctx.shared.num_queued_jobs(),
        ctx.shared.event_queue_len() as u64,
    );
    tokio::spawn(async move {
        let _ = respond_to.send(status);
    });
}

/// §4.4: run the job on `addr` off the event loop, then report the
/// outcome back through the queue.
fn spawn_dispatch(ctx: Context, addr: WorkerAddr, job: Job) {
    tokio::spawn(async move {
        let Job { request, respond_to } = job;
        match ctx.worker_client.run_job(&ctx.secret_key, &addr, &request).await {
            Some(response) => {
                let _ = respond_to.send(response);
                ctx.shared.push(Instant::now(), Event::WorkerIdle(addr));
            }
            None => {
                let _ = respond_to.send(RunResponse::backend_error());
                ctx.shared.push(Instant::now(), Event::WorkerFailed(addr));
            }
        }
    });
}
