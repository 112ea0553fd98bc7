//! Cross-task shared state: the scheduled-event queue, the admitted-job
//! counter, and the available-versions list, all behind one mutex plus a
//! `Notify` wakeup latch (SPEC_FULL.md §3, §5).

use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use tokio::sync::Notify;

use crate::event::{Event, Scheduled};
use crate::types::Version;

struct Inner {
    queue: BinaryHeap<Scheduled>,
    num_queued_jobs: u64,
    versions: Vec<Version>,
}

/// The head of the queue, as seen by the loop's peek step.
pub enum DueOutcome {
    /// A due event was popped and is ready to dispatch.
    Due(Event),
    /// The head is not due yet; sleep until this instant (or until woken).
    Future(Instant),
    /// Nothing queued; sleep until woken.
    Empty,
}

/// State reachable from any client task, guarded by a single mutex so
/// compound operations (peek-then-pop, check-then-insert) are atomic.
pub struct Shared {
    inner: Mutex<Inner>,
    wakeup: Notify,
    seq: AtomicU64,
}

impl Shared {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                queue: BinaryHeap::new(),
                num_queued_jobs: 0,
                versions: Vec::new(),
            }),
            wakeup: Notify::new(),
            seq: AtomicU64::new(0),
        }
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Push `event` onto the queue for `due`, then signal the wakeup latch.
    /// Every insertion path in this crate goes through this one function so
    /// the "every enqueue signals wakeup" rule (SPEC_FULL.md §4.1) cannot be
    /// forgotten at a call site.
    pub fn push(&self, due: Instant, event: Event) {
        let seq = self.next_seq();
        {
            let mut inner = self.inner.lock().unwrap();
            inner.queue.push(Scheduled { due, seq, event });
        }
        self.wakeup.notify_one();
    }

    /// Admission's atomic check-then-increment-then-enqueue transaction
    /// (SPEC_FULL.md §4.2). Returns `true` if the job was admitted.
    pub fn try_admit(&self, max_queued_jobs: u64, due: Instant, event: Event) -> bool {
        let seq = self.next_seq();
        let admitted = {
            let mut inner = self.inner.lock().unwrap();
            if inner.num_queued_jobs >= max_queued_jobs {
                false
            } else {
                inner.num_queued_jobs += 1;
                inner.queue.push(Scheduled { due, seq, event });
                true
            }
        };
        if admitted {
            self.wakeup.notify_one();
        }
        admitted
    }

    /// Decrement the queued-job counter. Called exactly once per admitted
    /// job, at the moment it is dispatched or synthetically failed.
    pub fn decrement_queued_jobs(&self) {
        let mut inner = self.inner.lock().unwrap();
        debug_assert!(inner.num_queued_jobs > 0);
        inner.num_queued_jobs = inner.num_queued_jobs.saturating_sub(1);
    }

    pub fn num_queued_jobs(&self) -> u64 {
        self.inner.lock().unwrap().num_queued_jobs
    }

    pub fn event_queue_len(&self) -> usize {
        self.inner.lock().unwrap().queue.len()
    }

    /// Peek-then-pop the head of the queue against `now` in one critical
    /// section (SPEC_FULL.md §4.1 step 2).
    pub fn try_pop_due(&self, now: Instant) -> DueOutcome {
        let mut inner = self.inner.lock().unwrap();
        match inner.queue.peek() {
            None => DueOutcome::Empty,
            Some(head) if head.due <= now => {
                let scheduled = inner.queue.pop().expect("peeked Some");
                DueOutcome::Due(scheduled.event)
            }
            Some(head) => DueOutcome::Future(head.due),
        }
    }

    pub fn versions(&self) -> Vec<Version> {
        self.inner.lock().unwrap().versions.clone()
    }

    pub fn merge_versions(&self, incoming: &[Version]) {
        let mut inner = self.inner.lock().unwrap();
        crate::types::merge_versions(&mut inner.versions, incoming);
    }

    /// Wait for either the wakeup latch or `deadline`, whichever comes
    /// first.
    pub async fn wait_until(&self, deadline: Instant) {
        tokio::select! {
            _ = self.wakeup.notified() => {}
            _ = tokio::time::sleep_until(deadline.into()) => {}
        }
    }

    /// Wait unconditionally for the wakeup latch.
    pub async fn wait_forever(&self) {
        self.wakeup.notified().await;
    }
}

impl Default for Shared {
    fn default() -> Self {
        Self::new()
    }
}
