//! Error taxonomy for the public API. See SPEC_FULL.md §7 — no error ever
//! propagates out of the event loop itself; this enum covers only the
//! synchronous, caller-facing failures.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    /// `add_worker` was given a host containing a byte >= 128.
    #[error("worker host {0:?} contains a non-ASCII byte")]
    NonAsciiHost(String),

    /// The event loop task is gone (panicked, or the pool was shut down).
    /// This should not happen in normal operation; it exists so callers
    /// get a typed error instead of a channel panic.
    #[error("pool event loop is no longer running")]
    LoopGone,
}
