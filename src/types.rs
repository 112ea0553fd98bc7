//! Core data types shared across the pool: worker identity, versions, and
//! the job/response shapes that flow between clients and workers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a remote worker node: an ASCII hostname (the map key
/// everywhere in this crate) plus the Ed25519 verifying key used to check
/// its signed responses.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkerAddr {
    pub host: String,
    pub pubkey: [u8; 32],
}

impl WorkerAddr {
    pub fn new(host: impl Into<String>, pubkey: [u8; 32]) -> Self {
        Self {
            host: host.into(),
            pubkey,
        }
    }
}

impl fmt::Display for WorkerAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.host)
    }
}

/// An opaque compiler/toolchain version identifier. Totally ordered by
/// string comparison, which is what `get_available_versions` and the
/// per-worker version lists are sorted by.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(pub String);

impl Version {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Version {
    fn from(s: &str) -> Self {
        Version(s.to_string())
    }
}

impl From<String> for Version {
    fn from(s: String) -> Self {
        Version(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Merge `incoming` into `existing`, keeping the result sorted and
/// deduplicated (invariant 4 in SPEC_FULL.md §3).
pub fn merge_versions(existing: &mut Vec<Version>, incoming: &[Version]) {
    existing.extend(incoming.iter().cloned());
    existing.sort_unstable();
    existing.dedup();
}

/// A compile/run request handed to a worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    pub version: Version,
    pub source: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub stdin: String,
}

/// The successful output of a run on a worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// Errors that can be reported back to a client instead of a `RunResult`.
/// Only `Backend` exists today — every worker-side failure (no workers
/// present, RPC failure, signature mismatch) collapses to it, matching the
/// source design's single synthetic error case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum RunError {
    #[error("backend error: no worker could service this request")]
    Backend,
}

/// What a job's response channel is completed with: a real result from a
/// worker, or a synthetic backend error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RunResponse {
    Ok(RunResult),
    Err(RunError),
}

impl RunResponse {
    pub fn backend_error() -> Self {
        RunResponse::Err(RunError::Backend)
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, RunResponse::Ok(_))
    }
}

/// A pending job: the request plus the channel its response is delivered
/// on. The channel is a `oneshot::Sender`, the idiomatic Rust rendering of
/// "a callback invoked exactly once."
pub struct Job {
    pub request: RunRequest,
    pub respond_to: tokio::sync::oneshot::Sender<RunResponse>,
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job").field("request", &self.request).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_versions_sorts_and_dedups() {
        let mut existing = vec![Version::from("9.8.1"), Version::from("9.6.3")];
        merge_versions(&mut existing, &[Version::from("9.6.3"), Version::from("9.4.0")]);
        assert_eq!(
            existing,
            vec![
                Version::from("9.4.0"),
                Version::from("9.6.3"),
                Version::from("9.8.1"),
            ]
        );
    }

    #[test]
    fn run_response_backend_error_is_err() {
        assert!(!RunResponse::backend_error().is_ok());
    }

    proptest::proptest! {
        /// SPEC_FULL.md §8 property 4: `versions` is sorted and strictly
        /// increasing (deduplicated) after any merge.
        #[test]
        fn merge_versions_is_always_sorted_and_deduped(
            existing in proptest::collection::vec("[a-z0-9.]{1,8}", 0..12),
            incoming in proptest::collection::vec("[a-z0-9.]{1,8}", 0..12),
        ) {
            let mut existing: Vec<Version> = existing.into_iter().map(Version::from).collect();
            let incoming: Vec<Version> = incoming.into_iter().map(Version::from).collect();
            merge_versions(&mut existing, &incoming);

            for pair in existing.windows(2) {
                prop_assert!(pair[0] < pair[1]);
            }
        }
    }
}
