//! Merge target for drained offline writes.
//!
//! The drain hands pending records to a `SyncUpstream` and merges whatever it
//! returns. `LocalUpstream` echoes the records back, so the merge degrades to
//! a local union; a remote backend replaces it without touching the
//! repository.

use crate::model::task::Task;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Failure envelope returned by an upstream exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamError {
    pub upstream_id: String,
    pub code: String,
    pub message: String,
    pub retryable: bool,
}

impl UpstreamError {
    pub fn new(
        upstream_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
        retryable: bool,
    ) -> Self {
        Self {
            upstream_id: upstream_id.into(),
            code: code.into(),
            message: message.into(),
            retryable,
        }
    }
}

impl Display for UpstreamError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}:{}] {} (retryable={})",
            self.upstream_id, self.code, self.message, self.retryable
        )
    }
}

impl Error for UpstreamError {}

/// Exchange step of the offline drain.
pub trait SyncUpstream: Send + Sync {
    fn upstream_id(&self) -> &str;

    /// Sends pending records and returns the authoritative versions to merge.
    ///
    /// Records left out of the result stay queued for the next drain.
    fn push_pending(&self, pending: &[Task]) -> Result<Vec<Task>, UpstreamError>;
}

/// Upstream for the local-only client: accepts every record unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalUpstream;

impl SyncUpstream for LocalUpstream {
    fn upstream_id(&self) -> &str {
        "local"
    }

    fn push_pending(&self, pending: &[Task]) -> Result<Vec<Task>, UpstreamError> {
        Ok(pending
            .iter()
            .cloned()
            .map(|mut task| {
                task.pending_sync = false;
                task
            })
            .collect())
    }
}
