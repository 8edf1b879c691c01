//! Retry observation hook.

use std::time::Duration;

use crate::error::FlowError;

/// Information about a failed attempt that is about to be retried.
#[derive(Debug, Clone)]
pub struct RetryEvent<'a, E> {
    /// Zero-based index of the step within the chain.
    pub step: usize,
    /// Which attempt just failed (1-indexed).
    pub attempt: u32,
    /// The error from the failed attempt.
    pub error: &'a FlowError<E>,
    /// Delay before the next attempt starts.
    pub next_delay: Duration,
}

/// Synchronous observer called before each retry.
pub(crate) type RetryHook<E> = dyn Fn(&RetryEvent<'_, E>) + Send + Sync;
