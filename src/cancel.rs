//! Chain-wide cooperative cancellation.
//!
//! Every chain owns one [`CancellationToken`]. Each attempt runs with a child
//! of that token, so the timeout watcher can stop a single attempt while a
//! [`CancelHandle::cancel`] call stops the whole chain.
//!
//! Cancellation is cooperative: a body only stops early if it awaits
//! [`CancelHandle::cancelled`] or checks
//! [`CancelHandle::is_cancellation_requested`]. A body that ignores the request
//! also defeats its timeout.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::latch::OutcomeLatch;

/// State shared by a chain, its handles and its timeout watchers.
#[derive(Debug, Default)]
pub(crate) struct CancelState {
    canceled: AtomicBool,
    token: CancellationToken,
    pub(crate) latch: OutcomeLatch,
}

/// Capability to cancel a chain and to observe cancellation.
///
/// Handles are cheap to clone and may be used from the step body, another task
/// or another thread. [`Chain::cancel_handle`](crate::Chain::cancel_handle)
/// returns one for external holders; each step body receives one scoped to its
/// current attempt.
///
/// # Example
///
/// ```rust
/// use millrace::{Chain, FlowError};
///
/// # tokio_test::block_on(async {
/// let chain = Chain::<u32, String>::new(0);
/// let handle = chain.cancel_handle();
/// handle.cancel();
/// handle.cancel(); // no-op
///
/// let result = chain
///     .step(|n, _| Box::pin(async move { *n += 1; Ok(()) }))
///     .await
///     .result();
/// assert_eq!(result, Err(FlowError::Canceled));
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct CancelHandle {
    state: Arc<CancelState>,
    token: CancellationToken,
}

impl CancelHandle {
    pub(crate) fn new_chain() -> Self {
        let state = Arc::new(CancelState::default());
        let token = state.token.clone();
        Self { state, token }
    }

    /// A handle whose observation side follows one attempt's token.
    pub(crate) fn for_attempt(&self, token: CancellationToken) -> Self {
        Self {
            state: Arc::clone(&self.state),
            token,
        }
    }

    pub(crate) fn state(&self) -> &Arc<CancelState> {
        &self.state
    }

    /// Fresh child of the chain token, used to scope one attempt.
    pub(crate) fn attempt_token(&self) -> CancellationToken {
        self.state.token.child_token()
    }

    /// Request cancellation of the whole chain.
    ///
    /// Idempotent: the first call flips the chain flag, marks the in-flight
    /// attempt as canceled and signals the running body; later calls do nothing.
    pub fn cancel(&self) {
        if self.state.canceled.swap(true, Ordering::SeqCst) {
            return;
        }
        let run = self.state.latch.preempt_with_cancel();
        tracing::debug!(run_id = run.map(|r| r.get()), "chain cancellation requested");
        self.state.token.cancel();
    }

    /// Returns true once the chain has been canceled. Never resets.
    pub fn is_canceled(&self) -> bool {
        self.state.canceled.load(Ordering::SeqCst)
    }

    /// Returns true if the work holding this handle should stop: either the
    /// chain was canceled or the current attempt timed out.
    pub fn is_cancellation_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes when [`is_cancellation_requested`](Self::is_cancellation_requested)
    /// becomes true.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// A child token for handing to APIs built on `tokio_util`.
    ///
    /// The child is cancelled with this handle's attempt (timeout or chain
    /// cancel). Cancelling the child itself affects neither.
    ///
    /// ```rust
    /// use millrace::{Chain, StepPolicy};
    /// use std::time::Duration;
    ///
    /// # tokio_test::block_on(async {
    /// let chain = Chain::<(), String>::new(())
    ///     .step_with(
    ///         StepPolicy::default().with_timeout(Duration::from_millis(10)),
    ///         |_, cancel| Box::pin(async move {
    ///             let token = cancel.child_token();
    ///             token.cancelled().await;
    ///             Err("gave up".to_string())
    ///         }),
    ///     )
    ///     .await;
    ///
    /// assert!(chain.terminal_error().is_some_and(|e| e.is_timeout()));
    /// # });
    /// ```
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }
}
