//! Per-attempt timeout watcher.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::cancel::CancelState;
use crate::latch::{Outcome, RunId};

/// Arm a watcher that times out `run` after `timeout`.
///
/// When it fires, the watcher settles the latch as timed out and cancels the
/// attempt's token, but only if `run` is still current and unsettled. A watcher
/// whose run was superseded or already decided does nothing, so the caller may
/// abort it or simply let it lapse. The watcher logs inside the caller's span.
pub(crate) fn arm(
    state: Arc<CancelState>,
    run: RunId,
    timeout: Duration,
    attempt: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        if state.latch.settle(run, Outcome::TimedOut) {
            tracing::warn!(%run, ?timeout, "attempt timed out");
            attempt.cancel();
        } else {
            tracing::trace!(
                %run,
                current = %state.latch.current_run(),
                "stale timeout watcher ignored"
            );
        }
    }
    .in_current_span())
}

#[cfg(test)]
mod watcher_tests {
    use super::*;
    use crate::cancel::CancelHandle;

    #[tokio::test(start_paused = true)]
    async fn test_fires_for_current_run() {
        let chain = CancelHandle::new_chain();
        let run = chain.state().latch.mint();
        let token = chain.attempt_token();

        arm(
            Arc::clone(chain.state()),
            run,
            Duration::from_millis(50),
            token.clone(),
        )
        .await
        .unwrap();

        assert!(token.is_cancelled());
        assert_eq!(chain.state().latch.outcome_of(run), Some(Outcome::TimedOut));
        assert!(!chain.is_canceled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_run_is_left_alone() {
        let chain = CancelHandle::new_chain();
        let stale = chain.state().latch.mint();
        let token = chain.attempt_token();
        let watcher = arm(
            Arc::clone(chain.state()),
            stale,
            Duration::from_millis(50),
            token.clone(),
        );

        let next = chain.state().latch.mint();
        watcher.await.unwrap();

        assert!(!token.is_cancelled());
        assert_eq!(chain.state().latch.outcome_of(next), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settled_run_is_left_alone() {
        let chain = CancelHandle::new_chain();
        let run = chain.state().latch.mint();
        let token = chain.attempt_token();
        let watcher = arm(
            Arc::clone(chain.state()),
            run,
            Duration::from_millis(50),
            token.clone(),
        );

        assert!(chain.state().latch.settle(run, Outcome::Succeeded));
        watcher.await.unwrap();

        assert!(!token.is_cancelled());
        assert_eq!(chain.state().latch.outcome_of(run), Some(Outcome::Succeeded));
    }
}
