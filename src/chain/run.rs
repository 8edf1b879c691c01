//! The per-step retry loop.
//!
//! ```text
//! loop {
//!   ├─► mint run id (supersedes any earlier watcher)
//!   ├─► retry? sleep(backoff) unless the chain is canceled
//!   ├─► canceled? ──► Canceled, body skipped
//!   ├─► arm timeout watcher (if timeout > 0)
//!   ├─► body.launch() ──► Ok / Err
//!   ├─► settle latch: body result vs watcher vs cancel
//!   └─► failed, not canceled, retries left? ──► continue
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt, TryFutureExt};

use super::{watcher, Chain, RetryEvent};
use crate::attempt::AttemptRecord;
use crate::cancel::CancelHandle;
use crate::completion::{self, Completion};
use crate::error::FlowError;
use crate::latch::{Outcome, RunId};
use crate::policy::StepPolicy;

/// Something the retry loop can launch once per attempt.
pub(crate) trait StepBody<P, E> {
    fn launch<'a>(
        &'a mut self,
        params: &'a mut P,
        cancel: &'a CancelHandle,
        run: RunId,
    ) -> BoxFuture<'a, Result<(), FlowError<E>>>;
}

/// An `async` body returning its own error type.
pub(crate) struct AsyncBody<F>(pub(crate) F);

impl<P, E, F> StepBody<P, E> for AsyncBody<F>
where
    F: for<'b> FnMut(&'b mut P, CancelHandle) -> BoxFuture<'b, Result<(), E>>,
    E: Send + 'static,
{
    fn launch<'a>(
        &'a mut self,
        params: &'a mut P,
        cancel: &'a CancelHandle,
        _run: RunId,
    ) -> BoxFuture<'a, Result<(), FlowError<E>>> {
        (self.0)(params, cancel.clone())
            .map_err(FlowError::Step)
            .boxed()
    }
}

/// A callback body adapted through a [`Completion`].
pub(crate) struct CallbackBody<F>(pub(crate) F);

impl<P, E, F> StepBody<P, E> for CallbackBody<F>
where
    F: FnMut(&mut P, Completion<P, E>, CancelHandle),
    P: Send + 'static,
    E: Send + 'static,
{
    fn launch<'a>(
        &'a mut self,
        params: &'a mut P,
        cancel: &'a CancelHandle,
        run: RunId,
    ) -> BoxFuture<'a, Result<(), FlowError<E>>> {
        let (done, pending) = completion::channel();
        (self.0)(params, done, cancel.clone());
        pending.wait(params, cancel, run).boxed()
    }
}

impl<P, E> Chain<P, E> {
    /// Drive one step to a terminal outcome.
    pub(crate) async fn run_step<B>(
        &mut self,
        index: usize,
        policy: StepPolicy,
        body: &mut B,
    ) -> Result<(), FlowError<E>>
    where
        B: StepBody<P, E>,
    {
        let mut record = AttemptRecord::new();
        let mut delay = Duration::ZERO;

        loop {
            record.begin(self.cancel.state().latch.mint());

            if record.attempt_count() > 0 && !delay.is_zero() {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => {}
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            if self.cancel.is_canceled() {
                tracing::debug!(
                    run_id = record.run_id().get(),
                    "chain canceled; body skipped"
                );
                record.fail(Outcome::Canceled, FlowError::Canceled);
            } else {
                self.attempt(&policy, body, &mut record).await;
            }

            let retry = record.is_failure()
                && !self.cancel.is_canceled()
                && record.attempt_count() < policy.retry_limit();
            if !retry {
                break;
            }

            delay = policy.jittered_delay(record.attempt_count());
            if let (Some(hook), Some(error)) = (&self.on_retry, record.error()) {
                hook(&RetryEvent {
                    step: index,
                    attempt: record.attempt_count() + 1,
                    error,
                    next_delay: delay,
                });
            }
            tracing::debug!(
                attempt = record.attempt_count() + 1,
                timed_out = record.timed_out(),
                ?delay,
                "attempt failed; retrying"
            );
            record.prepare_retry();
        }

        tracing::debug!(
            attempts = record.attempt_count() + 1,
            outcome = ?record.outcome(),
            "step finished"
        );
        record.into_result()
    }

    /// Run the body once for the record's current run id and record how it ended.
    async fn attempt<B>(
        &mut self,
        policy: &StepPolicy,
        body: &mut B,
        record: &mut AttemptRecord<E>,
    )
    where
        B: StepBody<P, E>,
    {
        let run: RunId = record.run_id();
        let token = self.cancel.attempt_token();
        let watcher = policy.timeout_enabled().then(|| {
            watcher::arm(
                Arc::clone(self.cancel.state()),
                run,
                policy.timeout(),
                token.clone(),
            )
        });
        let handle = self.cancel.for_attempt(token);

        tracing::debug!(
            run_id = run.get(),
            attempt = record.attempt_count() + 1,
            "attempt started"
        );
        let result = body.launch(&mut self.params, &handle, run).await;
        if let Some(watcher) = watcher {
            watcher.abort();
        }

        let latch = &self.cancel.state().latch;
        let proposed = if result.is_ok() {
            Outcome::Succeeded
        } else {
            Outcome::Failed
        };
        let mut outcome = if latch.settle(run, proposed) {
            proposed
        } else {
            latch.outcome_of(run).unwrap_or(proposed)
        };
        // Cancellation pre-empts every other outcome, timeout included.
        if self.cancel.is_canceled() {
            outcome = Outcome::Canceled;
        }

        match outcome {
            Outcome::TimedOut => {
                record.fail(Outcome::TimedOut, FlowError::timeout(policy.timeout()))
            }
            Outcome::Canceled => record.fail(Outcome::Canceled, FlowError::Canceled),
            Outcome::Succeeded | Outcome::Failed => match result {
                Ok(()) => record.succeed(),
                Err(error) => record.fail(Outcome::Failed, error),
            },
        }
    }
}
