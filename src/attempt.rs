//! Bookkeeping for one step's retry loop.

use crate::error::FlowError;
use crate::latch::{Outcome, RunId};

/// Mutable record of the attempt currently being driven by the retry loop.
///
/// Created fresh for every step and dropped once the step has an outcome.
/// Only the retry loop mutates it; the timeout watcher sees the same attempt
/// through the chain's outcome latch.
#[derive(Debug)]
pub(crate) struct AttemptRecord<E> {
    run_id: RunId,
    attempt_count: u32,
    outcome: Option<Outcome>,
    timed_out: bool,
    error: Option<FlowError<E>>,
}

impl<E> AttemptRecord<E> {
    pub(crate) fn new() -> Self {
        Self {
            run_id: RunId(0),
            attempt_count: 0,
            outcome: None,
            timed_out: false,
            error: None,
        }
    }

    /// Make `run_id` the current attempt.
    pub(crate) fn begin(&mut self, run_id: RunId) {
        self.run_id = run_id;
        self.outcome = None;
    }

    pub(crate) fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Zero-based: 0 is the first attempt.
    pub(crate) fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub(crate) fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub(crate) fn timed_out(&self) -> bool {
        self.timed_out
    }

    pub(crate) fn error(&self) -> Option<&FlowError<E>> {
        self.error.as_ref()
    }

    pub(crate) fn succeed(&mut self) {
        self.outcome = Some(Outcome::Succeeded);
        self.timed_out = false;
        self.error = None;
    }

    pub(crate) fn fail(&mut self, outcome: Outcome, error: FlowError<E>) {
        debug_assert!(outcome.is_failure());
        self.timed_out = outcome == Outcome::TimedOut;
        self.outcome = Some(outcome);
        self.error = Some(error);
    }

    pub(crate) fn is_failure(&self) -> bool {
        self.outcome.is_some_and(Outcome::is_failure)
    }

    /// Count one more attempt and forget the previous failure.
    pub(crate) fn prepare_retry(&mut self) {
        self.attempt_count += 1;
        self.outcome = None;
        self.timed_out = false;
        self.error = None;
    }

    /// Final result of the step.
    pub(crate) fn into_result(self) -> Result<(), FlowError<E>> {
        match (self.outcome, self.error) {
            (Some(Outcome::Succeeded), _) => Ok(()),
            (_, Some(error)) => Err(error),
            (_, None) => Err(FlowError::Canceled),
        }
    }
}
