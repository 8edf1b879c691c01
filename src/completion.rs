//! Continuation adapter for callback-style step bodies.
//!
//! A callback body receives a [`Completion`] and must resume it once, from
//! wherever its callback API reports the result. The retry loop waits on the
//! matching [`Pending`] exactly as it awaits an `async` body.
//!
//! The resume-once contract is enforced rather than assumed:
//!
//! - the first `resume` wins, later ones return [`UsageError::AlreadyResumed`];
//! - dropping every clone without resuming fails the attempt with
//!   [`UsageError::NeverResumed`];
//! - a resume that arrives after the attempt timed out or was canceled is
//!   discarded.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;

use crate::cancel::CancelHandle;
use crate::error::{FlowError, UsageError};
use crate::latch::RunId;

type Resume<P, E> = Box<dyn FnOnce(&mut P) -> Result<(), E> + Send>;
type Slot<P, E> = Arc<Mutex<Option<oneshot::Sender<Resume<P, E>>>>>;

/// One-shot completion handle passed to callback step bodies.
///
/// Clones share the same slot, so the handle can be moved into several
/// callbacks (for example a success and an error callback); whichever resumes
/// first decides the attempt.
///
/// # Example
///
/// ```rust
/// use millrace::Chain;
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let result = Chain::<Vec<String>, String>::new(Vec::new())
///     .callback_step(|_, done, _| {
///         tokio::spawn(async move {
///             tokio::time::sleep(Duration::from_millis(5)).await;
///             let _ = done.resume_with(|log: &mut Vec<String>| {
///                 log.push("fetched".to_string());
///                 Ok(())
///             });
///         });
///     })
///     .await
///     .result();
///
/// assert_eq!(result.unwrap(), vec!["fetched".to_string()]);
/// # });
/// ```
pub struct Completion<P, E> {
    slot: Slot<P, E>,
}

/// Receiving half of a [`Completion`], awaited by the retry loop.
pub(crate) struct Pending<P, E> {
    rx: oneshot::Receiver<Resume<P, E>>,
}

pub(crate) fn channel<P, E>() -> (Completion<P, E>, Pending<P, E>) {
    let (tx, rx) = oneshot::channel();
    (
        Completion {
            slot: Arc::new(Mutex::new(Some(tx))),
        },
        Pending { rx },
    )
}

impl<P, E> Clone for Completion<P, E> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<P, E> fmt::Debug for Completion<P, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("resumed", &self.is_resumed())
            .finish()
    }
}

impl<P, E> Completion<P, E> {
    /// Returns true once any clone of this handle has been resumed.
    pub fn is_resumed(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

impl<P: 'static, E: Send + 'static> Completion<P, E> {
    /// Resume the suspended step with success or the body's error.
    pub fn resume(&self, result: Result<(), E>) -> Result<(), UsageError> {
        self.deliver(Box::new(move |_: &mut P| result))
    }

    /// Resume with success.
    pub fn succeed(&self) -> Result<(), UsageError> {
        self.resume(Ok(()))
    }

    /// Resume with the body's error.
    pub fn fail(&self, error: E) -> Result<(), UsageError> {
        self.resume(Err(error))
    }

    /// Resume by applying `f` to the chain's parameters.
    ///
    /// `f` runs on the chain's task once the step resumes, so callbacks can
    /// write results into the parameters without sharing them.
    pub fn resume_with<F>(&self, f: F) -> Result<(), UsageError>
    where
        F: FnOnce(&mut P) -> Result<(), E> + Send + 'static,
    {
        self.deliver(Box::new(f))
    }

    fn deliver(&self, resume: Resume<P, E>) -> Result<(), UsageError> {
        let sender = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match sender {
            Some(tx) => {
                if tx.send(resume).is_err() {
                    tracing::debug!("step already abandoned; late resume discarded");
                }
                Ok(())
            }
            None => {
                tracing::warn!(
                    error = UsageError::AlreadyResumed.as_label(),
                    "completion resumed more than once; ignoring"
                );
                Err(UsageError::AlreadyResumed)
            }
        }
    }
}

impl<P, E> Pending<P, E> {
    /// Wait for the resume of `run`, or for the attempt to be canceled.
    ///
    /// A resume is applied to `params` only after it wins the outcome latch
    /// for `run`. One that loses to the timeout watcher or to `cancel()` is
    /// dropped unapplied, and the retry loop reports the latch's outcome.
    pub(crate) async fn wait(
        self,
        params: &mut P,
        cancel: &CancelHandle,
        run: RunId,
    ) -> Result<(), FlowError<E>> {
        tokio::select! {
            biased;
            received = self.rx => match received {
                Ok(apply) => {
                    if !cancel.state().latch.claim_for_body(run) {
                        tracing::debug!(%run, "attempt already decided; resume discarded");
                        return Err(FlowError::Canceled);
                    }
                    apply(params).map_err(FlowError::Step)
                }
                Err(_) => {
                    tracing::warn!(
                        error = UsageError::NeverResumed.as_label(),
                        "completion dropped without being resumed"
                    );
                    Err(FlowError::Usage(UsageError::NeverResumed))
                }
            },
            _ = cancel.cancelled() => Err(FlowError::Canceled),
        }
    }
}
