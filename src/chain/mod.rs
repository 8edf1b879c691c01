//! Sequential step chains.
//!
//! A [`Chain`] owns one parameter value and runs steps against it, one after
//! another. Each step has its own [`StepPolicy`]; the chain carries the
//! cancellation state and the first terminal error.
//!
//! # Ordering
//!
//! Appending a step returns a future that completes only once the step has a
//! terminal outcome, so step *N+1* never starts before step *N* has finished.
//! The only concurrency is inside a step, between the body and its timeout
//! watcher.
//!
//! # Failure
//!
//! A step that fails after exhausting its retries, or that is canceled, stores
//! its error as the chain's terminal error. Every later append is then a no-op
//! that never invokes its body, and [`Chain::result`] returns that error.
//!
//! # Runtime
//!
//! Steps must be driven inside a Tokio runtime: timeout watchers are spawned
//! tasks and backoff uses `tokio::time`.
//!
//! # Example
//!
//! ```rust
//! use millrace::{Chain, StepPolicy};
//! use std::collections::HashMap;
//! use std::time::Duration;
//!
//! # tokio_test::block_on(async {
//! let result = Chain::<HashMap<&str, &str>, String>::new(HashMap::new())
//!     .step(|p, _| Box::pin(async move {
//!         p.insert("request1", "success");
//!         Ok(())
//!     }))
//!     .await
//!     .step_with(
//!         StepPolicy::new(Duration::from_secs(10), 1, Duration::from_millis(10)),
//!         |p, _| Box::pin(async move {
//!             p.insert("request2", "success");
//!             Ok(())
//!         }),
//!     )
//!     .await
//!     .callback_step(|_, done, _| {
//!         let _ = done.resume_with(|p| {
//!             p.insert("request3", "success");
//!             Ok(())
//!         });
//!     })
//!     .await
//!     .result()
//!     .unwrap();
//!
//! assert_eq!(result.len(), 3);
//! # });
//! ```

mod hook;
mod run;
mod watcher;


use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::Instrument;

pub use hook::RetryEvent;

use crate::cancel::CancelHandle;
use crate::completion::Completion;
use crate::error::FlowError;
use crate::policy::StepPolicy;
use hook::RetryHook;
use run::{AsyncBody, CallbackBody, StepBody};

/// An ordered sequence of steps over one shared parameter value.
///
/// Appending consumes the chain and hands it back once the step is done, so a
/// chain value always means "the chain so far".
pub struct Chain<P, E> {
    params: P,
    cancel: CancelHandle,
    terminal: Option<FlowError<E>>,
    completed: usize,
    on_retry: Option<Arc<RetryHook<E>>>,
}

impl<P, E> Chain<P, E> {
    /// Start a chain around `params`.
    pub fn new(params: P) -> Self {
        Self {
            params,
            cancel: CancelHandle::new_chain(),
            terminal: None,
            completed: 0,
            on_retry: None,
        }
    }

    /// Register a synchronous observer called before every retry of every step.
    ///
    /// # Example
    ///
    /// ```rust
    /// use millrace::{Chain, StepPolicy};
    /// use std::sync::atomic::{AtomicU32, Ordering};
    /// use std::sync::Arc;
    ///
    /// # tokio_test::block_on(async {
    /// let retries = Arc::new(AtomicU32::new(0));
    /// let seen = Arc::clone(&retries);
    ///
    /// let chain = Chain::<(), &str>::new(())
    ///     .on_retry(move |event| {
    ///         seen.fetch_add(1, Ordering::SeqCst);
    ///         assert_eq!(event.step, 0);
    ///     })
    ///     .step_with(StepPolicy::default().with_retry_limit(2), |_, _| {
    ///         Box::pin(async { Err("flaky") })
    ///     })
    ///     .await;
    ///
    /// assert!(chain.is_failed());
    /// assert_eq!(retries.load(Ordering::SeqCst), 2);
    /// # });
    /// ```
    pub fn on_retry<H>(mut self, hook: H) -> Self
    where
        H: Fn(&RetryEvent<'_, E>) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(hook));
        self
    }

    /// Request cancellation of the rest of the chain. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A handle that can cancel this chain from elsewhere.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Returns true once the chain has been canceled.
    pub fn is_canceled(&self) -> bool {
        self.cancel.is_canceled()
    }

    /// Returns true once a step has failed for good.
    pub fn is_failed(&self) -> bool {
        self.terminal.is_some()
    }

    /// The error that stopped the chain, if any.
    pub fn terminal_error(&self) -> Option<&FlowError<E>> {
        self.terminal.as_ref()
    }

    /// Number of steps that succeeded so far.
    pub fn completed_steps(&self) -> usize {
        self.completed
    }

    /// The parameters as they stand after the last finished step.
    pub fn params(&self) -> &P {
        &self.params
    }

    /// Mutable access to the parameters between steps.
    pub fn params_mut(&mut self) -> &mut P {
        &mut self.params
    }

    /// The parameters, whether or not the chain failed.
    pub fn into_params(self) -> P {
        self.params
    }

    /// The parameters together with the terminal error, if any.
    pub fn into_parts(self) -> (P, Option<FlowError<E>>) {
        (self.params, self.terminal)
    }

    /// `Ok(params)` if every step succeeded, otherwise the terminal error.
    pub fn result(self) -> Result<P, FlowError<E>> {
        match self.terminal {
            Some(error) => Err(error),
            None => Ok(self.params),
        }
    }

    async fn append<B>(mut self, policy: StepPolicy, mut body: B) -> Self
    where
        B: StepBody<P, E>,
    {
        let index = self.completed;
        if let Some(error) = &self.terminal {
            tracing::debug!(
                step = index,
                error = error.as_label(),
                "chain already failed; step skipped"
            );
            return self;
        }

        let span = tracing::debug_span!("step", index);
        match self.run_step(index, policy, &mut body).instrument(span).await {
            Ok(()) => {
                self.completed += 1;
            }
            Err(error) => {
                tracing::info!(
                    step = index,
                    error = error.as_label(),
                    "step failed; chain stopped"
                );
                self.terminal = Some(error);
            }
        }
        self
    }
}

impl<P, E> Chain<P, E>
where
    E: Send + 'static,
{
    /// Append an `async` step with the default policy.
    ///
    /// See [`step_with`](Self::step_with).
    pub async fn step<F>(self, body: F) -> Self
    where
        F: for<'a> FnMut(&'a mut P, CancelHandle) -> BoxFuture<'a, Result<(), E>>,
    {
        self.step_with(StepPolicy::default(), body).await
    }

    /// Append an `async` step governed by `policy`.
    ///
    /// `body` is called once per attempt with the parameters and a
    /// [`CancelHandle`] scoped to that attempt. It should return promptly once
    /// the handle reports cancellation, which is also how timeouts are
    /// delivered.
    pub async fn step_with<F>(self, policy: StepPolicy, body: F) -> Self
    where
        F: for<'a> FnMut(&'a mut P, CancelHandle) -> BoxFuture<'a, Result<(), E>>,
    {
        self.append(policy, AsyncBody(body)).await
    }
}

impl<P, E> Chain<P, E>
where
    P: Send + 'static,
    E: Send + 'static,
{
    /// Append a callback step with the default policy.
    ///
    /// See [`callback_step_with`](Self::callback_step_with).
    pub async fn callback_step<F>(self, body: F) -> Self
    where
        F: FnMut(&mut P, Completion<P, E>, CancelHandle),
    {
        self.callback_step_with(StepPolicy::default(), body).await
    }

    /// Append a callback step governed by `policy`.
    ///
    /// `body` is called once per attempt and must arrange for the
    /// [`Completion`] to be resumed exactly once. The attempt fails with
    /// [`UsageError::NeverResumed`](crate::UsageError::NeverResumed) if every
    /// clone of the completion is dropped first.
    pub async fn callback_step_with<F>(self, policy: StepPolicy, body: F) -> Self
    where
        F: FnMut(&mut P, Completion<P, E>, CancelHandle),
    {
        self.append(policy, CallbackBody(body)).await
    }
}

impl<P: fmt::Debug, E: fmt::Debug> fmt::Debug for Chain<P, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("params", &self.params)
            .field("canceled", &self.is_canceled())
            .field("terminal", &self.terminal)
            .field("completed", &self.completed)
            .finish_non_exhaustive()
    }
}
