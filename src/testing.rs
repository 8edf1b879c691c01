//! Testing utilities for code built on chains.
//!
//! This module provides assertion macros over a chain's result, a shared
//! attempt counter for scripting flaky bodies, and property-based testing
//! support for policies.
//!
//! # Examples
//!
//! ## Assertion Macros
//!
//! ```rust
//! use millrace::{assert_canceled, assert_step_failed, Chain};
//!
//! # tokio_test::block_on(async {
//! let failed = Chain::<(), &str>::new(())
//!     .step(|_, _| Box::pin(async { Err("disk full") }))
//!     .await;
//! assert_step_failed!(failed.result(), "disk full");
//!
//! let canceled = Chain::<(), &str>::new(());
//! canceled.cancel();
//! let canceled = canceled.step(|_, _| Box::pin(async { Ok(()) })).await;
//! assert_canceled!(canceled.result());
//! # });
//! ```
//!
//! ## Attempt Counter
//!
//! ```rust
//! use millrace::testing::AttemptCounter;
//! use millrace::{Chain, StepPolicy};
//!
//! # tokio_test::block_on(async {
//! let attempts = AttemptCounter::new();
//! let counter = attempts.clone();
//!
//! let chain = Chain::<(), &str>::new(())
//!     .step_with(StepPolicy::default().with_retry_limit(4), move |_, _| {
//!         let n = counter.tick();
//!         Box::pin(async move { if n < 2 { Err("flaky") } else { Ok(()) } })
//!     })
//!     .await;
//!
//! assert!(chain.result().is_ok());
//! assert_eq!(attempts.count(), 3);
//! # });
//! ```

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Shared count of how many times a step body has been invoked.
///
/// Clones share the same count, so one clone can move into the body while
/// the test keeps another.
#[derive(Debug, Clone, Default)]
pub struct AttemptCounter {
    count: Arc<AtomicU32>,
}

impl AttemptCounter {
    /// Create a counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one invocation and return the zero-based index of it.
    pub fn tick(&self) -> u32 {
        self.count.fetch_add(1, Ordering::SeqCst)
    }

    /// Number of invocations recorded so far.
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }
}

/// Assert that a chain result is `Ok`.
///
/// This macro will panic with the terminal error if the chain failed.
///
/// # Example
///
/// ```rust
/// use millrace::{assert_chain_ok, Chain};
///
/// # tokio_test::block_on(async {
/// let chain = Chain::<u8, String>::new(1).step(|_, _| Box::pin(async { Ok(()) })).await;
/// assert_chain_ok!(chain.result());
/// # });
/// ```
#[macro_export]
macro_rules! assert_chain_ok {
    ($result:expr) => {
        match $result {
            ::core::result::Result::Ok(_) => {}
            ::core::result::Result::Err(e) => {
                panic!("Expected Ok, got {:?}", e);
            }
        }
    };
}

/// Assert that a chain result failed with the body's own error.
///
/// With a second argument, the step error must also equal it.
///
/// # Example
///
/// ```rust
/// use millrace::{assert_step_failed, FlowError};
///
/// let result: Result<(), FlowError<&str>> = Err(FlowError::Step("bad input"));
/// assert_step_failed!(result.clone());
/// assert_step_failed!(result, "bad input");
/// ```
#[macro_export]
macro_rules! assert_step_failed {
    ($result:expr) => {
        match $result {
            ::core::result::Result::Err($crate::FlowError::Step(_)) => {}
            other => {
                panic!("Expected step failure, got {:?}", other);
            }
        }
    };
    ($result:expr, $expected:expr) => {
        match $result {
            ::core::result::Result::Err($crate::FlowError::Step(e)) => {
                assert_eq!(e, $expected);
            }
            other => {
                panic!("Expected step failure {:?}, got {:?}", $expected, other);
            }
        }
    };
}

/// Assert that a chain result failed with a timeout.
///
/// # Example
///
/// ```rust
/// use millrace::{assert_timed_out, FlowError};
/// use std::time::Duration;
///
/// let result: Result<(), FlowError<String>> =
///     Err(FlowError::timeout(Duration::from_secs(1)));
/// assert_timed_out!(result);
/// ```
#[macro_export]
macro_rules! assert_timed_out {
    ($result:expr) => {
        match $result {
            ::core::result::Result::Err($crate::FlowError::Timeout { .. }) => {}
            other => {
                panic!("Expected timeout, got {:?}", other);
            }
        }
    };
}

/// Assert that a chain result failed because the chain was canceled.
///
/// # Example
///
/// ```rust
/// use millrace::{assert_canceled, FlowError};
///
/// let result: Result<(), FlowError<String>> = Err(FlowError::Canceled);
/// assert_canceled!(result);
/// ```
#[macro_export]
macro_rules! assert_canceled {
    ($result:expr) => {
        match $result {
            ::core::result::Result::Err($crate::FlowError::Canceled) => {}
            other => {
                panic!("Expected cancellation, got {:?}", other);
            }
        }
    };
}

#[cfg(feature = "proptest")]
use crate::policy::{Backoff, StepPolicy};
#[cfg(feature = "proptest")]
use proptest::prelude::*;
#[cfg(feature = "proptest")]
use std::time::Duration;

#[cfg(feature = "proptest")]
impl Arbitrary for Backoff {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        let millis = (0u64..10_000).prop_map(Duration::from_millis);
        prop_oneof![
            millis.clone().prop_map(Backoff::fixed),
            millis.clone().prop_map(Backoff::linear),
            millis.prop_map(Backoff::exponential),
        ]
        .boxed()
    }
}

#[cfg(feature = "proptest")]
impl Arbitrary for StepPolicy {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            0u64..60_000,
            0u32..16,
            any::<Backoff>(),
            proptest::option::of(1u64..120_000),
            0.0f64..=1.0,
        )
            .prop_map(|(timeout, retries, backoff, cap, jitter)| {
                let policy = StepPolicy::default()
                    .with_timeout(Duration::from_millis(timeout))
                    .with_retry_limit(retries)
                    .with_backoff_strategy(backoff)
                    .with_jitter(jitter);
                match cap {
                    Some(cap) => policy.with_max_backoff(Duration::from_millis(cap)),
                    None => policy,
                }
            })
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use crate::FlowError;
    use std::time::Duration;

    use super::AttemptCounter;

    #[test]
    fn attempt_counter_shared_between_clones() {
        let a = AttemptCounter::new();
        let b = a.clone();
        assert_eq!(a.tick(), 0);
        assert_eq!(b.tick(), 1);
        assert_eq!(a.count(), 2);
    }

    #[test]
    fn assert_chain_ok_macro() {
        let result: Result<u8, FlowError<String>> = Ok(1);
        assert_chain_ok!(result);
    }

    #[test]
    fn assert_step_failed_macro() {
        let result: Result<(), FlowError<&str>> = Err(FlowError::Step("bad"));
        assert_step_failed!(result.clone());
        assert_step_failed!(result, "bad");
    }

    #[test]
    fn assert_timed_out_macro() {
        let result: Result<(), FlowError<&str>> = Err(FlowError::timeout(Duration::from_secs(1)));
        assert_timed_out!(result);
    }

    #[test]
    fn assert_canceled_macro() {
        let result: Result<(), FlowError<&str>> = Err(FlowError::Canceled);
        assert_canceled!(result);
    }

    #[test]
    #[should_panic(expected = "Expected Ok, got")]
    fn assert_chain_ok_panics_on_error() {
        let result: Result<(), FlowError<&str>> = Err(FlowError::Canceled);
        assert_chain_ok!(result);
    }

    #[test]
    #[should_panic(expected = "Expected step failure, got")]
    fn assert_step_failed_panics_on_timeout() {
        let result: Result<(), FlowError<&str>> = Err(FlowError::timeout(Duration::from_secs(1)));
        assert_step_failed!(result);
    }

    #[test]
    #[should_panic(expected = "Expected timeout, got")]
    fn assert_timed_out_panics_on_success() {
        let result: Result<(), FlowError<&str>> = Ok(());
        assert_timed_out!(result);
    }

    #[test]
    #[should_panic(expected = "Expected cancellation, got")]
    fn assert_canceled_panics_on_step_failure() {
        let result: Result<(), FlowError<&str>> = Err(FlowError::Step("bad"));
        assert_canceled!(result);
    }

    #[cfg(feature = "proptest")]
    mod proptest_tests {
        use crate::policy::StepPolicy;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn step_policy_arbitrary_respects_cap(
                policy in any::<StepPolicy>(),
                retry in 0u32..32,
            ) {
                let delay = policy.delay_before_retry(retry);
                if let Some(cap) = policy.max_backoff() {
                    prop_assert!(delay <= cap);
                }
                prop_assert!((0.0..=1.0).contains(&policy.jitter_factor()));
            }
        }
    }
}
