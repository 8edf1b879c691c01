//! Per-step resilience policies.
//!
//! A [`StepPolicy`] is plain data: it describes the timeout, retry budget and
//! backoff for one step of a [`Chain`](crate::Chain) and never executes
//! anything itself. The retry loop in [`chain`](crate::chain) reads it.
//!
//! # Quick Start
//!
//! ```rust
//! use millrace::{Backoff, StepPolicy};
//! use std::time::Duration;
//!
//! // Everything disabled: one attempt, no timeout, no backoff.
//! let policy = StepPolicy::default();
//! assert_eq!(policy.retry_limit(), 0);
//! assert!(!policy.timeout_enabled());
//!
//! // One second timeout, two retries, 250ms between attempts.
//! let policy = StepPolicy::new(Duration::from_secs(1), 2, Duration::from_millis(250));
//! assert_eq!(policy.max_attempts(), 3);
//! assert_eq!(policy.delay_before_retry(0), Duration::from_millis(250));
//!
//! // Growing backoff with a cap.
//! let policy = StepPolicy::default()
//!     .with_retry_limit(5)
//!     .with_backoff_strategy(Backoff::exponential(Duration::from_millis(100)))
//!     .with_max_backoff(Duration::from_millis(300));
//! assert_eq!(policy.delay_before_retry(3), Duration::from_millis(300));
//! ```
//!
//! # Jitter
//!
//! Enable the `jitter` feature to spread retried attempts out. Jitter is
//! additive only, so a retried attempt never starts earlier than the
//! configured backoff.
//!
//! ```toml
//! millrace = { version = "...", features = ["jitter"] }
//! ```

mod backoff;
mod step;

pub use backoff::Backoff;
pub use step::StepPolicy;
