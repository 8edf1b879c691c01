//! # Millrace
//!
//! > *Water moves down the race one stretch at a time.*
//!
//! Sequential async step chains over one shared parameter value, with
//! per-step timeout, bounded retry with backoff, and chain-wide cooperative
//! cancellation.
//!
//! ## Model
//!
//! - A [`Chain`] owns the parameters and runs steps strictly one after another.
//! - Each step has a [`StepPolicy`]: a timeout, a retry limit and a backoff.
//! - A step that still fails after its retries stops the chain; later steps
//!   are skipped and [`Chain::result`] returns the [`FlowError`].
//! - [`CancelHandle::cancel`] stops the chain from anywhere. Bodies observe it
//!   cooperatively through the handle they are given.
//! - Callback-style APIs plug in through [`Chain::callback_step`] and a
//!   one-shot [`Completion`].
//!
//! ## Quick Example
//!
//! ```rust
//! use millrace::{Chain, FlowError, StepPolicy};
//! use std::time::Duration;
//!
//! #[derive(Debug, Default)]
//! struct Order {
//!     reserved: bool,
//!     charged: bool,
//! }
//!
//! # tokio_test::block_on(async {
//! let chain = Chain::<Order, String>::new(Order::default())
//!     .step(|order, _| Box::pin(async move {
//!         order.reserved = true;
//!         Ok(())
//!     }))
//!     .await
//!     .step_with(
//!         StepPolicy::new(Duration::from_secs(5), 2, Duration::from_millis(10)),
//!         |order, cancel| Box::pin(async move {
//!             if cancel.is_cancellation_requested() {
//!                 return Err("stopped".to_string());
//!             }
//!             order.charged = true;
//!             Ok(())
//!         }),
//!     )
//!     .await;
//!
//! match chain.result() {
//!     Ok(order) => assert!(order.reserved && order.charged),
//!     Err(FlowError::Step(e)) => panic!("step failed: {}", e),
//!     Err(other) => panic!("chain stopped: {}", other),
//! }
//! # });
//! ```

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

mod attempt;
pub mod cancel;
pub mod chain;
pub mod completion;
pub mod error;
mod latch;
pub mod policy;
pub mod shared;
pub mod testing;

// Re-exports
pub use cancel::CancelHandle;
pub use chain::{Chain, RetryEvent};
pub use completion::Completion;
pub use error::{FlowError, UsageError};
pub use policy::{Backoff, StepPolicy};
pub use shared::SharedParams;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancel::CancelHandle;
    pub use crate::chain::{Chain, RetryEvent};
    pub use crate::completion::Completion;
    pub use crate::error::{FlowError, UsageError};
    pub use crate::policy::{Backoff, StepPolicy};
    pub use crate::shared::SharedParams;
}
