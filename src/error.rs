//! Error types for chain execution.

use std::time::Duration;

/// Why a step, and therefore the chain, failed.
///
/// Once a step fails for good, its `FlowError` becomes the chain's terminal
/// error and is returned unchanged by [`Chain::result`](crate::Chain::result).
///
/// # Examples
///
/// ```rust
/// use millrace::{Chain, FlowError, StepPolicy};
///
/// # tokio_test::block_on(async {
/// let result = Chain::<Vec<u8>, &str>::new(Vec::new())
///     .step(|_, _| Box::pin(async { Err("disk full") }))
///     .await
///     .result();
///
/// match result {
///     Err(FlowError::Step(e)) => assert_eq!(e, "disk full"),
///     other => panic!("Expected step failure, got {:?}", other),
/// }
/// # });
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowError<E> {
    /// The step body returned its own error.
    Step(E),
    /// The attempt did not finish before its timeout.
    Timeout {
        /// The timeout duration that was exceeded.
        duration: Duration,
    },
    /// Cancellation was requested before or during the attempt.
    Canceled,
    /// A callback step broke the resume-exactly-once contract.
    Usage(UsageError),
}

impl<E> FlowError<E> {
    /// Create a timeout error.
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout { duration }
    }

    /// Returns true if the step body itself failed.
    pub fn is_step(&self) -> bool {
        matches!(self, Self::Step(_))
    }

    /// Returns true if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns true if the chain was canceled.
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }

    /// Returns true if a callback step misused its completion handle.
    pub fn is_usage(&self) -> bool {
        matches!(self, Self::Usage(_))
    }

    /// Get the body's error if present.
    pub fn into_step_error(self) -> Option<E> {
        match self {
            Self::Step(e) => Some(e),
            _ => None,
        }
    }

    /// Get a reference to the body's error if present.
    pub fn step_error(&self) -> Option<&E> {
        match self {
            Self::Step(e) => Some(e),
            _ => None,
        }
    }

    /// Transform the body's error, leaving the other variants untouched.
    pub fn map_step<F, E2>(self, f: F) -> FlowError<E2>
    where
        F: FnOnce(E) -> E2,
    {
        match self {
            Self::Step(e) => FlowError::Step(f(e)),
            Self::Timeout { duration } => FlowError::Timeout { duration },
            Self::Canceled => FlowError::Canceled,
            Self::Usage(u) => FlowError::Usage(u),
        }
    }

    /// Short stable label (snake_case) for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Step(_) => "step_failed",
            Self::Timeout { .. } => "step_timeout",
            Self::Canceled => "chain_canceled",
            Self::Usage(u) => u.as_label(),
        }
    }
}

impl<E> From<UsageError> for FlowError<E> {
    fn from(error: UsageError) -> Self {
        Self::Usage(error)
    }
}

impl<E: std::fmt::Display> std::fmt::Display for FlowError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Step(e) => write!(f, "step failed: {}", e),
            Self::Timeout { duration } => write!(f, "step timed out after {:?}", duration),
            Self::Canceled => write!(f, "chain canceled"),
            Self::Usage(u) => write!(f, "{}", u),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for FlowError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Step(e) => Some(e),
            Self::Usage(u) => Some(u),
            Self::Timeout { .. } | Self::Canceled => None,
        }
    }
}

/// Misuse of a [`Completion`](crate::Completion) handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageError {
    /// Every handle was dropped without a resume.
    NeverResumed,
    /// `resume` was called after the step had already been resumed.
    AlreadyResumed,
}

impl UsageError {
    /// Short stable label (snake_case) for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::NeverResumed => "completion_never_resumed",
            Self::AlreadyResumed => "completion_already_resumed",
        }
    }
}

impl std::fmt::Display for UsageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NeverResumed => write!(f, "completion dropped without being resumed"),
            Self::AlreadyResumed => write!(f, "completion resumed more than once"),
        }
    }
}

impl std::error::Error for UsageError {}

#[cfg(test)]
mod error_tests {
    use super::*;

    #[test]
    fn test_step_error_accessors() {
        let err = FlowError::Step("boom");
        assert!(err.is_step());
        assert!(!err.is_timeout());
        assert_eq!(err.step_error(), Some(&"boom"));
        assert_eq!(err.into_step_error(), Some("boom"));
    }

    #[test]
    fn test_timeout_error() {
        let err: FlowError<String> = FlowError::timeout(Duration::from_secs(1));
        assert!(err.is_timeout());
        assert!(!err.is_canceled());
        assert!(err.clone().into_step_error().is_none());
        assert!(format!("{}", err).contains("timed out"));
    }

    #[test]
    fn test_canceled_display() {
        let err: FlowError<String> = FlowError::Canceled;
        assert!(err.is_canceled());
        assert_eq!(format!("{}", err), "chain canceled");
    }

    #[test]
    fn test_usage_from() {
        let err: FlowError<String> = UsageError::NeverResumed.into();
        assert!(err.is_usage());
        assert_eq!(err.as_label(), "completion_never_resumed");
        assert!(format!("{}", err).contains("without being resumed"));
    }

    #[test]
    fn test_map_step() {
        let err = FlowError::Step(7).map_step(|n| n.to_string());
        assert_eq!(err, FlowError::Step("7".to_string()));

        let err: FlowError<String> = FlowError::<i32>::Canceled.map_step(|n| n.to_string());
        assert_eq!(err, FlowError::Canceled);
    }

    #[test]
    fn test_labels() {
        assert_eq!(FlowError::Step(()).as_label(), "step_failed");
        assert_eq!(FlowError::<()>::timeout(Duration::ZERO).as_label(), "step_timeout");
        assert_eq!(FlowError::<()>::Canceled.as_label(), "chain_canceled");
        assert_eq!(
            UsageError::AlreadyResumed.as_label(),
            "completion_already_resumed"
        );
    }

    #[test]
    fn test_source_chain() {
        use std::error::Error;
        use std::fmt;

        #[derive(Debug)]
        struct Io;
        impl fmt::Display for Io {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "io")
            }
        }
        impl Error for Io {}

        let err = FlowError::Step(Io);
        assert!(err.source().is_some());
        assert!(FlowError::<Io>::Canceled.source().is_none());
    }
}
