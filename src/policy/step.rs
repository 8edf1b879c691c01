//! The per-step policy value.

use std::time::Duration;

use super::backoff::{apply_jitter, Backoff};

/// Timeout, retry budget and backoff for one step.
///
/// Policies are immutable values; every builder method returns an updated
/// copy. All fields are non-negative by construction.
///
/// - `timeout`: `Duration::ZERO` disables the per-attempt timeout.
/// - `retry_limit`: retries after the first attempt; 0 means one attempt only.
/// - `backoff`: delay before a retried attempt, never applied to the first.
///
/// # Examples
///
/// ```rust
/// use millrace::StepPolicy;
/// use std::time::Duration;
///
/// let policy = StepPolicy::new(Duration::from_secs(10), 1, Duration::from_secs(2));
///
/// assert_eq!(policy.timeout(), Duration::from_secs(10));
/// assert_eq!(policy.retry_limit(), 1);
/// assert_eq!(policy.delay_before_retry(0), Duration::from_secs(2));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StepPolicy {
    timeout: Duration,
    retry_limit: u32,
    backoff: Backoff,
    max_backoff: Option<Duration>,
    jitter: f64,
}

impl Default for StepPolicy {
    /// All policies disabled.
    fn default() -> Self {
        Self {
            timeout: Duration::ZERO,
            retry_limit: 0,
            backoff: Backoff::default(),
            max_backoff: None,
            jitter: 0.0,
        }
    }
}

impl StepPolicy {
    /// Create an explicit policy with a fixed backoff.
    ///
    /// Pass `Duration::ZERO` for `timeout` or `backoff` to disable them.
    pub fn new(timeout: Duration, retry_limit: u32, backoff: Duration) -> Self {
        Self {
            timeout,
            retry_limit,
            backoff: Backoff::Fixed(backoff),
            ..Self::default()
        }
    }

    /// Set the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the number of retries after the first attempt.
    ///
    /// ```rust
    /// use millrace::StepPolicy;
    ///
    /// let policy = StepPolicy::default().with_retry_limit(3);
    /// assert_eq!(policy.max_attempts(), 4);
    /// ```
    pub fn with_retry_limit(mut self, retry_limit: u32) -> Self {
        self.retry_limit = retry_limit;
        self
    }

    /// Use a fixed backoff.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = Backoff::Fixed(backoff);
        self
    }

    /// Use any [`Backoff`] strategy.
    pub fn with_backoff_strategy(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Cap the delay computed by the backoff strategy.
    pub fn with_max_backoff(mut self, max: Duration) -> Self {
        self.max_backoff = Some(max);
        self
    }

    /// Stretch each backoff by a random factor in `[0, factor]`.
    ///
    /// The factor is clamped to `0.0..=1.0`.
    ///
    /// **Note**: Requires the `jitter` feature. Without it, this setting is ignored.
    pub fn with_jitter(mut self, factor: f64) -> Self {
        self.jitter = if factor.is_nan() {
            0.0
        } else {
            factor.clamp(0.0, 1.0)
        };
        self
    }

    /// Per-attempt timeout; `Duration::ZERO` when disabled.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns true if a per-attempt timeout is configured.
    pub fn timeout_enabled(&self) -> bool {
        !self.timeout.is_zero()
    }

    /// Number of retries allowed after the first attempt.
    pub fn retry_limit(&self) -> u32 {
        self.retry_limit
    }

    /// Upper bound on attempts for this step (first attempt plus retries).
    pub fn max_attempts(&self) -> u32 {
        self.retry_limit.saturating_add(1)
    }

    /// The backoff strategy.
    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// The backoff cap, if any.
    pub fn max_backoff(&self) -> Option<Duration> {
        self.max_backoff
    }

    /// The jitter factor (0.0 when disabled).
    pub fn jitter_factor(&self) -> f64 {
        self.jitter
    }

    /// Delay before retry number `retry_index` (zero-based), cap applied, jitter not.
    ///
    /// ```rust
    /// use millrace::{Backoff, StepPolicy};
    /// use std::time::Duration;
    ///
    /// let policy = StepPolicy::default()
    ///     .with_backoff_strategy(Backoff::linear(Duration::from_millis(100)))
    ///     .with_max_backoff(Duration::from_millis(250));
    ///
    /// assert_eq!(policy.delay_before_retry(0), Duration::from_millis(100));
    /// assert_eq!(policy.delay_before_retry(1), Duration::from_millis(200));
    /// assert_eq!(policy.delay_before_retry(2), Duration::from_millis(250));
    /// ```
    pub fn delay_before_retry(&self, retry_index: u32) -> Duration {
        let delay = self.backoff.delay_for_retry(retry_index);
        match self.max_backoff {
            Some(max) => delay.min(max),
            None => delay,
        }
    }

    /// Delay actually slept before a retry, jitter included.
    pub(crate) fn jittered_delay(&self, retry_index: u32) -> Duration {
        apply_jitter(self.delay_before_retry(retry_index), self.jitter)
    }
}

#[cfg(test)]
mod policy_tests {
    use super::*;

    #[test]
    fn test_default_disables_everything() {
        let policy = StepPolicy::default();
        assert_eq!(policy.timeout(), Duration::ZERO);
        assert!(!policy.timeout_enabled());
        assert_eq!(policy.retry_limit(), 0);
        assert_eq!(policy.max_attempts(), 1);
        assert!(policy.backoff().is_disabled());
        assert_eq!(policy.max_backoff(), None);
        assert_eq!(policy.jitter_factor(), 0.0);
    }

    #[test]
    fn test_new_sets_fields() {
        let policy = StepPolicy::new(Duration::from_secs(1), 2, Duration::from_millis(500));
        assert!(policy.timeout_enabled());
        assert_eq!(policy.timeout(), Duration::from_secs(1));
        assert_eq!(policy.retry_limit(), 2);
        assert_eq!(policy.backoff(), &Backoff::Fixed(Duration::from_millis(500)));
    }

    #[test]
    fn test_builder_returns_copies() {
        let base = StepPolicy::default();
        let tuned = base.with_retry_limit(4).with_timeout(Duration::from_secs(3));
        assert_eq!(base.retry_limit(), 0);
        assert_eq!(tuned.retry_limit(), 4);
        assert_eq!(tuned.timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_max_backoff_caps_delay() {
        let policy = StepPolicy::default()
            .with_backoff_strategy(Backoff::exponential(Duration::from_millis(100)))
            .with_max_backoff(Duration::from_millis(500));

        assert_eq!(policy.delay_before_retry(0), Duration::from_millis(100));
        assert_eq!(policy.delay_before_retry(2), Duration::from_millis(400));
        assert_eq!(policy.delay_before_retry(3), Duration::from_millis(500));
        assert_eq!(policy.delay_before_retry(30), Duration::from_millis(500));
    }

    #[test]
    fn test_jitter_is_clamped() {
        assert_eq!(StepPolicy::default().with_jitter(4.0).jitter_factor(), 1.0);
        assert_eq!(StepPolicy::default().with_jitter(-1.0).jitter_factor(), 0.0);
        assert_eq!(StepPolicy::default().with_jitter(f64::NAN).jitter_factor(), 0.0);
    }

    #[test]
    fn test_jittered_delay_without_jitter_matches_backoff() {
        let policy = StepPolicy::new(Duration::ZERO, 1, Duration::from_millis(40));
        assert_eq!(policy.jittered_delay(0), Duration::from_millis(40));
    }

    #[test]
    fn test_max_attempts_saturates() {
        let policy = StepPolicy::default().with_retry_limit(u32::MAX);
        assert_eq!(policy.max_attempts(), u32::MAX);
    }

    #[test]
    fn test_policy_is_debug() {
        let debug = format!("{:?}", StepPolicy::default());
        assert!(debug.contains("StepPolicy"));
    }
}
