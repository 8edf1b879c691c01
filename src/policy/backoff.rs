//! Backoff strategies applied before a retried attempt.

use std::time::Duration;

/// How long to wait before a retried attempt.
///
/// The first attempt of a step never waits. `retry_index` below is zero-based:
/// index 0 is the delay before the second attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Backoff {
    /// Same delay before every retry.
    Fixed(Duration),
    /// Delay increases linearly: base * (retry_index + 1).
    Linear {
        /// Base delay duration.
        base: Duration,
    },
    /// Delay doubles: base * 2^retry_index.
    Exponential {
        /// Base delay duration.
        base: Duration,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Fixed(Duration::ZERO)
    }
}

impl Backoff {
    /// No delay between attempts.
    pub fn none() -> Self {
        Self::default()
    }

    /// Fixed delay between attempts.
    pub fn fixed(delay: Duration) -> Self {
        Backoff::Fixed(delay)
    }

    /// Linearly increasing delay.
    ///
    /// ```rust
    /// use millrace::Backoff;
    /// use std::time::Duration;
    ///
    /// let backoff = Backoff::linear(Duration::from_millis(100));
    /// assert_eq!(backoff.delay_for_retry(0), Duration::from_millis(100));
    /// assert_eq!(backoff.delay_for_retry(2), Duration::from_millis(300));
    /// ```
    pub fn linear(base: Duration) -> Self {
        Backoff::Linear { base }
    }

    /// Exponentially increasing delay.
    ///
    /// ```rust
    /// use millrace::Backoff;
    /// use std::time::Duration;
    ///
    /// let backoff = Backoff::exponential(Duration::from_millis(100));
    /// assert_eq!(backoff.delay_for_retry(0), Duration::from_millis(100));
    /// assert_eq!(backoff.delay_for_retry(3), Duration::from_millis(800));
    /// ```
    pub fn exponential(base: Duration) -> Self {
        Backoff::Exponential { base }
    }

    /// Returns true if this backoff never waits.
    pub fn is_disabled(&self) -> bool {
        match self {
            Backoff::Fixed(d) => d.is_zero(),
            Backoff::Linear { base } | Backoff::Exponential { base } => base.is_zero(),
        }
    }

    /// Delay before retry number `retry_index` (zero-based), without cap or jitter.
    pub fn delay_for_retry(&self, retry_index: u32) -> Duration {
        match self {
            Backoff::Fixed(d) => *d,
            Backoff::Linear { base } => base.saturating_mul(retry_index.saturating_add(1)),
            Backoff::Exponential { base } => {
                base.saturating_mul(2u32.saturating_pow(retry_index))
            }
        }
    }
}

/// Stretch `delay` by a random factor in `[0, factor]`.
///
/// Never shortens the delay. A no-op without the `jitter` feature.
pub(crate) fn apply_jitter(
    delay: Duration,
    #[cfg_attr(not(feature = "jitter"), allow(unused_variables))] factor: f64,
) -> Duration {
    #[cfg(feature = "jitter")]
    {
        use rand::Rng;
        if factor <= 0.0 || delay.is_zero() {
            return delay;
        }
        let extra = rand::rng().random_range(0.0..=factor);
        delay.saturating_add(delay.mul_f64(extra))
    }
    #[cfg(not(feature = "jitter"))]
    {
        delay
    }
}
