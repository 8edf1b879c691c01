//! Property tests for step policies.

use millrace::{Backoff, StepPolicy};
use proptest::prelude::*;
use std::time::Duration;

fn backoff_strategy() -> impl Strategy<Value = Backoff> {
    let base = (0u64..5_000).prop_map(Duration::from_millis);
    prop_oneof![
        base.clone().prop_map(Backoff::fixed),
        base.clone().prop_map(Backoff::linear),
        base.prop_map(Backoff::exponential),
    ]
}

proptest! {
    #[test]
    fn max_attempts_is_retry_limit_plus_one(retries in 0u32..1_000) {
        let policy = StepPolicy::default().with_retry_limit(retries);
        prop_assert_eq!(policy.max_attempts(), retries + 1);
    }

    #[test]
    fn fixed_backoff_is_constant(millis in 0u64..10_000, retry in 0u32..64) {
        let policy = StepPolicy::new(Duration::ZERO, 3, Duration::from_millis(millis));
        prop_assert_eq!(policy.delay_before_retry(retry), Duration::from_millis(millis));
    }

    #[test]
    fn delays_never_shrink_between_retries(backoff in backoff_strategy(), retry in 0u32..40) {
        prop_assert!(backoff.delay_for_retry(retry + 1) >= backoff.delay_for_retry(retry));
    }

    #[test]
    fn cap_bounds_every_delay(
        backoff in backoff_strategy(),
        cap in 1u64..10_000,
        retry in 0u32..64,
    ) {
        let cap = Duration::from_millis(cap);
        let policy = StepPolicy::default()
            .with_backoff_strategy(backoff)
            .with_max_backoff(cap);
        let delay = policy.delay_before_retry(retry);
        prop_assert!(delay <= cap);
        prop_assert_eq!(delay, backoff.delay_for_retry(retry).min(cap));
    }

    #[test]
    fn jitter_factor_is_clamped(factor in proptest::num::f64::ANY) {
        let jitter = StepPolicy::default().with_jitter(factor).jitter_factor();
        prop_assert!((0.0..=1.0).contains(&jitter));
    }

    #[test]
    fn builders_only_touch_their_field(
        timeout in 0u64..60_000,
        retries in 0u32..16,
        backoff in backoff_strategy(),
    ) {
        let policy = StepPolicy::default()
            .with_timeout(Duration::from_millis(timeout))
            .with_retry_limit(retries)
            .with_backoff_strategy(backoff);
        prop_assert_eq!(policy.timeout(), Duration::from_millis(timeout));
        prop_assert_eq!(policy.timeout_enabled(), timeout > 0);
        prop_assert_eq!(policy.retry_limit(), retries);
        prop_assert_eq!(policy.backoff(), &backoff);
        prop_assert_eq!(policy.max_backoff(), None);
    }
}

#[cfg(feature = "serde")]
#[test]
fn policy_from_configuration() {
    let json = r#"{
        "timeout": { "secs": 2, "nanos": 0 },
        "retry_limit": 3,
        "backoff": { "exponential": { "base": { "secs": 0, "nanos": 100000000 } } }
    }"#;

    let policy: StepPolicy = serde_json::from_str(json).unwrap();
    assert_eq!(policy.timeout(), Duration::from_secs(2));
    assert_eq!(policy.retry_limit(), 3);
    assert_eq!(policy.max_backoff(), None);
    assert_eq!(policy.delay_before_retry(2), Duration::from_millis(400));
}
