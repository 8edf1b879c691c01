//! Run identifiers and the per-attempt outcome latch.
//!
//! The body, the timeout watcher and any external canceller race to decide how
//! an attempt ended. The latch packs the current run id and the outcome into a
//! single atomic word, so "is this still my attempt?" and "has anyone decided
//! yet?" are answered by one compare-and-swap. A watcher armed for an earlier
//! run can never settle a later one.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

const OUTCOME_BITS: u32 = 3;
const OUTCOME_MASK: u64 = (1 << OUTCOME_BITS) - 1;
const UNSET: u64 = 0;

/// Identifier of one attempt of one step.
///
/// Run ids are minted from a chain-scoped counter, start at 1 and never repeat
/// within a chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunId(pub(crate) u64);

impl RunId {
    /// The raw counter value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run-{}", self.0)
    }
}

/// How an attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// The body completed without error.
    Succeeded,
    /// The body returned an error.
    Failed,
    /// The timeout watcher fired first.
    TimedOut,
    /// The chain was canceled.
    Canceled,
}

impl Outcome {
    /// Returns true for every outcome except [`Outcome::Succeeded`].
    pub fn is_failure(self) -> bool {
        !matches!(self, Outcome::Succeeded)
    }

    fn code(self) -> u64 {
        match self {
            Outcome::Succeeded => 1,
            Outcome::Failed => 2,
            Outcome::TimedOut => 3,
            Outcome::Canceled => 4,
        }
    }

    fn from_code(code: u64) -> Option<Self> {
        match code {
            1 => Some(Outcome::Succeeded),
            2 => Some(Outcome::Failed),
            3 => Some(Outcome::TimedOut),
            4 => Some(Outcome::Canceled),
            _ => None,
        }
    }
}

fn pack(run: RunId, outcome: Option<Outcome>) -> u64 {
    (run.0 << OUTCOME_BITS) | outcome.map_or(UNSET, Outcome::code)
}

fn unpack(word: u64) -> (RunId, Option<Outcome>) {
    (
        RunId(word >> OUTCOME_BITS),
        Outcome::from_code(word & OUTCOME_MASK),
    )
}

/// First-writer-wins latch for the in-flight attempt.
#[derive(Debug, Default)]
pub(crate) struct OutcomeLatch {
    word: AtomicU64,
    minted: AtomicU64,
}

impl OutcomeLatch {
    /// Mint a fresh run id and make it the current, unsettled attempt.
    pub(crate) fn mint(&self) -> RunId {
        let run = RunId(self.minted.fetch_add(1, Ordering::SeqCst) + 1);
        self.word.store(pack(run, None), Ordering::SeqCst);
        run
    }

    /// The run id of the current attempt (`RunId(0)` before the first mint).
    pub(crate) fn current_run(&self) -> RunId {
        unpack(self.word.load(Ordering::SeqCst)).0
    }

    /// Outcome of `run`, or `None` if it is unsettled or no longer current.
    pub(crate) fn outcome_of(&self, run: RunId) -> Option<Outcome> {
        match unpack(self.word.load(Ordering::SeqCst)) {
            (current, outcome) if current == run => outcome,
            _ => None,
        }
    }

    /// Settle `run` with `outcome` if it is still current and unsettled.
    ///
    /// Returns false if someone else settled first or the run was superseded.
    pub(crate) fn settle(&self, run: RunId, outcome: Outcome) -> bool {
        self.word
            .compare_exchange(
                pack(run, None),
                pack(run, Some(outcome)),
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    /// Claim `run` for a result the body is about to produce.
    ///
    /// The retry loop reads the body's own result once a run is claimed, so
    /// the stored outcome only records that the body got there first.
    pub(crate) fn claim_for_body(&self, run: RunId) -> bool {
        self.settle(run, Outcome::Succeeded)
    }

    /// Settle the current run as canceled.
    ///
    /// Cancellation overrides a timeout recorded for the same run, but never a
    /// success or failure reported by the body. Returns the run that was
    /// canceled, if any.
    pub(crate) fn preempt_with_cancel(&self) -> Option<RunId> {
        let mut word = self.word.load(Ordering::SeqCst);
        loop {
            let (run, outcome) = unpack(word);
            if run.0 == 0 {
                return None;
            }
            match outcome {
                None | Some(Outcome::TimedOut) => {}
                Some(_) => return None,
            }
            match self.word.compare_exchange_weak(
                word,
                pack(run, Some(Outcome::Canceled)),
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return Some(run),
                Err(actual) => word = actual,
            }
        }
    }
}

#[cfg(test)]
mod latch_tests {
    use super::*;

    #[test]
    fn test_mint_is_monotonic_and_unsettled() {
        let latch = OutcomeLatch::default();
        assert_eq!(latch.current_run(), RunId(0));

        let a = latch.mint();
        let b = latch.mint();
        assert_eq!(a, RunId(1));
        assert_eq!(b, RunId(2));
        assert_eq!(latch.current_run(), b);
        assert_eq!(latch.outcome_of(b), None);
    }

    #[test]
    fn test_first_settle_wins() {
        let latch = OutcomeLatch::default();
        let run = latch.mint();

        assert!(latch.settle(run, Outcome::TimedOut));
        assert!(!latch.settle(run, Outcome::Succeeded));
        assert_eq!(latch.outcome_of(run), Some(Outcome::TimedOut));
    }

    #[test]
    fn test_stale_run_cannot_settle() {
        let latch = OutcomeLatch::default();
        let first = latch.mint();
        let second = latch.mint();

        assert!(!latch.settle(first, Outcome::TimedOut));
        assert_eq!(latch.outcome_of(second), None);
        assert_eq!(latch.outcome_of(first), None);
        assert!(latch.settle(second, Outcome::Succeeded));
    }

    #[test]
    fn test_cancel_overrides_timeout() {
        let latch = OutcomeLatch::default();
        let run = latch.mint();
        assert!(latch.settle(run, Outcome::TimedOut));

        assert_eq!(latch.preempt_with_cancel(), Some(run));
        assert_eq!(latch.outcome_of(run), Some(Outcome::Canceled));
    }

    #[test]
    fn test_cancel_does_not_override_body_outcome() {
        let latch = OutcomeLatch::default();
        let run = latch.mint();
        assert!(latch.settle(run, Outcome::Succeeded));

        assert_eq!(latch.preempt_with_cancel(), None);
        assert_eq!(latch.outcome_of(run), Some(Outcome::Succeeded));
    }

    #[test]
    fn test_cancel_before_first_mint_is_noop() {
        let latch = OutcomeLatch::default();
        assert_eq!(latch.preempt_with_cancel(), None);
    }

    #[test]
    fn test_outcome_failure_classification() {
        assert!(!Outcome::Succeeded.is_failure());
        assert!(Outcome::Failed.is_failure());
        assert!(Outcome::TimedOut.is_failure());
        assert!(Outcome::Canceled.is_failure());
    }

    #[test]
    fn test_run_id_display() {
        assert_eq!(RunId(7).to_string(), "run-7");
        assert_eq!(RunId(7).get(), 7);
    }
}
