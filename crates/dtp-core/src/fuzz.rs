//! Randomized search for a failing ordering.
//!
//! Shuffles the whole universe up to `max_runs` times and stops at the first
//! run in which anything fails. The random source is injected so a given
//! seed always replays the same sequence of permutations.

use dtp_error::{PollutionError, Result};
use dtp_types::{TestId, TestOrder};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::oracle::{EvaluationLedger, EvaluationPurpose, Oracle};

/// A shuffled run that produced a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuzzFinding {
    /// 1-based run number.
    pub run: u32,
    /// The full permutation that was executed.
    pub permutation: TestOrder,
    /// First failed id in execution order.
    pub failing_test: TestId,
}

impl FuzzFinding {
    /// The permutation cut right after the failing test: exactly the tests
    /// that had run when it failed. This is the universe to bisect.
    pub fn seed_universe(&self) -> TestOrder {
        self.permutation
            .prefix_through(&self.failing_test)
            .unwrap_or_else(|| self.permutation.clone())
    }
}

/// Shuffle and run `universe` until something fails or `max_runs` runs are
/// spent. `max_runs == 0` returns `Ok(None)` without evaluating anything.
///
/// # Errors
///
/// Propagates cancellation and oracle errors. An oracle that reports
/// failures none of which belong to the evaluated ordering is treated as an
/// oracle failure.
pub fn fuzz<O, R>(
    ledger: &mut EvaluationLedger<'_, O>,
    universe: &TestOrder,
    max_runs: u32,
    rng: &mut R,
) -> Result<Option<FuzzFinding>>
where
    O: Oracle + ?Sized,
    R: Rng + ?Sized,
{
    for run in 1..=max_runs {
        let mut ids = universe.as_slice().to_vec();
        ids.shuffle(rng);
        let permutation = TestOrder::new(ids)?;

        info!(run, max_runs, tests = permutation.len(), "fuzz run");
        let result = ledger.evaluate(EvaluationPurpose::FuzzRun, &permutation, None)?;
        if result.is_empty() {
            continue;
        }

        let Some(failing_test) = result.first_failed_in(&permutation).cloned() else {
            warn!(run, failed = result.len(), "oracle reported failures outside the run");
            return Err(PollutionError::oracle_failure(format!(
                "run {run} reported {} failed tests, none of them in the evaluated ordering",
                result.len()
            )));
        };
        info!(run, failing_test = %failing_test, "fuzz run found a failing test");
        return Ok(Some(FuzzFinding {
            run,
            permutation,
            failing_test,
        }));
    }

    info!(max_runs, "fuzzing found no failing ordering");
    Ok(None)
}
