//! Search driver: pre-checks, bisection, double-check, and the fuzz entry
//! points.
//!
//! # Pipeline
//!
//! 1. **Locate**: the failing test must be part of the universe.
//! 2. **Isolation**: `[F]` alone must pass, otherwise it is not pollution.
//! 3. **Reproduction**: `candidates + [F]` must fail.
//! 4. **Bisect**: narrow the candidates to one test.
//! 5. **Double-check**: `[culprit, F]` must fail on its own; optionally fall
//!    back to a linear scan of `[c, F]` pairs.

use dtp_error::{PollutionError, Result};
use dtp_types::cx::Cx;
use dtp_types::{CandidateSet, TestId, TestOrder};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::bisect::{BisectStepRecord, narrow};
use crate::config::{CandidateScope, ConfirmFallback, SearchConfig};
use crate::fuzz::{FuzzFinding, fuzz};
use crate::oracle::{EvaluationLedger, EvaluationPurpose, Oracle};

/// How the culprit was confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confirmation {
    /// The halving result reproduced on the final double-check.
    DoubleCheck,
    /// The halving result did not reproduce; the linear fallback found one.
    LinearScan,
}

/// A confirmed polluting test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CulpritFinding {
    pub failing_test: TestId,
    pub culprit: TestId,
    pub confirmed_by: Confirmation,
    /// Candidates handed to the bisection.
    pub candidates: usize,
    pub steps: Vec<BisectStepRecord>,
    /// Oracle calls issued by the whole search.
    pub evaluations: usize,
}

/// Outcome of a fuzz search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuzzOutcome {
    Found(FuzzFinding),
    /// Every run passed. Says nothing about orderings that were not tried.
    Exhausted { runs: u32 },
}

/// Find the test whose side effects make `failing_test` fail.
///
/// # Errors
///
/// - [`PollutionError::FailingTestNotInUniverse`] before any evaluation
/// - [`PollutionError::NotPollution`] if the test fails alone
/// - [`PollutionError::NotReproducible`] if the ordering passes
/// - [`PollutionError::CulpritNotConfirmed`] if the final check fails
/// - cancellation and oracle errors, unchanged
pub fn find_culprit<O: Oracle + ?Sized>(
    oracle: &mut O,
    cx: &Cx,
    config: &SearchConfig,
    failing_test: &TestId,
    universe: &TestOrder,
) -> Result<CulpritFinding> {
    let mut ledger = EvaluationLedger::new(oracle, cx);
    locate_culprit(&mut ledger, config, failing_test, universe)
}

/// [`find_culprit`] against an existing ledger, so callers can keep the
/// evaluation records when the search fails.
///
/// # Errors
///
/// Same as [`find_culprit`].
pub fn locate_culprit<O: Oracle + ?Sized>(
    ledger: &mut EvaluationLedger<'_, O>,
    config: &SearchConfig,
    failing_test: &TestId,
    universe: &TestOrder,
) -> Result<CulpritFinding> {
    let candidates = match config.candidate_scope {
        CandidateScope::Preceding => universe.candidates_before(failing_test),
        CandidateScope::WholeUniverse => universe.candidates_excluding(failing_test),
    };
    let Some(candidates) = candidates else {
        warn!(
            failing_test = %failing_test,
            universe = universe.len(),
            "failing test not in universe"
        );
        return Err(PollutionError::FailingTestNotInUniverse {
            failing_test: failing_test.to_string(),
        });
    };

    info!(failing_test = %failing_test, "ensuring test passes by itself");
    if ledger.reproduces(
        EvaluationPurpose::IsolationCheck,
        &TestOrder::single(failing_test.clone()),
        failing_test,
    )? {
        warn!(failing_test = %failing_test, "test fails when run alone");
        return Err(PollutionError::NotPollution {
            failing_test: failing_test.to_string(),
        });
    }

    info!(
        failing_test = %failing_test,
        candidates = candidates.len(),
        scope = %config.candidate_scope,
        "ensuring test fails with candidate group"
    );
    if !ledger.reproduces(
        EvaluationPurpose::ReproductionCheck,
        &candidates.with_failing_last(failing_test),
        failing_test,
    )? {
        warn!(failing_test = %failing_test, "expected failure, but the ordering passed");
        return Err(PollutionError::NotReproducible {
            failing_test: failing_test.to_string(),
        });
    }

    let candidate_count = candidates.len();
    let outcome = narrow(ledger, candidates.clone(), failing_test)?;

    info!(
        failing_test = %failing_test,
        candidate = %outcome.culprit,
        "double checking the culprit"
    );
    let confirmed_by = if ledger.reproduces(
        EvaluationPurpose::DoubleCheck,
        &TestOrder::pair(outcome.culprit.clone(), failing_test.clone()),
        failing_test,
    )? {
        Confirmation::DoubleCheck
    } else {
        warn!(
            failing_test = %failing_test,
            candidate = %outcome.culprit,
            fallback = %config.confirm_fallback,
            "halving result did not reproduce on its own"
        );
        match config.confirm_fallback {
            ConfirmFallback::Stop => {
                return Err(PollutionError::CulpritNotConfirmed {
                    failing_test: failing_test.to_string(),
                    candidate: outcome.culprit.to_string(),
                });
            }
            ConfirmFallback::LinearScan => {
                let Some(found) = linear_scan(ledger, &candidates, failing_test)? else {
                    return Err(PollutionError::CulpritNotConfirmed {
                        failing_test: failing_test.to_string(),
                        candidate: outcome.culprit.to_string(),
                    });
                };
                return Ok(finish(
                    ledger,
                    failing_test,
                    found,
                    Confirmation::LinearScan,
                    candidate_count,
                ));
            }
        }
    };

    Ok(finish(
        ledger,
        failing_test,
        outcome.culprit,
        confirmed_by,
        candidate_count,
    ))
}

fn finish<O: Oracle + ?Sized>(
    ledger: &EvaluationLedger<'_, O>,
    failing_test: &TestId,
    culprit: TestId,
    confirmed_by: Confirmation,
    candidates: usize,
) -> CulpritFinding {
    info!(
        failing_test = %failing_test,
        culprit = %culprit,
        evaluations = ledger.evaluations(),
        "polluting test found"
    );
    CulpritFinding {
        failing_test: failing_test.clone(),
        culprit,
        confirmed_by,
        candidates,
        steps: ledger.steps().to_vec(),
        evaluations: ledger.evaluations(),
    }
}

/// Pair every candidate with the failing test, in order; first reproducing
/// pair wins.
fn linear_scan<O: Oracle + ?Sized>(
    ledger: &mut EvaluationLedger<'_, O>,
    candidates: &CandidateSet,
    failing_test: &TestId,
) -> Result<Option<TestId>> {
    for candidate in candidates {
        let pair = TestOrder::pair(candidate.clone(), failing_test.clone());
        if ledger.reproduces(EvaluationPurpose::LinearScan, &pair, failing_test)? {
            return Ok(Some(candidate.clone()));
        }
    }
    Ok(None)
}

/// Shuffle `universe` up to `config.max_fuzz_runs` times using a
/// [`StdRng`] seeded from `config.fuzz_seed`.
///
/// # Errors
///
/// Propagates cancellation and oracle errors.
pub fn fuzz_universe<O: Oracle + ?Sized>(
    oracle: &mut O,
    cx: &Cx,
    config: &SearchConfig,
    universe: &TestOrder,
) -> Result<FuzzOutcome> {
    let mut ledger = EvaluationLedger::new(oracle, cx);
    let mut rng = StdRng::seed_from_u64(config.fuzz_seed);
    fuzz_with(&mut ledger, universe, config.max_fuzz_runs, &mut rng)
}

/// Fuzz with an explicit random source.
///
/// # Errors
///
/// Propagates cancellation and oracle errors.
pub fn fuzz_with<O, R>(
    ledger: &mut EvaluationLedger<'_, O>,
    universe: &TestOrder,
    max_runs: u32,
    rng: &mut R,
) -> Result<FuzzOutcome>
where
    O: Oracle + ?Sized,
    R: rand::Rng + ?Sized,
{
    Ok(match fuzz(ledger, universe, max_runs, rng)? {
        Some(finding) => FuzzOutcome::Found(finding),
        None => FuzzOutcome::Exhausted { runs: max_runs },
    })
}

/// Fuzz for a failing ordering, then bisect it.
///
/// # Errors
///
/// [`PollutionError::FuzzExhausted`] when no run failed; otherwise the
/// errors of [`find_culprit`].
pub fn fuzz_and_bisect<O: Oracle + ?Sized>(
    oracle: &mut O,
    cx: &Cx,
    config: &SearchConfig,
    universe: &TestOrder,
) -> Result<CulpritFinding> {
    let mut ledger = EvaluationLedger::new(oracle, cx);
    let mut rng = StdRng::seed_from_u64(config.fuzz_seed);
    match fuzz_with(&mut ledger, universe, config.max_fuzz_runs, &mut rng)? {
        FuzzOutcome::Found(finding) => {
            let seed_universe = finding.seed_universe();
            locate_culprit(&mut ledger, config, &finding.failing_test, &seed_universe)
        }
        FuzzOutcome::Exhausted { runs } => Err(PollutionError::FuzzExhausted { runs }),
    }
}
