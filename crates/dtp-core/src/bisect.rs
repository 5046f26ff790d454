//! Halving search over the tests that ran before a failing test.
//!
//! # Algorithm
//!
//! One-sided delta debugging. With candidates `C` known to reproduce the
//! failure when followed by the failing test `F`:
//!
//! 1. If `|C| == 1`, that candidate is the answer.
//! 2. Split `C` at `|C| / 2` into `first` and `second`, order preserved.
//! 3. Run `first + [F]`. If `F` fails, continue with `first`; a test that
//!    did not execute cannot have left state behind. Otherwise continue
//!    with `second`.
//!
//! Each step issues one evaluation, so `N` candidates take between
//! `⌊log2 N⌋` and `⌈log2 N⌉` evaluations.
//!
//! # Limitations
//!
//! Step 3 assumes a single culprit. If two tests from different halves only
//! pollute together, neither half reproduces and the search drifts into the
//! second half. The driver's double-check catches the wrong answer.

use dtp_error::{PollutionError, Result};
use dtp_types::{CandidateSet, SearchState, TestId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::oracle::{EvaluationLedger, EvaluationPurpose, Oracle};

/// Which half a step kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Half {
    First,
    Second,
}

/// Record of one halving step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BisectStepRecord {
    /// Progress snapshot before the step ran.
    pub state: SearchState,
    pub first_half_len: usize,
    pub second_half_len: usize,
    /// Whether `first_half + [failing]` reproduced the failure.
    pub first_half_reproduced: bool,
    pub kept: Half,
    /// Ledger index of the evaluation this step issued.
    pub evaluation_index: usize,
}

/// Resumable halving state.
///
/// Each [`BisectState::advance`] issues exactly one evaluation and replaces
/// the candidate set with a fresh, smaller one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BisectState {
    failing_test: TestId,
    candidates: CandidateSet,
    steps_taken: usize,
}

impl BisectState {
    /// # Errors
    ///
    /// Returns [`PollutionError::EmptyCandidates`] if there is nothing to
    /// bisect, and [`PollutionError::FailingTestInCandidates`] if the
    /// failing test is listed among its own candidates.
    pub fn new(candidates: CandidateSet, failing_test: TestId) -> Result<Self> {
        if candidates.is_empty() {
            return Err(PollutionError::EmptyCandidates);
        }
        if candidates.contains(&failing_test) {
            return Err(PollutionError::FailingTestInCandidates {
                failing_test: failing_test.to_string(),
            });
        }
        Ok(Self {
            failing_test,
            candidates,
            steps_taken: 0,
        })
    }

    pub fn candidates(&self) -> &CandidateSet {
        &self.candidates
    }

    pub fn steps_taken(&self) -> usize {
        self.steps_taken
    }

    /// The culprit once a single candidate remains.
    pub fn resolved(&self) -> Option<&TestId> {
        self.candidates.single()
    }

    /// Progress snapshot for the next step.
    pub fn progress(&self) -> SearchState {
        SearchState::new(self.steps_taken + 1, self.candidates.len())
    }

    /// Run one halving step. Returns `None` when already resolved.
    ///
    /// # Errors
    ///
    /// Propagates cancellation and oracle errors from the ledger; the state
    /// is left unchanged in that case.
    pub fn advance<O: Oracle + ?Sized>(
        &mut self,
        ledger: &mut EvaluationLedger<'_, O>,
    ) -> Result<Option<BisectStepRecord>> {
        if self.resolved().is_some() {
            return Ok(None);
        }

        let state = self.progress();
        info!(
            failing_test = %self.failing_test,
            step = state.step,
            remaining = state.remaining,
            estimated_steps = state.estimated_steps,
            "bisect step"
        );

        let (first, second) = self.candidates.split_at_midpoint();
        let evaluation_index = ledger.evaluations();
        let reproduced = ledger.reproduces(
            EvaluationPurpose::BisectStep,
            &first.with_failing_last(&self.failing_test),
            &self.failing_test,
        )?;

        let step = BisectStepRecord {
            state,
            first_half_len: first.len(),
            second_half_len: second.len(),
            first_half_reproduced: reproduced,
            kept: if reproduced { Half::First } else { Half::Second },
            evaluation_index,
        };
        debug!(
            step = state.step,
            kept = ?step.kept,
            first_half_len = step.first_half_len,
            second_half_len = step.second_half_len,
            "bisect step resolved"
        );

        self.candidates = if reproduced { first } else { second };
        self.steps_taken += 1;
        Ok(Some(step))
    }
}

/// Result of [`narrow`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrowOutcome {
    pub culprit: TestId,
    /// Halving steps issued (one evaluation each).
    pub steps: usize,
}

/// Narrow `candidates` down to the single test that makes `failing_test`
/// fail.
///
/// Precondition: `candidates + [failing_test]` reproduces the failure. The
/// precondition is not re-checked here; [`crate::driver`] does that. Step
/// records are appended to the ledger.
///
/// # Errors
///
/// Returns [`PollutionError::EmptyCandidates`] for an empty set and
/// [`PollutionError::FailingTestInCandidates`] when `failing_test` is itself
/// a candidate. Propagates cancellation and oracle errors.
pub fn narrow<O: Oracle + ?Sized>(
    ledger: &mut EvaluationLedger<'_, O>,
    candidates: CandidateSet,
    failing_test: &TestId,
) -> Result<NarrowOutcome> {
    let mut state = BisectState::new(candidates, failing_test.clone())?;
    while let Some(step) = state.advance(ledger)? {
        ledger.record_step(step);
    }
    let culprit = state
        .resolved()
        .cloned()
        .ok_or_else(|| PollutionError::internal("bisection stopped with more than one candidate"))?;
    Ok(NarrowOutcome {
        culprit,
        steps: state.steps_taken(),
    })
}
