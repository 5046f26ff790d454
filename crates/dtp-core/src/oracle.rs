//! The oracle contract and the ledger every evaluation goes through.
//!
//! An [`Oracle`] runs an ordered list of tests in one process and reports
//! which of them failed. Real adapters shell out to a test runner; the
//! engine only sees this trait, so it can be driven by deterministic
//! synthetic oracles in tests.
//!
//! Oracle evaluations are the unit of cost. The [`EvaluationLedger`] counts
//! them, checks for cancellation before (never during) each one, and keeps a
//! record per call for the final report.

use std::time::Instant;

use dtp_error::{PollutionError, Result};
use dtp_types::cx::Cx;
use dtp_types::{FailureResult, TestId, TestOrder};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::bisect::BisectStepRecord;
use crate::digest::order_digest;

/// Executes an ordering of tests and reports the ones that failed.
///
/// Implementations must run `order` sequentially, in the given order, and
/// block until the run finishes. Runner crashes and unparseable output are
/// reported as [`PollutionError::OracleFailure`]; per-run time limits as
/// [`PollutionError::OracleTimeout`].
pub trait Oracle {
    /// Run `order` and return the failed subset.
    ///
    /// # Errors
    ///
    /// Returns an oracle error when the runner itself could not produce a
    /// result. Test failures are not errors; they are the returned set.
    fn evaluate(&mut self, order: &TestOrder) -> Result<FailureResult>;
}

impl<F> Oracle for F
where
    F: FnMut(&TestOrder) -> Result<FailureResult>,
{
    fn evaluate(&mut self, order: &TestOrder) -> Result<FailureResult> {
        self(order)
    }
}

/// Why an evaluation was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationPurpose {
    /// Failing test alone.
    IsolationCheck,
    /// Whole candidate ordering followed by the failing test.
    ReproductionCheck,
    /// First half of the current candidates followed by the failing test.
    BisectStep,
    /// `[culprit, failing]` after halving converged.
    DoubleCheck,
    /// `[candidate, failing]` during the linear fallback.
    LinearScan,
    /// One shuffled run of the whole universe.
    FuzzRun,
}

impl EvaluationPurpose {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IsolationCheck => "isolation_check",
            Self::ReproductionCheck => "reproduction_check",
            Self::BisectStep => "bisect_step",
            Self::DoubleCheck => "double_check",
            Self::LinearScan => "linear_scan",
            Self::FuzzRun => "fuzz_run",
        }
    }
}

/// One oracle call as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    /// 0-based call index within the search.
    pub index: usize,
    pub purpose: EvaluationPurpose,
    /// Number of tests submitted.
    pub order_len: usize,
    /// Digest of the submitted ordering.
    pub order_digest: String,
    /// Whether the designated failing test failed; `None` when the call had
    /// no designated test (fuzz runs).
    pub target_failed: Option<bool>,
    /// Size of the returned failure set.
    pub failed_count: usize,
    /// Wall-clock runtime of the call.
    pub runtime_ms: u64,
    /// Oracle error that ended the call; `target_failed` is `None` then.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Counts, guards and records oracle evaluations for one search.
pub struct EvaluationLedger<'a, O: Oracle + ?Sized> {
    oracle: &'a mut O,
    cx: &'a Cx,
    records: Vec<EvaluationRecord>,
    steps: Vec<BisectStepRecord>,
}

impl<'a, O: Oracle + ?Sized> EvaluationLedger<'a, O> {
    pub fn new(oracle: &'a mut O, cx: &'a Cx) -> Self {
        Self {
            oracle,
            cx,
            records: Vec::new(),
            steps: Vec::new(),
        }
    }

    /// Oracle calls issued so far.
    pub fn evaluations(&self) -> usize {
        self.records.len()
    }

    pub fn records(&self) -> &[EvaluationRecord] {
        &self.records
    }

    pub fn steps(&self) -> &[BisectStepRecord] {
        &self.steps
    }

    pub(crate) fn record_step(&mut self, step: BisectStepRecord) {
        self.steps.push(step);
    }

    /// Consume the ledger, returning evaluation and step records.
    pub fn into_parts(self) -> (Vec<EvaluationRecord>, Vec<BisectStepRecord>) {
        (self.records, self.steps)
    }

    /// Run one evaluation.
    ///
    /// # Errors
    ///
    /// Returns [`PollutionError::Cancelled`] if cancellation was requested
    /// before the call. Oracle errors are propagated unchanged after the
    /// failed call is recorded with its error text.
    pub fn evaluate(
        &mut self,
        purpose: EvaluationPurpose,
        order: &TestOrder,
        target: Option<&TestId>,
    ) -> Result<FailureResult> {
        if self.cx.checkpoint().is_err() {
            warn!(
                evaluations = self.records.len(),
                purpose = purpose.as_str(),
                "search cancelled before next evaluation"
            );
            return Err(PollutionError::Cancelled {
                evaluations: self.records.len(),
            });
        }

        let index = self.records.len();
        let digest = order_digest(order);
        let started = Instant::now();
        let outcome = self.oracle.evaluate(order);
        let runtime_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let result = match outcome {
            Ok(result) => result,
            Err(error) => {
                warn!(
                    evaluation = index,
                    purpose = purpose.as_str(),
                    order_digest = %digest,
                    runtime_ms,
                    %error,
                    "oracle evaluation failed"
                );
                self.records.push(EvaluationRecord {
                    index,
                    purpose,
                    order_len: order.len(),
                    order_digest: digest,
                    target_failed: None,
                    failed_count: 0,
                    runtime_ms,
                    error: Some(error.to_string()),
                });
                return Err(error);
            }
        };

        let target_failed = target.map(|id| result.contains(id));
        debug!(
            evaluation = index,
            purpose = purpose.as_str(),
            order_len = order.len(),
            order_digest = %digest,
            failed = result.len(),
            ?target_failed,
            runtime_ms,
            "oracle evaluation complete"
        );

        self.records.push(EvaluationRecord {
            index,
            purpose,
            order_len: order.len(),
            order_digest: digest,
            target_failed,
            failed_count: result.len(),
            runtime_ms,
            error: None,
        });
        Ok(result)
    }

    /// Evaluate `order` and report whether `failing` failed.
    ///
    /// # Errors
    ///
    /// Same as [`EvaluationLedger::evaluate`].
    pub fn reproduces(
        &mut self,
        purpose: EvaluationPurpose,
        order: &TestOrder,
        failing: &TestId,
    ) -> Result<bool> {
        Ok(self
            .evaluate(purpose, order, Some(failing))?
            .contains(failing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_are_oracles() {
        let mut calls = 0;
        let mut oracle = |order: &TestOrder| -> Result<FailureResult> {
            calls += 1;
            Ok(FailureResult::from_failed(order.last().cloned()))
        };
        let cx = Cx::new();
        let mut ledger = EvaluationLedger::new(&mut oracle, &cx);
        let failing = TestId::from("f");
        let order = TestOrder::new(["a", "f"]).unwrap();
        assert!(
            ledger
                .reproduces(EvaluationPurpose::ReproductionCheck, &order, &failing)
                .unwrap()
        );
        assert_eq!(ledger.evaluations(), 1);
        let record = &ledger.records()[0];
        assert_eq!(record.order_len, 2);
        assert_eq!(record.target_failed, Some(true));
        assert_eq!(record.failed_count, 1);
        assert!(record.error.is_none());
        drop(ledger);
        assert_eq!(calls, 1);
    }

    #[test]
    fn cancellation_is_checked_before_the_call() {
        let mut calls = 0;
        let mut oracle = |_: &TestOrder| -> Result<FailureResult> {
            calls += 1;
            Ok(FailureResult::passed())
        };
        let cx = Cx::new();
        cx.cancel();
        let mut ledger = EvaluationLedger::new(&mut oracle, &cx);
        let order = TestOrder::new(["a"]).unwrap();
        let err = ledger
            .evaluate(EvaluationPurpose::FuzzRun, &order, None)
            .unwrap_err();
        assert!(matches!(err, PollutionError::Cancelled { evaluations: 0 }));
        assert_eq!(ledger.evaluations(), 0);
        drop(ledger);
        assert_eq!(calls, 0);
    }

    #[test]
    fn oracle_errors_propagate_unchanged() {
        let mut oracle = |_: &TestOrder| -> Result<FailureResult> {
            Err(PollutionError::OracleTimeout { timeout_ms: 500 })
        };
        let cx = Cx::new();
        let mut ledger = EvaluationLedger::new(&mut oracle, &cx);
        let order = TestOrder::new(["a"]).unwrap();
        let err = ledger
            .evaluate(EvaluationPurpose::FuzzRun, &order, None)
            .unwrap_err();
        assert!(matches!(err, PollutionError::OracleTimeout { timeout_ms: 500 }));
    }

    #[test]
    fn failed_call_is_recorded_with_its_error() {
        let mut calls = 0;
        let mut oracle = |order: &TestOrder| -> Result<FailureResult> {
            calls += 1;
            if calls == 2 {
                return Err(PollutionError::oracle_failure("runner exited with status 3"));
            }
            Ok(FailureResult::from_failed(order.last().cloned()))
        };
        let cx = Cx::new();
        let mut ledger = EvaluationLedger::new(&mut oracle, &cx);
        let failing = TestId::from("f");
        let order = TestOrder::new(["a", "f"]).unwrap();
        assert!(
            ledger
                .reproduces(EvaluationPurpose::ReproductionCheck, &order, &failing)
                .unwrap()
        );
        let err = ledger
            .reproduces(EvaluationPurpose::BisectStep, &order, &failing)
            .unwrap_err();
        assert!(err.is_oracle_error());

        assert_eq!(ledger.evaluations(), 2);
        let failed = &ledger.records()[1];
        assert_eq!(failed.index, 1);
        assert_eq!(failed.purpose, EvaluationPurpose::BisectStep);
        assert_eq!(failed.order_len, 2);
        assert_eq!(failed.target_failed, None);
        assert_eq!(failed.failed_count, 0);
        assert_eq!(
            failed.error.as_deref(),
            Some("oracle failed: runner exited with status 3")
        );

        let json = serde_json::to_value(&ledger.records()[0]).unwrap();
        assert!(json.get("error").is_none());
    }
}
