//! Structured, serializable search results for a presentation layer.
//!
//! [`run_search`] never fails: every outcome, including precondition
//! violations and oracle errors, is folded into a [`SearchReport`] together
//! with the evaluation ledger, so a front-end can render or persist it.

use std::path::Path;

use dtp_error::{ErrorKind, PollutionError, Result};
use dtp_types::cx::Cx;
use dtp_types::{TestId, TestOrder};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::bisect::BisectStepRecord;
use crate::config::SearchConfig;
use crate::digest::search_id;
use crate::driver::{Confirmation, FuzzOutcome, fuzz_with, locate_culprit};
use crate::oracle::{EvaluationLedger, EvaluationRecord, Oracle};

/// Schema version for persisted search reports.
pub const SEARCH_REPORT_SCHEMA_VERSION: u32 = 1;

/// What the caller asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum SearchRequest {
    /// Locate the culprit for a known failing test.
    Bisect {
        failing_test: TestId,
        universe: TestOrder,
    },
    /// Only look for a failing ordering.
    Fuzz { universe: TestOrder },
    /// Look for a failing ordering, then bisect it.
    FuzzThenBisect { universe: TestOrder },
}

impl SearchRequest {
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Bisect { .. } => "bisect",
            Self::Fuzz { .. } => "fuzz",
            Self::FuzzThenBisect { .. } => "fuzz_then_bisect",
        }
    }

    pub fn universe(&self) -> &TestOrder {
        match self {
            Self::Bisect { universe, .. }
            | Self::Fuzz { universe }
            | Self::FuzzThenBisect { universe } => universe,
        }
    }
}

/// Final outcome of a search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum SearchOutcome {
    /// A confirmed polluting test.
    Culprit {
        failing_test: TestId,
        culprit: TestId,
        confirmed_by: Confirmation,
    },
    /// Fuzzing surfaced a failing ordering (fuzz-only mode).
    FailingOrder {
        run: u32,
        failing_test: TestId,
        ordering: TestOrder,
    },
    /// The search stopped with a typed error.
    Failed {
        kind: ErrorKind,
        message: String,
        suggestion: Option<String>,
    },
}

impl SearchOutcome {
    fn from_error(error: &PollutionError) -> Self {
        Self::Failed {
            kind: error.kind(),
            message: error.to_string(),
            suggestion: error.suggestion().map(ToOwned::to_owned),
        }
    }
}

/// Versioned report of one search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchReport {
    pub schema_version: u32,
    /// Digest of mode, failing test, universe and seed.
    pub report_id: String,
    pub mode: String,
    pub failing_test: Option<TestId>,
    pub universe_size: usize,
    pub config: SearchConfig,
    pub outcome: SearchOutcome,
    pub steps: Vec<BisectStepRecord>,
    pub evaluations: Vec<EvaluationRecord>,
}

impl SearchReport {
    /// The culprit, if one was confirmed.
    pub fn culprit(&self) -> Option<&TestId> {
        match &self.outcome {
            SearchOutcome::Culprit { culprit, .. } => Some(culprit),
            _ => None,
        }
    }

    /// The error kind, if the search failed.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match &self.outcome {
            SearchOutcome::Failed { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Total oracle evaluations.
    pub fn evaluation_count(&self) -> usize {
        self.evaluations.len()
    }

    /// One-line operator summary.
    pub fn summary_line(&self) -> String {
        let n = self.evaluations.len();
        match &self.outcome {
            SearchOutcome::Culprit {
                failing_test,
                culprit,
                ..
            } => format!(
                "[{}] the polluting test for {failing_test} is: {culprit} ({n} evaluations)",
                self.report_id
            ),
            SearchOutcome::FailingOrder {
                run, failing_test, ..
            } => format!(
                "[{}] run {run} found failing test {failing_test} ({n} evaluations)",
                self.report_id
            ),
            SearchOutcome::Failed { kind, message, .. } => {
                format!("[{}] {kind}: {message} ({n} evaluations)", self.report_id)
            }
        }
    }

    /// Serialize this report as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns `Err` when serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|error| PollutionError::encoding(format!("serialize: {error}")))
    }

    /// Deserialize a report from JSON, rejecting unknown schema versions.
    ///
    /// # Errors
    ///
    /// Returns `Err` when JSON is malformed or the schema version differs.
    pub fn from_json(json: &str) -> Result<Self> {
        let report: Self = serde_json::from_str(json)
            .map_err(|error| PollutionError::encoding(format!("parse: {error}")))?;
        if report.schema_version != SEARCH_REPORT_SCHEMA_VERSION {
            return Err(PollutionError::encoding(format!(
                "schema_version expected {SEARCH_REPORT_SCHEMA_VERSION}, got {}",
                report.schema_version
            )));
        }
        Ok(report)
    }
}

/// Run `request` to completion and fold every outcome into a report.
pub fn run_search<O: Oracle + ?Sized>(
    oracle: &mut O,
    cx: &Cx,
    config: &SearchConfig,
    request: &SearchRequest,
) -> SearchReport {
    let universe = request.universe();
    let mut ledger = EvaluationLedger::new(oracle, cx);

    let (failing_test, outcome) = match request {
        SearchRequest::Bisect {
            failing_test,
            universe,
        } => {
            let outcome = match locate_culprit(&mut ledger, config, failing_test, universe) {
                Ok(finding) => SearchOutcome::Culprit {
                    failing_test: finding.failing_test,
                    culprit: finding.culprit,
                    confirmed_by: finding.confirmed_by,
                },
                Err(error) => SearchOutcome::from_error(&error),
            };
            (Some(failing_test.clone()), outcome)
        }
        SearchRequest::Fuzz { universe } => {
            let mut rng = StdRng::seed_from_u64(config.fuzz_seed);
            match fuzz_with(&mut ledger, universe, config.max_fuzz_runs, &mut rng) {
                Ok(FuzzOutcome::Found(finding)) => (
                    Some(finding.failing_test.clone()),
                    SearchOutcome::FailingOrder {
                        run: finding.run,
                        ordering: finding.seed_universe(),
                        failing_test: finding.failing_test,
                    },
                ),
                Ok(FuzzOutcome::Exhausted { runs }) => (
                    None,
                    SearchOutcome::from_error(&PollutionError::FuzzExhausted { runs }),
                ),
                Err(error) => (None, SearchOutcome::from_error(&error)),
            }
        }
        SearchRequest::FuzzThenBisect { universe } => {
            let mut rng = StdRng::seed_from_u64(config.fuzz_seed);
            match fuzz_with(&mut ledger, universe, config.max_fuzz_runs, &mut rng) {
                Ok(FuzzOutcome::Found(finding)) => {
                    let seed_universe = finding.seed_universe();
                    let outcome = match locate_culprit(
                        &mut ledger,
                        config,
                        &finding.failing_test,
                        &seed_universe,
                    ) {
                        Ok(found) => SearchOutcome::Culprit {
                            failing_test: found.failing_test,
                            culprit: found.culprit,
                            confirmed_by: found.confirmed_by,
                        },
                        Err(error) => SearchOutcome::from_error(&error),
                    };
                    (Some(finding.failing_test), outcome)
                }
                Ok(FuzzOutcome::Exhausted { runs }) => (
                    None,
                    SearchOutcome::from_error(&PollutionError::FuzzExhausted { runs }),
                ),
                Err(error) => (None, SearchOutcome::from_error(&error)),
            }
        }
    };

    let (evaluations, steps) = ledger.into_parts();
    let request_target = match request {
        SearchRequest::Bisect { failing_test, .. } => Some(failing_test.as_str()),
        _ => None,
    };
    SearchReport {
        schema_version: SEARCH_REPORT_SCHEMA_VERSION,
        report_id: search_id(request.mode(), request_target, universe, config.fuzz_seed),
        mode: request.mode().to_owned(),
        failing_test,
        universe_size: universe.len(),
        config: config.clone(),
        outcome,
        steps,
        evaluations,
    }
}

/// Persist a search report to JSON.
///
/// # Errors
///
/// Returns `Err` if serialization or file I/O fails.
pub fn write_search_report(path: &Path, report: &SearchReport) -> Result<()> {
    let json = report.to_json()?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Load a search report from JSON.
///
/// # Errors
///
/// Returns `Err` if file I/O, JSON parsing or the schema check fails.
pub fn load_search_report(path: &Path) -> Result<SearchReport> {
    let json = std::fs::read_to_string(path)?;
    SearchReport::from_json(&json)
}

#[cfg(test)]
mod tests {
    use dtp_types::FailureResult;

    use super::*;

    fn order(ids: &[&str]) -> TestOrder {
        TestOrder::new(ids.iter().copied()).unwrap()
    }

    fn pollution_oracle(order: &TestOrder) -> Result<FailureResult> {
        let polluted = order.contains(&TestId::from("B"));
        if polluted && order.last().map(TestId::as_str) == Some("F") {
            Ok(FailureResult::from_failed(["F"]))
        } else {
            Ok(FailureResult::passed())
        }
    }

    #[test]
    fn bisect_report_carries_culprit_and_ledger() {
        let mut oracle = pollution_oracle;
        let request = SearchRequest::Bisect {
            failing_test: TestId::from("F"),
            universe: order(&["A", "B", "C", "D", "E", "F"]),
        };
        let report = run_search(&mut oracle, &Cx::new(), &SearchConfig::default(), &request);
        assert_eq!(report.culprit().map(TestId::as_str), Some("B"));
        assert_eq!(report.mode, "bisect");
        assert_eq!(report.universe_size, 6);
        assert_eq!(report.evaluation_count(), 5);
        assert_eq!(report.steps.len(), 2);
        assert!(report.summary_line().contains("the polluting test for F is: B"));
    }

    #[test]
    fn failures_become_typed_outcomes() {
        let mut oracle = |_: &TestOrder| -> Result<FailureResult> { Ok(FailureResult::passed()) };
        let request = SearchRequest::Bisect {
            failing_test: TestId::from("F"),
            universe: order(&["A", "F"]),
        };
        let report = run_search(&mut oracle, &Cx::new(), &SearchConfig::default(), &request);
        assert_eq!(report.error_kind(), Some(ErrorKind::NotReproducible));
        assert!(report.culprit().is_none());
        assert_eq!(report.evaluation_count(), 2);
    }

    #[test]
    fn fuzz_exhaustion_is_reported() {
        let mut oracle = |_: &TestOrder| -> Result<FailureResult> { Ok(FailureResult::passed()) };
        let config = SearchConfig::default().with_max_fuzz_runs(3);
        let request = SearchRequest::Fuzz {
            universe: order(&["A", "B"]),
        };
        let report = run_search(&mut oracle, &Cx::new(), &config, &request);
        assert_eq!(report.error_kind(), Some(ErrorKind::FuzzExhausted));
        assert_eq!(report.evaluation_count(), 3);
        assert!(report.failing_test.is_none());
    }

    #[test]
    fn json_roundtrip_and_schema_check() {
        let mut oracle = pollution_oracle;
        let request = SearchRequest::Bisect {
            failing_test: TestId::from("F"),
            universe: order(&["A", "B", "F"]),
        };
        let report = run_search(&mut oracle, &Cx::new(), &SearchConfig::default(), &request);
        let json = report.to_json().unwrap();
        assert!(json.contains("\"status\": \"culprit\""));
        let restored = SearchReport::from_json(&json).unwrap();
        assert_eq!(restored, report);

        let bad = json.replace("\"schema_version\": 1", "\"schema_version\": 99");
        let err = SearchReport::from_json(&bad).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Encoding);
    }

    #[test]
    fn write_and_load_report() {
        let mut oracle = pollution_oracle;
        let request = SearchRequest::Bisect {
            failing_test: TestId::from("F"),
            universe: order(&["A", "B", "C", "F"]),
        };
        let report = run_search(&mut oracle, &Cx::new(), &SearchConfig::default(), &request);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("search_report.json");
        write_search_report(&path, &report).unwrap();
        let loaded = load_search_report(&path).unwrap();
        assert_eq!(loaded, report);
    }

    #[test]
    fn report_id_is_deterministic() {
        let request = SearchRequest::Bisect {
            failing_test: TestId::from("F"),
            universe: order(&["A", "B", "F"]),
        };
        let mut first_oracle = pollution_oracle;
        let mut second_oracle = pollution_oracle;
        let first = run_search(&mut first_oracle, &Cx::new(), &SearchConfig::default(), &request);
        let second = run_search(&mut second_oracle, &Cx::new(), &SearchConfig::default(), &request);
        assert_eq!(first.report_id, second.report_id);
    }
}
