use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Primary error type for pollution searches.
///
/// Every variant is a typed result surfaced to the caller. None of them is
/// retried inside the engine: a retry would mask exactly the
/// order-dependence the search is looking for.
#[derive(Error, Debug)]
pub enum PollutionError {
    // === Precondition Errors ===
    /// The failing test also fails when it runs on its own.
    #[error("test fails when run alone, this is not test pollution: {failing_test}")]
    NotPollution { failing_test: String },

    /// Running the supplied universe does not make the failing test fail.
    #[error("expected failure of {failing_test} with the supplied ordering, but it passed")]
    NotReproducible { failing_test: String },

    /// The failing test is not a member of the supplied universe.
    #[error("failing test was not part of the test universe: {failing_test}")]
    FailingTestNotInUniverse { failing_test: String },

    // === Search Errors ===
    /// The minimal pair found by halving does not reproduce on its own.
    #[error(
        "candidate {candidate} did not reproduce the failure of {failing_test} on the final check"
    )]
    CulpritNotConfirmed {
        failing_test: String,
        candidate: String,
    },

    /// Fuzzing finished every run without observing a failure.
    #[error("no failing ordering found in {runs} fuzz runs")]
    FuzzExhausted { runs: u32 },

    /// The search was cancelled between two oracle evaluations.
    #[error("search cancelled after {evaluations} evaluations")]
    Cancelled { evaluations: usize },

    // === Oracle Errors ===
    /// The oracle could not run the requested ordering.
    #[error("oracle failed: {detail}")]
    OracleFailure { detail: String },

    /// A single oracle evaluation exceeded its time limit.
    #[error("oracle evaluation timed out after {timeout_ms} ms")]
    OracleTimeout { timeout_ms: u64 },

    // === Input Errors ===
    /// A test identifier appears more than once in an ordering.
    #[error("duplicate test id in ordering: {test_id}")]
    DuplicateTestId { test_id: String },

    /// Bisection was asked to narrow an empty candidate set.
    #[error("no candidate tests to bisect")]
    EmptyCandidates,

    /// The failing test appears in the candidate set it is bisected against.
    #[error("failing test is listed among its own candidates: {failing_test}")]
    FailingTestInCandidates { failing_test: String },

    // === Environment Errors ===
    /// File I/O error while persisting or loading a report.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Report (de)serialization failure.
    #[error("report encoding error: {detail}")]
    Encoding { detail: String },

    /// Internal logic error (should never happen).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a [`PollutionError`] for structured reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotPollution,
    NotReproducible,
    CulpritNotConfirmed,
    OracleFailure,
    OracleTimeout,
    FuzzExhausted,
    Cancelled,
    InvalidInput,
    Io,
    Encoding,
    Internal,
}

impl ErrorKind {
    /// Stable snake_case name used in logs and reports.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotPollution => "not_pollution",
            Self::NotReproducible => "not_reproducible",
            Self::CulpritNotConfirmed => "culprit_not_confirmed",
            Self::OracleFailure => "oracle_failure",
            Self::OracleTimeout => "oracle_timeout",
            Self::FuzzExhausted => "fuzz_exhausted",
            Self::Cancelled => "cancelled",
            Self::InvalidInput => "invalid_input",
            Self::Io => "io",
            Self::Encoding => "encoding",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PollutionError {
    /// Classify this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotPollution { .. } => ErrorKind::NotPollution,
            Self::NotReproducible { .. } => ErrorKind::NotReproducible,
            Self::CulpritNotConfirmed { .. } => ErrorKind::CulpritNotConfirmed,
            Self::FuzzExhausted { .. } => ErrorKind::FuzzExhausted,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::OracleFailure { .. } => ErrorKind::OracleFailure,
            Self::OracleTimeout { .. } => ErrorKind::OracleTimeout,
            Self::FailingTestNotInUniverse { .. }
            | Self::DuplicateTestId { .. }
            | Self::EmptyCandidates
            | Self::FailingTestInCandidates { .. } => ErrorKind::InvalidInput,
            Self::Io(_) => ErrorKind::Io,
            Self::Encoding { .. } => ErrorKind::Encoding,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether the caller supplied a failure that does not fit the search
    /// preconditions. These are stop conditions, never retryable.
    pub const fn is_precondition_violation(&self) -> bool {
        matches!(
            self,
            Self::NotPollution { .. }
                | Self::NotReproducible { .. }
                | Self::FailingTestNotInUniverse { .. }
        )
    }

    /// Whether this is a definitive negative answer rather than a fault.
    pub const fn is_negative_result(&self) -> bool {
        matches!(self, Self::FuzzExhausted { .. })
    }

    /// Whether the oracle itself failed to produce a result.
    pub const fn is_oracle_error(&self) -> bool {
        matches!(
            self,
            Self::OracleFailure { .. } | Self::OracleTimeout { .. }
        )
    }

    /// Human-friendly suggestion for the operator.
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::NotPollution { .. } => {
                Some("Fix the test itself; it fails without any other test running first")
            }
            Self::NotReproducible { .. } => {
                Some("Re-capture the ordering from the failing run; the candidate list is stale")
            }
            Self::FailingTestNotInUniverse { .. } => {
                Some("Check the failing test id against the discovered test ids")
            }
            Self::FailingTestInCandidates { .. } => {
                Some("Drop the failing test from the candidate list before bisecting")
            }
            Self::CulpritNotConfirmed { .. } => Some(
                "Several tests may pollute jointly; enable the linear-scan fallback",
            ),
            Self::FuzzExhausted { .. } => {
                Some("Increase the number of fuzz runs or change the seed")
            }
            Self::OracleTimeout { .. } => {
                Some("Raise the oracle timeout or narrow the test universe")
            }
            _ => None,
        }
    }

    /// Get the process exit code for this error (for a CLI front-end).
    pub const fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::FuzzExhausted => 0,
            ErrorKind::InvalidInput => 2,
            ErrorKind::Cancelled => 130,
            _ => 1,
        }
    }

    /// Create an oracle failure.
    pub fn oracle_failure(detail: impl Into<String>) -> Self {
        Self::OracleFailure {
            detail: detail.into(),
        }
    }

    /// Create an encoding error.
    pub fn encoding(detail: impl Into<String>) -> Self {
        Self::Encoding {
            detail: detail.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Result type alias using `PollutionError`.
pub type Result<T> = std::result::Result<T, PollutionError>;
