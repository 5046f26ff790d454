//! Search configuration.
//!
//! Defaults use a fixed fuzz seed so shuffles are repeatable, and stop
//! hard when the final double-check fails.
//!
//! # Environment Variables
//!
//! [`SearchConfig::from_env`] consults:
//! - `DTP_MAX_FUZZ_RUNS`: number of shuffled runs before giving up (u32)
//! - `DTP_FUZZ_SEED`: seed for the fuzz shuffles (u64)
//! - `DTP_CONFIRM_FALLBACK`: `stop` or `linear_scan`
//! - `DTP_CANDIDATE_SCOPE`: `preceding` or `whole_universe`

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Fixed fuzz seed, so shuffled runs repeat across invocations.
pub const DEFAULT_FUZZ_SEED: u64 = 1_542_676_187;

/// Default number of fuzz runs.
pub const DEFAULT_MAX_FUZZ_RUNS: u32 = 100;

/// What to do when the halved-down candidate does not reproduce alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmFallback {
    /// Report `CulpritNotConfirmed`.
    #[default]
    Stop,
    /// Try every candidate paired with the failing test, in order, and
    /// report the first pair that reproduces. Linear in the candidate count.
    LinearScan,
}

/// Which tests are candidates once the failing test is located in the
/// universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateScope {
    /// Only tests that execute before the failing test. The reproduction
    /// check runs the universe up to and including the failing test.
    #[default]
    Preceding,
    /// Every other test in the universe, with the failing test moved to the
    /// end. Useful when the id list comes from a file in arbitrary order.
    WholeUniverse,
}

impl fmt::Display for ConfirmFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stop => f.write_str("stop"),
            Self::LinearScan => f.write_str("linear_scan"),
        }
    }
}

impl FromStr for ConfirmFallback {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stop" => Ok(Self::Stop),
            "linear_scan" | "linear-scan" | "linear" => Ok(Self::LinearScan),
            other => Err(format!("unknown confirm fallback: {other}")),
        }
    }
}

impl fmt::Display for CandidateScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Preceding => f.write_str("preceding"),
            Self::WholeUniverse => f.write_str("whole_universe"),
        }
    }
}

impl FromStr for CandidateScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "preceding" => Ok(Self::Preceding),
            "whole_universe" | "whole-universe" | "universe" => Ok(Self::WholeUniverse),
            other => Err(format!("unknown candidate scope: {other}")),
        }
    }
}

/// Configuration for a pollution search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Shuffled runs attempted by the fuzz engine.
    pub max_fuzz_runs: u32,
    /// Seed for the fuzz engine's random source.
    pub fuzz_seed: u64,
    /// Behaviour when the final double-check fails.
    pub confirm_fallback: ConfirmFallback,
    /// Which tests are bisected.
    pub candidate_scope: CandidateScope,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_fuzz_runs: DEFAULT_MAX_FUZZ_RUNS,
            fuzz_seed: DEFAULT_FUZZ_SEED,
            confirm_fallback: ConfirmFallback::Stop,
            candidate_scope: CandidateScope::Preceding,
        }
    }
}

impl SearchConfig {
    /// Defaults overridden by `DTP_*` environment variables.
    ///
    /// Unparseable values are ignored with a warning rather than aborting
    /// the search.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup (the environment in
    /// production, a map in tests).
    #[must_use]
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("DTP_MAX_FUZZ_RUNS") {
            match value.trim().parse::<u32>() {
                Ok(runs) => self.max_fuzz_runs = runs,
                Err(error) => {
                    tracing::warn!(key = "DTP_MAX_FUZZ_RUNS", %value, %error, "ignoring override");
                }
            }
        }
        if let Some(value) = lookup("DTP_FUZZ_SEED") {
            match value.trim().parse::<u64>() {
                Ok(seed) => self.fuzz_seed = seed,
                Err(error) => {
                    tracing::warn!(key = "DTP_FUZZ_SEED", %value, %error, "ignoring override");
                }
            }
        }
        if let Some(value) = lookup("DTP_CONFIRM_FALLBACK") {
            match value.parse::<ConfirmFallback>() {
                Ok(fallback) => self.confirm_fallback = fallback,
                Err(error) => {
                    tracing::warn!(
                        key = "DTP_CONFIRM_FALLBACK",
                        %value,
                        %error,
                        "ignoring override"
                    );
                }
            }
        }
        if let Some(value) = lookup("DTP_CANDIDATE_SCOPE") {
            match value.parse::<CandidateScope>() {
                Ok(scope) => self.candidate_scope = scope,
                Err(error) => {
                    tracing::warn!(
                        key = "DTP_CANDIDATE_SCOPE",
                        %value,
                        %error,
                        "ignoring override"
                    );
                }
            }
        }
        self
    }

    #[must_use]
    pub fn with_fuzz_seed(mut self, seed: u64) -> Self {
        self.fuzz_seed = seed;
        self
    }

    #[must_use]
    pub fn with_max_fuzz_runs(mut self, runs: u32) -> Self {
        self.max_fuzz_runs = runs;
        self
    }

    #[must_use]
    pub fn with_confirm_fallback(mut self, fallback: ConfirmFallback) -> Self {
        self.confirm_fallback = fallback;
        self
    }

    #[must_use]
    pub fn with_candidate_scope(mut self, scope: CandidateScope) -> Self {
        self.candidate_scope = scope;
        self
    }
}
