use std::fmt;

use serde::{Deserialize, Serialize};

/// Progress snapshot of a bisection.
///
/// Display-only: nothing in the engine branches on these numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchState {
    /// 1-based halving step about to run.
    pub step: usize,
    /// Candidates still under investigation.
    pub remaining: usize,
    /// `⌈log2(remaining)⌉`.
    pub estimated_steps: u32,
}

impl SearchState {
    #[must_use]
    pub fn new(step: usize, remaining: usize) -> Self {
        Self {
            step,
            remaining,
            estimated_steps: estimate_steps(remaining),
        }
    }
}

impl fmt::Display for SearchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "step {}: {} tests remaining (about {} steps)",
            self.step, self.remaining, self.estimated_steps
        )
    }
}

/// `⌈log2(n)⌉`, with `0` for `n <= 1`.
#[must_use]
pub fn estimate_steps(n: usize) -> u32 {
    if n <= 1 {
        0
    } else {
        usize::BITS - (n - 1).leading_zeros()
    }
}
