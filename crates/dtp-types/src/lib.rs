pub mod cx;
pub mod failure;
pub mod order;
pub mod search_state;

use std::borrow::Borrow;
use std::fmt;

pub use failure::FailureResult;
pub use order::{CandidateSet, TestOrder};
pub use search_state::SearchState;

/// Opaque identifier naming one test.
///
/// The engine only compares identifiers for equality and membership; the
/// text is whatever the test runner uses (for example
/// `tests/my_test.py::test_name`).
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct TestId(String);

impl TestId {
    /// Create a test id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier text.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the id and return its text.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for TestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TestId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for TestId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for TestId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for TestId {
    fn borrow(&self) -> &str {
        &self.0
    }
}
