use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{TestId, TestOrder};

/// The set of tests that failed in one oracle evaluation.
///
/// May be empty, may contain only the failing test under investigation, or
/// may include unrelated failures. The search only ever asks whether the
/// designated failing test is a member.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FailureResult {
    failed: BTreeSet<TestId>,
}

impl FailureResult {
    /// No test failed.
    pub fn passed() -> Self {
        Self::default()
    }

    pub fn from_failed<I, T>(failed: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TestId>,
    {
        Self {
            failed: failed.into_iter().map(Into::into).collect(),
        }
    }

    pub fn insert(&mut self, id: TestId) -> bool {
        self.failed.insert(id)
    }

    pub fn contains(&self, id: &TestId) -> bool {
        self.failed.contains(id)
    }

    pub fn is_empty(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failed.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TestId> {
        self.failed.iter()
    }

    /// The first failed id in `order`'s execution order.
    ///
    /// Ids reported by the oracle that are not part of `order` are ignored.
    pub fn first_failed_in<'a>(&self, order: &'a TestOrder) -> Option<&'a TestId> {
        order.iter().find(|id| self.failed.contains(*id))
    }
}

impl FromIterator<TestId> for FailureResult {
    fn from_iter<I: IntoIterator<Item = TestId>>(iter: I) -> Self {
        Self {
            failed: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_failed_follows_execution_order() {
        let order = TestOrder::new(["c", "a", "b"]).unwrap();
        let result = FailureResult::from_failed(["a", "b"]);
        assert_eq!(result.first_failed_in(&order).map(TestId::as_str), Some("a"));
    }

    #[test]
    fn first_failed_ignores_foreign_ids() {
        let order = TestOrder::new(["a", "b"]).unwrap();
        let result = FailureResult::from_failed(["zzz"]);
        assert!(result.first_failed_in(&order).is_none());
        assert!(!result.is_empty());
    }

    #[test]
    fn passed_is_empty() {
        let result = FailureResult::passed();
        assert!(result.is_empty());
        assert!(!result.contains(&TestId::from("a")));
    }
}
