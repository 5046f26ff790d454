//! Execution orderings and the candidate sets derived from them.
//!
//! A [`TestOrder`] is the exact sequence handed to the oracle. A
//! [`CandidateSet`] is an order-preserving sub-sequence of a universe that is
//! still under investigation. Neither is ever mutated in place: every split
//! produces fresh values, so a step of the search can never disturb the
//! ordering another step relies on.

use std::collections::BTreeSet;

use dtp_error::{PollutionError, Result};
use serde::{Deserialize, Serialize};

use crate::TestId;

/// Ordered sequence of test ids without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<TestId>", into = "Vec<TestId>")]
pub struct TestOrder {
    ids: Vec<TestId>,
}

impl TestOrder {
    /// Build an ordering, rejecting duplicate ids.
    ///
    /// # Errors
    ///
    /// Returns [`PollutionError::DuplicateTestId`] naming the first id that
    /// appears twice.
    pub fn new<I, T>(ids: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<TestId>,
    {
        let ids: Vec<TestId> = ids.into_iter().map(Into::into).collect();
        let mut seen = BTreeSet::new();
        for id in &ids {
            if !seen.insert(id) {
                return Err(PollutionError::DuplicateTestId {
                    test_id: id.to_string(),
                });
            }
        }
        Ok(Self { ids })
    }

    /// An ordering containing only `id`.
    pub fn single(id: TestId) -> Self {
        Self { ids: vec![id] }
    }

    /// The two-test ordering `[first, second]`; `second` is dropped from the
    /// front position if both are the same id.
    pub fn pair(first: TestId, second: TestId) -> Self {
        if first == second {
            return Self::single(second);
        }
        Self {
            ids: vec![first, second],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TestId> {
        self.ids.iter()
    }

    pub fn as_slice(&self) -> &[TestId] {
        &self.ids
    }

    pub fn contains(&self, id: &TestId) -> bool {
        self.ids.contains(id)
    }

    /// Zero-based execution position of `id`.
    pub fn position(&self, id: &TestId) -> Option<usize> {
        self.ids.iter().position(|candidate| candidate == id)
    }

    /// Last id in execution order.
    pub fn last(&self) -> Option<&TestId> {
        self.ids.last()
    }

    /// The universe up to and including `id`, or `None` if `id` is absent.
    pub fn prefix_through(&self, id: &TestId) -> Option<Self> {
        let position = self.position(id)?;
        Some(Self {
            ids: self.ids[..=position].to_vec(),
        })
    }

    /// Every test that executes before `id`, in order.
    pub fn candidates_before(&self, id: &TestId) -> Option<CandidateSet> {
        let position = self.position(id)?;
        Some(CandidateSet {
            ids: self.ids[..position].to_vec(),
        })
    }

    /// Every test other than `id`, in order.
    pub fn candidates_excluding(&self, id: &TestId) -> Option<CandidateSet> {
        self.position(id)?;
        Some(CandidateSet {
            ids: self.ids.iter().filter(|other| *other != id).cloned().collect(),
        })
    }

    pub fn into_ids(self) -> Vec<TestId> {
        self.ids
    }
}

impl TryFrom<Vec<TestId>> for TestOrder {
    type Error = PollutionError;

    fn try_from(ids: Vec<TestId>) -> Result<Self> {
        Self::new(ids)
    }
}

impl From<TestOrder> for Vec<TestId> {
    fn from(order: TestOrder) -> Self {
        order.ids
    }
}

impl<'a> IntoIterator for &'a TestOrder {
    type Item = &'a TestId;
    type IntoIter = std::slice::Iter<'a, TestId>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.iter()
    }
}

/// Order-preserving sub-sequence of a universe still under investigation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<TestId>", into = "Vec<TestId>")]
pub struct CandidateSet {
    ids: Vec<TestId>,
}

impl CandidateSet {
    /// Treat a whole ordering as the candidate set.
    pub fn from_order(order: TestOrder) -> Self {
        Self { ids: order.ids }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TestId> {
        self.ids.iter()
    }

    pub fn as_slice(&self) -> &[TestId] {
        &self.ids
    }

    pub fn contains(&self, id: &TestId) -> bool {
        self.ids.contains(id)
    }

    /// The only member, when exactly one remains.
    pub fn single(&self) -> Option<&TestId> {
        match self.ids.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    /// Split at `len / 2` into `([..pivot], [pivot..])`.
    ///
    /// Both halves keep the relative order of the original set. For an odd
    /// length the second half is the larger one.
    pub fn split_at_midpoint(&self) -> (Self, Self) {
        let pivot = self.ids.len() / 2;
        let (first, second) = self.ids.split_at(pivot);
        (
            Self {
                ids: first.to_vec(),
            },
            Self {
                ids: second.to_vec(),
            },
        )
    }

    /// The ordering submitted to the oracle: every candidate in order, then
    /// `failing` last. A candidate equal to `failing` is dropped so the
    /// failing test runs exactly once, at the end.
    pub fn with_failing_last(&self, failing: &TestId) -> TestOrder {
        let mut ids: Vec<TestId> = self
            .ids
            .iter()
            .filter(|id| *id != failing)
            .cloned()
            .collect();
        ids.push(failing.clone());
        TestOrder { ids }
    }
}

impl TryFrom<Vec<TestId>> for CandidateSet {
    type Error = PollutionError;

    fn try_from(ids: Vec<TestId>) -> Result<Self> {
        TestOrder::new(ids).map(Self::from_order)
    }
}

impl From<CandidateSet> for Vec<TestId> {
    fn from(candidates: CandidateSet) -> Self {
        candidates.ids
    }
}

impl<'a> IntoIterator for &'a CandidateSet {
    type Item = &'a TestId;
    type IntoIter = std::slice::Iter<'a, TestId>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.iter()
    }
}
