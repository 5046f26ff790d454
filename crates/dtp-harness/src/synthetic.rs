//! Deterministic synthetic oracles.
//!
//! [`SyntheticSuite`] models a test process with shared mutable state: a
//! test fails when a test that pollutes it (or every member of a joint
//! polluter group) ran earlier in the same ordering and no test that
//! repairs it ran in between. Tests can also be marked as failing
//! unconditionally, and runner faults can be injected at a given call.

use std::collections::BTreeSet;

use dtp_core::oracle::Oracle;
use dtp_error::{PollutionError, Result};
use dtp_types::cx::Cx;
use dtp_types::{FailureResult, TestId, TestOrder};

/// A runner fault returned instead of a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFault {
    /// The runner crashed or produced unparseable output.
    Crash,
    /// The run exceeded its time limit.
    Timeout { timeout_ms: u64 },
}

impl InjectedFault {
    fn into_error(self, call: usize) -> PollutionError {
        match self {
            Self::Crash => {
                PollutionError::oracle_failure(format!("synthetic runner crashed on call {call}"))
            }
            Self::Timeout { timeout_ms } => PollutionError::OracleTimeout { timeout_ms },
        }
    }
}

#[derive(Debug, Clone)]
struct JointGroup {
    members: Vec<TestId>,
    victim: TestId,
}

/// Builder-style synthetic oracle that records every ordering it runs.
#[derive(Debug, Clone, Default)]
pub struct SyntheticSuite {
    edges: Vec<(TestId, TestId)>,
    joint: Vec<JointGroup>,
    repairs: Vec<(TestId, TestId)>,
    broken: BTreeSet<TestId>,
    fault: Option<(usize, InjectedFault)>,
    cancel_after: Option<(usize, Cx)>,
    calls: Vec<TestOrder>,
}

impl SyntheticSuite {
    pub fn new() -> Self {
        Self::default()
    }

    /// `victim` fails whenever `polluter` ran before it.
    #[must_use]
    pub fn pollutes(mut self, polluter: impl Into<TestId>, victim: impl Into<TestId>) -> Self {
        self.edges.push((polluter.into(), victim.into()));
        self
    }

    /// `victim` fails only when every member of `group` ran before it.
    #[must_use]
    pub fn pollutes_jointly<I, T>(mut self, group: I, victim: impl Into<TestId>) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TestId>,
    {
        self.joint.push(JointGroup {
            members: group.into_iter().map(Into::into).collect(),
            victim: victim.into(),
        });
        self
    }

    /// `repairer` resets whatever earlier tests left behind for `victim`.
    #[must_use]
    pub fn repairs(mut self, repairer: impl Into<TestId>, victim: impl Into<TestId>) -> Self {
        self.repairs.push((repairer.into(), victim.into()));
        self
    }

    /// `test` fails in every ordering, including on its own.
    #[must_use]
    pub fn always_fails(mut self, test: impl Into<TestId>) -> Self {
        self.broken.insert(test.into());
        self
    }

    /// Return `fault` instead of a result on the 0-based call `call`.
    #[must_use]
    pub fn fault_on_call(mut self, call: usize, fault: InjectedFault) -> Self {
        self.fault = Some((call, fault));
        self
    }

    /// Request cancellation on `cx` once `calls` evaluations have completed.
    #[must_use]
    pub fn cancel_after(mut self, calls: usize, cx: &Cx) -> Self {
        self.cancel_after = Some((calls, cx.clone()));
        self
    }

    /// Every ordering evaluated so far, in call order.
    pub fn calls(&self) -> &[TestOrder] {
        &self.calls
    }

    pub fn call_count(&self) -> usize {
        self.calls.len()
    }

    /// Failures for `order` without recording a call.
    pub fn outcome(&self, order: &TestOrder) -> FailureResult {
        let ids = order.as_slice();
        ids.iter()
            .enumerate()
            .filter(|&(position, test)| {
                self.broken.contains(test) || self.polluted_before(test, &ids[..position])
            })
            .map(|(_, test)| test.clone())
            .collect()
    }

    fn polluted_before(&self, victim: &TestId, earlier: &[TestId]) -> bool {
        let polluters: Vec<&TestId> = self
            .edges
            .iter()
            .filter(|(_, v)| v == victim)
            .map(|(p, _)| p)
            .collect();
        let groups: Vec<&JointGroup> = self.joint.iter().filter(|g| &g.victim == victim).collect();
        if polluters.is_empty() && groups.is_empty() {
            return false;
        }

        let last_repair = earlier.iter().rposition(|test| {
            self.repairs
                .iter()
                .any(|(repairer, v)| repairer == test && v == victim)
        });
        let live = match last_repair {
            Some(index) => &earlier[index + 1..],
            None => earlier,
        };
        polluters.iter().any(|polluter| live.contains(*polluter))
            || groups
                .iter()
                .any(|group| group.members.iter().all(|member| live.contains(member)))
    }
}

impl Oracle for SyntheticSuite {
    fn evaluate(&mut self, order: &TestOrder) -> Result<FailureResult> {
        let call = self.calls.len();
        self.calls.push(order.clone());

        if let Some((at, fault)) = self.fault {
            if at == call {
                return Err(fault.into_error(call));
            }
        }

        let result = self.outcome(order);
        if let Some((after, cx)) = &self.cancel_after {
            if self.calls.len() >= *after {
                cx.cancel();
            }
        }
        Ok(result)
    }
}

/// `n` distinct ids shaped like pytest node ids, in order.
///
/// # Panics
///
/// Panics if two generated ids collide, which would be a bug in the id
/// format rather than a recoverable condition.
pub fn numbered_universe(n: usize) -> TestOrder {
    TestOrder::new((0..n).map(|i| format!("tests/test_suite.py::test_{i:04}")))
        .expect("numbered test ids are distinct")
}
