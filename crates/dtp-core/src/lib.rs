//! Search engine for test pollution.
//!
//! Given an ordering in which a test fails, find the single earlier test
//! whose side effects cause the failure, using as few oracle evaluations as
//! possible:
//!
//! - [`driver::find_culprit`] runs the pre-checks, the halving search and
//!   the final double-check.
//! - [`driver::fuzz_universe`] shuffles the suite looking for any failing
//!   ordering; [`driver::fuzz_and_bisect`] chains the two.
//! - [`report::run_search`] folds any of the above into a serializable
//!   [`report::SearchReport`].
//!
//! Test execution is abstracted behind [`oracle::Oracle`].

pub mod bisect;
pub mod config;
pub mod digest;
pub mod driver;
pub mod fuzz;
pub mod oracle;
pub mod report;

pub use bisect::{BisectState, BisectStepRecord, Half, NarrowOutcome, narrow};
pub use config::{CandidateScope, ConfirmFallback, SearchConfig};
pub use driver::{
    Confirmation, CulpritFinding, FuzzOutcome, find_culprit, fuzz_and_bisect, fuzz_universe,
    locate_culprit,
};
pub use fuzz::FuzzFinding;
pub use oracle::{EvaluationLedger, EvaluationPurpose, EvaluationRecord, Oracle};
pub use report::{
    SEARCH_REPORT_SCHEMA_VERSION, SearchOutcome, SearchReport, SearchRequest, load_search_report,
    run_search, write_search_report,
};
