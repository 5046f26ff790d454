//! Test support for the pollution detector: deterministic synthetic oracles
//! that model shared process state, and `tracing-subscriber` setup.

pub mod logging;
pub mod synthetic;

pub use logging::{
    LogGuard, LogOutputFormat, LoggingConfig, init_logging, init_test_logging, log_search_report,
};
pub use synthetic::{InjectedFault, SyntheticSuite, numbered_universe};
