//! An in-process test execution engine.
//!
//! Test files are registered as [`TestModule`]s on a [`Harness`]. Importing a
//! module runs its declarations (`describe`, `it`, hooks) against a
//! [`FileScope`]; the runner then executes the queued tests, optionally one
//! worker per file, with name filters, a passed-file cache and line coverage.

pub mod cache;
pub mod cli;
pub mod config;
pub mod coverage;
pub mod discovery;
pub mod error;
pub mod expect;
pub mod harness;
pub mod models;
pub mod parallel;
pub mod report;
pub mod runner;
pub mod session;

pub use config::Config;
pub use discovery::{TestModule, discover};
pub use error::{Error, Result};
pub use harness::Harness;
pub use models::{RunReport, RunSummary, TestStatus};
pub use runner::{HookFailureMode, RunOptions, Runner, TestEvent};
pub use session::{FileScope, TestSession};

/// Everything a test file needs.
pub mod prelude {
    pub use crate::expect::{MatchResult, MatcherFailure, Mock, expect};
    pub use crate::harness::Harness;
    pub use crate::runner::RunOptions;
    pub use crate::session::{FileScope, TestOutcome};
}
