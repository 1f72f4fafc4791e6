use std::path::PathBuf;

use crate::models::{RunSummary, TestResult};

/// Progress events streamed from the runner to reporters.
#[derive(Debug, Clone)]
pub enum TestEvent {
    RunStarted {
        files: usize,
    },
    FileStarted {
        path: PathBuf,
    },
    TestStarted {
        file: PathBuf,
        suite: Option<String>,
        name: String,
    },
    TestFinished {
        file: PathBuf,
        suite: Option<String>,
        result: TestResult,
    },
    /// Left out by the `test`/`skip` filters.
    TestSkipped {
        file: PathBuf,
        name: String,
    },
    FileFinished {
        path: PathBuf,
        completed: bool,
        duration_ms: u64,
    },
    /// Not run because it passed last time and has not changed.
    FileCached {
        path: PathBuf,
    },
    RunFinished {
        summary: RunSummary,
    },
    Error {
        path: Option<PathBuf>,
        message: String,
    },
}
