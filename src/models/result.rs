use std::any::Any;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::status::TestStatus;
use crate::coverage::CoverageReport;
use crate::expect::MatcherFailure;

/// Why a test (or hook) did not pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureDetail {
    pub message: String,
    pub matcher: Option<String>,
    pub expected: Option<String>,
    pub received: Option<String>,
}

impl FailureDetail {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            matcher: None,
            expected: None,
            received: None,
        }
    }

    /// Matcher failures keep their expected/received values; any other error
    /// contributes only its message.
    pub fn from_error(error: &anyhow::Error) -> Self {
        match error.downcast_ref::<MatcherFailure>() {
            Some(failure) => Self {
                message: failure.message.clone(),
                matcher: Some(failure.matcher_name.clone()),
                expected: failure.expected.clone(),
                received: failure.received.clone(),
            },
            None => Self::new(error.to_string()),
        }
    }

    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "test panicked".to_string()
        };
        Self::new(message)
    }

    pub fn timeout(limit: Duration) -> Self {
        Self::new(format!("Test timed out after {}ms", limit.as_millis()))
    }
}

/// Outcome of one executed test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub status: TestStatus,
    /// `"OK"` for passing tests, the failure message otherwise.
    pub message: String,
    pub expected: Option<String>,
    pub received: Option<String>,
    pub duration_ms: u64,
}

impl TestResult {
    pub fn passed(name: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            name: name.into(),
            status: TestStatus::Passed,
            message: "OK".to_string(),
            expected: None,
            received: None,
            duration_ms,
        }
    }

    pub fn failed(name: impl Into<String>, failure: FailureDetail, duration_ms: u64) -> Self {
        Self {
            name: name.into(),
            status: TestStatus::Failed,
            message: failure.message,
            expected: failure.expected,
            received: failure.received,
            duration_ms,
        }
    }

    pub fn is_passed(&self) -> bool {
        self.status == TestStatus::Passed
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteResult {
    pub name: String,
    pub tests: Vec<TestResult>,
}

/// Results for one test file, grouped the way the file declared them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileResult {
    pub path: PathBuf,
    pub describes: Vec<SuiteResult>,
    pub tests: Vec<TestResult>,
    pub duration_ms: u64,
    pub completed: bool,
    /// Not executed this run: an unchanged file that passed last time.
    #[serde(default)]
    pub cached: bool,
}

impl FileResult {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            completed: true,
            ..Self::default()
        }
    }

    /// Every recorded test, suites first, in declaration order.
    pub fn all_tests(&self) -> impl Iterator<Item = &TestResult> {
        self.describes
            .iter()
            .flat_map(|suite| suite.tests.iter())
            .chain(self.tests.iter())
    }

    pub fn test_count(&self) -> usize {
        self.all_tests().count()
    }

    pub fn has_failures(&self) -> bool {
        self.all_tests().any(|t| t.status == TestStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    /// Tests excluded by `test`/`skip` filters; not part of `total`.
    pub skipped: usize,
    pub duration: u64,
}

impl RunSummary {
    pub fn record(&mut self, result: &TestResult) {
        self.total += 1;
        if result.is_passed() {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
    }

    pub fn merge(&mut self, other: &RunSummary) {
        self.total += other.total;
        self.passed += other.passed;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }
}

/// A file that could not produce results: import panic, worker crash, cache I/O.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileError {
    pub path: PathBuf,
    pub message: String,
}

/// Everything a reporter needs after a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub summary: RunSummary,
    pub files: Vec<FileResult>,
    pub errors: Vec<FileError>,
    pub coverage: Option<CoverageReport>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.summary.failed == 0 && self.errors.is_empty()
    }

    pub fn exit_code(&self) -> u8 {
        if self.is_success() { 0 } else { 1 }
    }

    pub fn failed_tests(&self) -> impl Iterator<Item = (&FileResult, &TestResult)> {
        self.files.iter().flat_map(|file| {
            file.all_tests()
                .filter(|t| t.status == TestStatus::Failed)
                .map(move |t| (file, t))
        })
    }

    pub fn file(&self, path: impl AsRef<std::path::Path>) -> Option<&FileResult> {
        let path = path.as_ref();
        self.files.iter().find(|f| f.path == path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_errors_keep_only_their_message() {
        let error = anyhow::anyhow!("boom");
        let detail = FailureDetail::from_error(&error);
        assert_eq!(detail.message, "boom");
        assert_eq!(detail.expected, None);
        assert_eq!(detail.received, None);
    }

    #[test]
    fn matcher_failures_carry_expected_and_received() {
        let error: anyhow::Error = crate::expect::expect(1).to_be(2).unwrap_err().into();
        let detail = FailureDetail::from_error(&error);
        assert_eq!(detail.matcher.as_deref(), Some("to_be"));
        assert_eq!(detail.expected.as_deref(), Some("2"));
        assert_eq!(detail.received.as_deref(), Some("1"));
    }

    #[test]
    fn panic_payloads_become_messages() {
        let detail = FailureDetail::from_panic(Box::new("bad state"));
        assert_eq!(detail.message, "bad state");
        let detail = FailureDetail::from_panic(Box::new(String::from("owned")));
        assert_eq!(detail.message, "owned");
        let detail = FailureDetail::from_panic(Box::new(42_u8));
        assert_eq!(detail.message, "test panicked");
    }

    #[test]
    fn summary_totals_add_up() {
        let mut summary = RunSummary::default();
        summary.record(&TestResult::passed("a", 1));
        summary.record(&TestResult::failed("b", FailureDetail::new("x"), 1));
        assert_eq!(summary.total, summary.passed + summary.failed);
        assert_eq!((summary.total, summary.passed, summary.failed), (2, 1, 1));
    }
}
