use serde::{Deserialize, Serialize};

/// Outcome recorded for a finished test.
///
/// A test is pending until [`TestEvent::TestStarted`] and running until
/// [`TestEvent::TestFinished`]; those states live only in the event stream.
/// Tests left out by the name filters get no result at all.
///
/// [`TestEvent::TestStarted`]: crate::runner::TestEvent::TestStarted
/// [`TestEvent::TestFinished`]: crate::runner::TestEvent::TestFinished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
}

impl TestStatus {
    /// Fixed-width tag for console output.
    pub fn label(self) -> &'static str {
        match self {
            TestStatus::Passed => "PASS",
            TestStatus::Failed => "FAIL",
        }
    }
}
