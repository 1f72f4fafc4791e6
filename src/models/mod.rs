pub mod result;
pub mod status;

pub use result::{FailureDetail, FileError, FileResult, RunReport, RunSummary, SuiteResult, TestResult};
pub use status::TestStatus;
