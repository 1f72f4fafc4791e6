use std::time::Duration;

use serde::Deserialize;

use crate::config::Config;

/// What to do when a lifecycle hook fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum HookFailureMode {
    /// Log the failure and carry on as if the hook had succeeded.
    #[default]
    LogAndContinue,
    /// A failing `beforeAll` fails every test of its suite without running
    /// them; a failing `beforeEach` fails its test without running the body.
    /// After-hook failures are only logged.
    AbortSuite,
}

impl HookFailureMode {
    pub fn aborts(&self) -> bool {
        matches!(self, HookFailureMode::AbortSuite)
    }
}

/// The already-resolved options bag a run consumes.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Glob patterns selecting test modules by path. Empty selects all.
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    /// Name patterns; when non-empty only matching tests run.
    pub test: Vec<String>,
    /// Name patterns of tests to leave out.
    pub skip: Vec<String>,
    /// Leave out files that are unchanged since they last passed.
    pub skip_passed: bool,
    pub parallel: bool,
    pub max_workers: usize,
    pub coverage: bool,
    pub verbose: bool,
    /// Per test body and per hook. `None` waits forever.
    pub timeout: Option<Duration>,
    pub hook_failure: HookFailureMode,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            include: Vec::new(),
            exclude: Vec::new(),
            test: Vec::new(),
            skip: Vec::new(),
            skip_passed: false,
            parallel: false,
            max_workers: default_workers(),
            coverage: false,
            verbose: false,
            timeout: None,
            hook_failure: HookFailureMode::default(),
        }
    }
}

impl RunOptions {
    pub fn from_config(config: &Config) -> Self {
        let run = &config.run;
        Self {
            include: config.discovery.include.clone(),
            exclude: config.discovery.exclude.clone(),
            test: run.test.clone(),
            skip: run.skip.clone(),
            skip_passed: run.skip_passed,
            parallel: run.parallel,
            max_workers: run.max_workers.unwrap_or_else(default_workers).max(1),
            coverage: config.coverage.enabled,
            verbose: run.verbose,
            timeout: run.timeout_ms.map(Duration::from_millis),
            hook_failure: run.hook_failure,
        }
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
