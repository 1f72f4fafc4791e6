use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::runner::{HookFailureMode, RunOptions};

/// Command-line flags accepted by a test harness binary. Anything given here
/// overrides `verdict.toml`.
#[derive(Debug, Parser)]
#[command(name = "verdict")]
#[command(about = "Run the registered test modules", long_about = None)]
pub struct Cli {
    /// Project root (config, cache and coverage are resolved against it)
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Only run tests whose names match this pattern (repeatable)
    #[arg(short = 't', long = "test", value_name = "PATTERN")]
    pub test: Vec<String>,

    /// Skip tests whose names match this pattern (repeatable)
    #[arg(long, value_name = "PATTERN")]
    pub skip: Vec<String>,

    /// Glob of test file paths to run (repeatable)
    #[arg(long, value_name = "GLOB")]
    pub include: Vec<String>,

    /// Glob of test file paths to leave out (repeatable)
    #[arg(long, value_name = "GLOB")]
    pub exclude: Vec<String>,

    /// Leave out files that passed last time and have not changed
    #[arg(long)]
    pub skip_passed: bool,

    /// Run each test file in its own worker
    #[arg(long)]
    pub parallel: bool,

    #[arg(long, value_name = "N")]
    pub max_workers: Option<usize>,

    /// Collect line coverage
    #[arg(long)]
    pub coverage: bool,

    #[arg(short, long)]
    pub verbose: bool,

    /// Per-test and per-hook time limit
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    #[arg(long, value_enum)]
    pub hook_failure: Option<HookFailureMode>,

    /// Also write the full report as JSON to this path
    #[arg(long, value_name = "PATH")]
    pub json: Option<PathBuf>,
}

impl Cli {
    /// Layer the flags over options resolved from config.
    pub fn apply(&self, options: &mut RunOptions) {
        if !self.test.is_empty() {
            options.test = self.test.clone();
        }
        options.skip.extend(self.skip.iter().cloned());
        if !self.include.is_empty() {
            options.include = self.include.clone();
        }
        options.exclude.extend(self.exclude.iter().cloned());
        options.skip_passed |= self.skip_passed;
        options.parallel |= self.parallel;
        if let Some(n) = self.max_workers {
            options.max_workers = n.max(1);
        }
        options.coverage |= self.coverage;
        options.verbose |= self.verbose;
        if let Some(ms) = self.timeout_ms {
            options.timeout = Some(Duration::from_millis(ms));
        }
        if let Some(mode) = self.hook_failure {
            options.hook_failure = mode;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let cli = Cli::parse_from([
            "verdict",
            "-t",
            "parser",
            "--skip",
            "slow",
            "--parallel",
            "--max-workers",
            "0",
            "--timeout-ms",
            "250",
            "--hook-failure",
            "abort-suite",
        ]);
        let mut options = RunOptions {
            test: vec!["lexer".to_string()],
            skip: vec!["flaky".to_string()],
            ..RunOptions::default()
        };
        cli.apply(&mut options);

        assert_eq!(options.test, vec!["parser"]);
        assert_eq!(options.skip, vec!["flaky", "slow"]);
        assert!(options.parallel);
        assert_eq!(options.max_workers, 1);
        assert_eq!(options.timeout, Some(Duration::from_millis(250)));
        assert_eq!(options.hook_failure, HookFailureMode::AbortSuite);
    }

    #[test]
    fn no_flags_leave_options_alone() {
        let cli = Cli::parse_from(["verdict"]);
        let mut options = RunOptions {
            parallel: true,
            ..RunOptions::default()
        };
        cli.apply(&mut options);
        assert!(options.parallel);
        assert!(options.test.is_empty());
        assert!(cli.json.is_none());
    }
}
