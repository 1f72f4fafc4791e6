//! Plain-text console reporting: live progress from [`TestEvent`]s and the
//! end-of-run summary.

use std::collections::BTreeSet;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tokio::sync::mpsc;

use crate::coverage::CoverageReport;
use crate::models::{RunReport, TestStatus};
use crate::runner::TestEvent;
use crate::session::SUITE_SEPARATOR;

pub struct ConsoleReporter {
    verbose: bool,
    /// File whose header was printed last. Test lines from any other file
    /// (parallel workers interleave) carry their path.
    current: Option<PathBuf>,
}

impl ConsoleReporter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose, current: None }
    }

    /// Write the progress line(s) for one event.
    pub fn handle(&mut self, event: &TestEvent, out: &mut impl Write) -> io::Result<()> {
        match event {
            TestEvent::RunStarted { files } => {
                writeln!(out, "Running {files} test file(s)")?;
            }
            TestEvent::FileStarted { path } => {
                writeln!(out, "\n{}", path.display())?;
                self.current = Some(path.clone());
            }
            TestEvent::TestStarted { file, suite, name } if self.verbose => {
                let name = qualified(suite.as_deref(), name);
                writeln!(out, "  RUN  {}{name}", self.origin(file))?;
            }
            TestEvent::TestFinished { file, suite, result } => {
                let name = qualified(suite.as_deref(), &result.name);
                let origin = self.origin(file);
                let label = result.status.label();
                if result.is_passed() {
                    writeln!(out, "  {label} {origin}{name} ({}ms)", result.duration_ms)?;
                } else {
                    writeln!(out, "  {label} {origin}{name}")?;
                    writeln!(out, "       {}", result.message)?;
                }
            }
            TestEvent::TestSkipped { file, name } if self.verbose => {
                writeln!(out, "  SKIP {}{name}", self.origin(file))?;
            }
            TestEvent::FileFinished { path, duration_ms, .. } if self.verbose => {
                writeln!(out, "  {}done in {duration_ms}ms", self.origin(path))?;
            }
            TestEvent::FileCached { path } => {
                writeln!(out, "SKIP {} (unchanged, passed last run)", path.display())?;
            }
            TestEvent::Error { path, message } => match path {
                Some(path) => writeln!(out, "[ERROR] {}: {message}", path.display())?,
                None => writeln!(out, "[ERROR] {message}")?,
            },
            _ => {}
        }
        Ok(())
    }

    /// `"{file}: "` unless `file` is the one under the last header.
    fn origin(&self, file: &Path) -> String {
        match self.current {
            Some(ref current) if current == file => String::new(),
            _ => format!("{}: ", file.display()),
        }
    }

    /// Drain an event stream to stdout until every sender is dropped.
    pub async fn stream(mut self, mut rx: mpsc::UnboundedReceiver<TestEvent>) {
        let stdout = io::stdout();
        while let Some(event) = rx.recv().await {
            let mut out = stdout.lock();
            let _ = self.handle(&event, &mut out);
        }
    }
}

fn qualified(suite: Option<&str>, name: &str) -> String {
    match suite {
        Some(suite) => format!("{suite}{SUITE_SEPARATOR}{name}"),
        None => name.to_string(),
    }
}

/// Failures, errors, coverage and totals.
pub fn print_summary(report: &RunReport, out: &mut impl Write) -> io::Result<()> {
    let failures: Vec<_> = report.failed_tests().collect();
    if !failures.is_empty() {
        writeln!(out, "\nFailures:")?;
        for (file, test) in failures {
            writeln!(out, "  {} {} :: {}", TestStatus::Failed.label(), file.path.display(), test.name)?;
            writeln!(out, "      {}", test.message)?;
            if let Some(ref expected) = test.expected {
                writeln!(out, "      expected: {expected}")?;
            }
            if let Some(ref received) = test.received {
                writeln!(out, "      received: {received}")?;
            }
        }
    }

    if !report.errors.is_empty() {
        writeln!(out, "\nErrors:")?;
        for error in &report.errors {
            writeln!(out, "  [ERROR] {}: {}", error.path.display(), error.message)?;
        }
    }

    if let Some(ref coverage) = report.coverage {
        print_coverage(coverage, out)?;
    }

    let summary = &report.summary;
    let cached = report.files.iter().filter(|f| f.cached).count();
    write!(
        out,
        "\n{} passed, {} failed, {} skipped, {} total",
        summary.passed, summary.failed, summary.skipped, summary.total
    )?;
    if cached > 0 {
        write!(out, ", {cached} file(s) cached")?;
    }
    writeln!(out, "  {:.1}s", summary.duration as f64 / 1000.0)?;
    Ok(())
}

fn print_coverage(coverage: &CoverageReport, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "\nCoverage:")?;
    if coverage.is_empty() {
        writeln!(out, "  no source files were instrumented")?;
        return Ok(());
    }
    for file in coverage.files.values() {
        let total = file.covered.len() + file.uncovered.len();
        let percent = if total == 0 {
            100.0
        } else {
            file.covered.len() as f64 * 100.0 / total as f64
        };
        write!(out, "  {:>6.1}%  {}", percent, file.path.display())?;
        if !file.uncovered.is_empty() {
            write!(out, "  uncovered: {}", line_ranges(&file.uncovered))?;
        }
        writeln!(out)?;
    }
    let totals = coverage.totals();
    writeln!(
        out,
        "  {:>6.1}%  total ({}/{} lines)",
        totals.percent(),
        totals.covered,
        totals.covered + totals.uncovered
    )
}

/// `{1, 2, 3, 7}` becomes `"1-3, 7"`.
fn line_ranges(lines: &BTreeSet<u32>) -> String {
    let mut ranges: Vec<(u32, u32)> = Vec::new();
    for &line in lines {
        match ranges.last_mut() {
            Some((_, end)) if *end + 1 == line => *end = line,
            _ => ranges.push((line, line)),
        }
    }
    ranges
        .iter()
        .map(|&(start, end)| {
            if start == end {
                start.to_string()
            } else {
                format!("{start}-{end}")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
