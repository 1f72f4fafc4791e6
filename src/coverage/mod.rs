//! Coverage collection, filtering and line-level reporting.
//!
//! Raw coverage uses the V8 precise-coverage shape: per script, per function,
//! byte ranges with execution counts.

pub mod collector;
pub mod filter;
pub mod lcov;
pub mod lines;

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

pub use collector::{CollectorFactory, CoverageCollector, ProfileDirCollector};
pub use filter::CoverageFilter;
pub use lines::{FileCoverage, LineIndex, line_report};

tokio::task_local! {
    static PROFILE_DIR: Option<PathBuf>;
}

/// Where processes spawned by the running test should write their coverage
/// dumps. Each worker has its own directory. `None` when coverage is off, when
/// the collector reads no directory, or outside the task running the tests.
pub fn profile_dir() -> Option<PathBuf> {
    PROFILE_DIR.try_with(Clone::clone).ok().flatten()
}

/// Point `NODE_V8_COVERAGE` of a child process at [`profile_dir`].
pub fn instrument(cmd: &mut tokio::process::Command) -> &mut tokio::process::Command {
    if let Some(dir) = profile_dir() {
        cmd.env("NODE_V8_COVERAGE", dir);
    }
    cmd
}

/// Run `fut` with [`profile_dir`] answering `dir`.
pub async fn with_profile_dir<F: Future>(dir: Option<PathBuf>, fut: F) -> F::Output {
    PROFILE_DIR.scope(dir, fut).await
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageRange {
    pub start_offset: usize,
    pub end_offset: usize,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionCoverage {
    #[serde(default)]
    pub function_name: String,
    pub ranges: Vec<CoverageRange>,
    #[serde(default)]
    pub is_block_coverage: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptCoverage {
    #[serde(default)]
    pub script_id: String,
    pub url: String,
    pub functions: Vec<FunctionCoverage>,
}

impl ScriptCoverage {
    /// The local path a script url refers to: `file:` urls (percent-decoded)
    /// and bare paths. Other schemes, `node:` builtins included, have none.
    pub fn path(&self) -> Option<PathBuf> {
        match Url::parse(&self.url) {
            Ok(url) if url.scheme() == "file" => url.to_file_path().ok(),
            // `C:\src\a.js` parses with a one-letter scheme.
            Ok(url) if url.scheme().len() == 1 => Some(PathBuf::from(&self.url)),
            Ok(_) => None,
            Err(_) => Some(PathBuf::from(&self.url)),
        }
    }
}

/// Covered/uncovered lines for every in-scope source file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageReport {
    pub files: BTreeMap<PathBuf, FileCoverage>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageTotals {
    pub covered: usize,
    pub uncovered: usize,
}

impl CoverageTotals {
    pub fn percent(&self) -> f64 {
        let total = self.covered + self.uncovered;
        if total == 0 {
            100.0
        } else {
            self.covered as f64 * 100.0 / total as f64
        }
    }
}

impl CoverageReport {
    /// Build line reports from already-filtered scripts, reading each source
    /// from disk. Unreadable sources are left out with a warning.
    pub fn from_scripts(scripts: &[ScriptCoverage]) -> Self {
        let mut report = Self::default();
        for script in scripts {
            let Some(path) = script.path() else { continue };
            match std::fs::read_to_string(&path) {
                Ok(source) => {
                    report.add(line_report(&path, &source, &script.functions));
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "cannot read covered source");
                }
            }
        }
        report
    }

    pub fn add(&mut self, file: FileCoverage) {
        match self.files.get_mut(&file.path) {
            Some(existing) => existing.merge(&file),
            None => {
                self.files.insert(file.path.clone(), file);
            }
        }
    }

    /// Combine reports from several workers. A line covered anywhere counts
    /// as covered.
    pub fn merge(&mut self, other: &CoverageReport) {
        for file in other.files.values() {
            self.add(file.clone());
        }
    }

    pub fn get(&self, path: &Path) -> Option<&FileCoverage> {
        self.files.get(path)
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn totals(&self) -> CoverageTotals {
        self.files.values().fold(CoverageTotals::default(), |acc, f| CoverageTotals {
            covered: acc.covered + f.covered.len(),
            uncovered: acc.uncovered + f.uncovered.len(),
        })
    }
}

/// A collector factory paired with the filter applied to what it collects.
#[derive(Clone)]
pub struct CoverageSetup {
    pub factory: CollectorFactory,
    pub filter: CoverageFilter,
}

impl CoverageSetup {
    pub fn new(factory: CollectorFactory, filter: CoverageFilter) -> Self {
        Self { factory, filter }
    }

    /// Start a collector for `worker`. `None` when coverage is unavailable;
    /// the run itself goes on.
    pub async fn begin(&self, worker: usize) -> Option<Box<dyn CoverageCollector>> {
        let mut collector = (self.factory)(worker);
        match collector.start().await {
            Ok(()) => Some(collector),
            Err(e) => {
                warn!(collector = collector.name(), error = %e, "coverage unavailable; continuing without it");
                None
            }
        }
    }

    /// The directory a started collector reads dumps from, if any.
    pub fn profile_dir(collector: Option<&dyn CoverageCollector>) -> Option<PathBuf> {
        collector.and_then(|c| c.profile_dir()).map(Path::to_path_buf)
    }

    /// Stop a collector started by [`CoverageSetup::begin`] and build the
    /// filtered line report.
    pub async fn finish(&self, collector: Option<Box<dyn CoverageCollector>>) -> Option<CoverageReport> {
        let mut collector = collector?;
        match collector.stop().await {
            Ok(raw) => Some(CoverageReport::from_scripts(&self.filter.filter(raw))),
            Err(e) => {
                warn!(collector = collector.name(), error = %e, "discarding coverage");
                None
            }
        }
    }
}
