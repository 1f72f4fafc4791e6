use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::FunctionCoverage;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCoverage {
    pub path: PathBuf,
    /// 1-based line numbers executed at least once.
    pub covered: BTreeSet<u32>,
    /// 1-based line numbers touched by a zero-count range.
    pub uncovered: BTreeSet<u32>,
}

impl FileCoverage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Union both sides; a line covered by either report is covered.
    pub fn merge(&mut self, other: &FileCoverage) {
        self.covered.extend(other.covered.iter().copied());
        self.uncovered.extend(other.uncovered.iter().copied());
        self.uncovered.retain(|line| !self.covered.contains(line));
    }
}

/// Byte offset -> line number lookup for one source text.
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(
            source
                .bytes()
                .enumerate()
                .filter(|&(_, b)| b == b'\n')
                .map(|(i, _)| i + 1)
                .filter(|&start| start < source.len()),
        );
        Self {
            starts,
            len: source.len(),
        }
    }

    pub fn line_count(&self) -> usize {
        if self.len == 0 { 0 } else { self.starts.len() }
    }

    /// 1-based line containing `offset`; offsets past the end clamp to the last line.
    pub fn line_of(&self, offset: usize) -> u32 {
        self.starts.partition_point(|&start| start <= offset) as u32
    }

    /// Lines touched by the half-open byte range `[start, end)`.
    pub fn lines_in(&self, start: usize, end: usize) -> std::ops::RangeInclusive<u32> {
        let end = end.min(self.len);
        let start = start.min(end);
        let last = if end > start { end - 1 } else { start };
        self.line_of(start)..=self.line_of(last)
    }
}

/// Convert a script's ranges into covered and uncovered lines.
pub fn line_report(path: &Path, source: &str, functions: &[FunctionCoverage]) -> FileCoverage {
    let index = LineIndex::new(source);
    let mut report = FileCoverage::new(path);
    if index.line_count() == 0 {
        return report;
    }

    for range in functions.iter().flat_map(|f| f.ranges.iter()) {
        let lines = index.lines_in(range.start_offset, range.end_offset);
        if range.count == 0 {
            report.uncovered.extend(lines);
        } else {
            report.covered.extend(lines);
        }
    }
    report.covered.retain(|line| !report.uncovered.contains(line));
    report
}
