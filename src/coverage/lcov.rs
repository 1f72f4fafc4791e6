use std::fmt::Write;
use std::path::Path;

use crate::error::{Error, Result};

use super::CoverageReport;

/// Render a report as an LCOV tracefile.
pub fn render(report: &CoverageReport) -> String {
    let mut out = String::new();
    for file in report.files.values() {
        let _ = writeln!(out, "TN:");
        let _ = writeln!(out, "SF:{}", file.path.display());
        let mut lines: Vec<(u32, u8)> = file
            .covered
            .iter()
            .map(|&l| (l, 1))
            .chain(file.uncovered.iter().map(|&l| (l, 0)))
            .collect();
        lines.sort_unstable();
        for (line, hits) in &lines {
            let _ = writeln!(out, "DA:{line},{hits}");
        }
        let _ = writeln!(out, "LF:{}", lines.len());
        let _ = writeln!(out, "LH:{}", file.covered.len());
        let _ = writeln!(out, "end_of_record");
    }
    out
}

pub fn write(report: &CoverageReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    std::fs::write(path, render(report)).map_err(|e| Error::io(path, e))
}
