use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use glob::Pattern;

use crate::config::CoverageConfig;
use crate::error::{Error, Result};

use super::ScriptCoverage;

/// Decides which instrumented scripts belong in a coverage report.
#[derive(Debug, Clone)]
pub struct CoverageFilter {
    root: PathBuf,
    dependency_dirs: Vec<String>,
    test_patterns: Vec<Pattern>,
}

impl CoverageFilter {
    pub fn new(
        root: impl Into<PathBuf>,
        dependency_dirs: Vec<String>,
        test_patterns: &[String],
    ) -> Result<Self> {
        let test_patterns = test_patterns
            .iter()
            .map(|p| Pattern::new(p).map_err(|e| Error::pattern(p.as_str(), e)))
            .collect::<Result<_>>()?;
        Ok(Self {
            root: root.into(),
            dependency_dirs,
            test_patterns,
        })
    }

    pub fn from_config(root: impl Into<PathBuf>, config: &CoverageConfig) -> Result<Self> {
        Self::new(root, config.dependency_dirs.clone(), &config.test_patterns)
    }

    /// Absolute, under the root, outside dependency directories, and not a
    /// test file.
    pub fn accepts(&self, path: &Path) -> bool {
        if !path.is_absolute() {
            return false;
        }
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };
        let in_dependency = relative.components().any(|c| match c {
            Component::Normal(name) => self
                .dependency_dirs
                .iter()
                .any(|dir| name.to_str() == Some(dir.as_str())),
            _ => false,
        });
        if in_dependency {
            return false;
        }
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        !self.test_patterns.iter().any(|p| p.matches(file_name))
    }

    /// Keep in-scope scripts, merging duplicates of the same url, sorted by url.
    pub fn filter(&self, raw: Vec<ScriptCoverage>) -> Vec<ScriptCoverage> {
        let mut kept: BTreeMap<String, ScriptCoverage> = BTreeMap::new();
        for script in raw {
            let Some(path) = script.path() else { continue };
            if !self.accepts(&path) {
                continue;
            }
            match kept.get_mut(&script.url) {
                Some(existing) => existing.functions.extend(script.functions),
                None => {
                    kept.insert(script.url.clone(), script);
                }
            }
        }
        kept.into_values().collect()
    }
}
