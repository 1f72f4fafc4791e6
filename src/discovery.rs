use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use glob::Pattern;

use crate::error::{Error, Result};
use crate::session::FileScope;

type ModuleEntry = dyn Fn(&mut FileScope<'_>) + Send + Sync;

/// A test file: the path it is known by plus the function that performs its
/// declarations. Calling the entry is what "importing" the file means.
#[derive(Clone)]
pub struct TestModule {
    pub path: PathBuf,
    entry: Arc<ModuleEntry>,
}

impl TestModule {
    pub fn new<F>(path: impl Into<PathBuf>, entry: F) -> Self
    where
        F: Fn(&mut FileScope<'_>) + Send + Sync + 'static,
    {
        Self {
            path: path.into(),
            entry: Arc::new(entry),
        }
    }

    pub(crate) fn declare(&self, scope: &mut FileScope<'_>) {
        (self.entry)(scope)
    }
}

impl fmt::Debug for TestModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestModule")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Select the modules whose paths match any `include` pattern (all of them
/// when `include` is empty) and no `exclude` pattern. Registration order is
/// kept.
pub fn discover(modules: &[TestModule], include: &[String], exclude: &[String]) -> Result<Vec<TestModule>> {
    let include = compile(include)?;
    let exclude = compile(exclude)?;

    let mut files: Vec<TestModule> = Vec::new();
    for module in modules {
        let included = include.is_empty() || matches_any(&include, &module.path);
        if included
            && !matches_any(&exclude, &module.path)
            && !files.iter().any(|f| f.path == module.path)
        {
            files.push(module.clone());
        }
    }
    Ok(files)
}

fn compile(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| Pattern::new(p).map_err(|e| Error::pattern(p.as_str(), e)))
        .collect()
}

fn matches_any(patterns: &[Pattern], path: &Path) -> bool {
    patterns.iter().any(|p| p.matches_path(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modules(paths: &[&str]) -> Vec<TestModule> {
        paths.iter().map(|p| TestModule::new(*p, |_| {})).collect()
    }

    fn paths(found: &[TestModule]) -> Vec<&str> {
        found.iter().map(|m| m.path.to_str().unwrap()).collect()
    }

    #[test]
    fn empty_include_selects_everything() {
        let all = modules(&["tests/b.test.rs", "tests/a.test.rs"]);
        let found = discover(&all, &[], &[]).unwrap();
        assert_eq!(paths(&found), vec!["tests/b.test.rs", "tests/a.test.rs"]);
    }

    #[test]
    fn include_and_exclude_patterns_apply() {
        let all = modules(&["tests/a.test.rs", "tests/slow/b.test.rs", "src/lib.rs"]);
        let found = discover(
            &all,
            &["tests/**/*.test.rs".to_string()],
            &["tests/slow/**".to_string()],
        )
        .unwrap();
        assert_eq!(paths(&found), vec!["tests/a.test.rs"]);
    }

    #[test]
    fn duplicate_paths_are_collapsed() {
        let all = modules(&["a.test.rs", "a.test.rs"]);
        assert_eq!(discover(&all, &[], &[]).unwrap().len(), 1);
    }

    #[test]
    fn invalid_patterns_are_errors() {
        let all = modules(&["a.test.rs"]);
        let err = discover(&all, &["[".to_string()], &[]).unwrap_err();
        assert!(matches!(err, Error::Pattern { .. }));
    }
}
