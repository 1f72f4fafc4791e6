use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::error::{Error, Result};
use crate::runner::HookFailureMode;

pub const CONFIG_FILE: &str = "verdict.toml";

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub coverage: CoverageConfig,
}

/// Which registered test modules take part in a run.
#[derive(Debug, Default, Deserialize)]
pub struct DiscoveryConfig {
    /// Glob patterns (relative to the project root) of test files to run.
    /// Empty means every registered module.
    /// Example: ["tests/**/*.test.rs"]
    #[serde(default)]
    pub include: Vec<String>,
    /// Glob patterns of test files to leave out.
    /// Example: ["tests/legacy/**"]
    #[serde(default)]
    pub exclude: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RunConfig {
    /// Only run tests whose names match one of these patterns.
    #[serde(default)]
    pub test: Vec<String>,
    /// Never run tests whose names match one of these patterns.
    #[serde(default)]
    pub skip: Vec<String>,
    #[serde(default)]
    pub skip_passed: bool,
    #[serde(default)]
    pub parallel: bool,
    pub max_workers: Option<usize>,
    #[serde(default)]
    pub verbose: bool,
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub hook_failure: HookFailureMode,
}

#[derive(Debug, Deserialize)]
pub struct CoverageConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Directory profile dumps are collected from, relative to the root.
    #[serde(default = "default_profile_dir")]
    pub profile_dir: PathBuf,
    /// Path components that mark third-party code.
    #[serde(default = "default_dependency_dirs")]
    pub dependency_dirs: Vec<String>,
    /// File-name globs that mark test files.
    #[serde(default = "default_test_patterns")]
    pub test_patterns: Vec<String>,
    /// Write an LCOV tracefile here when set.
    pub lcov: Option<PathBuf>,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            profile_dir: default_profile_dir(),
            dependency_dirs: default_dependency_dirs(),
            test_patterns: default_test_patterns(),
            lcov: None,
        }
    }
}

fn default_profile_dir() -> PathBuf {
    PathBuf::from(".verdict/coverage")
}

fn default_dependency_dirs() -> Vec<String> {
    vec!["node_modules".to_string(), "target".to_string(), "vendor".to_string()]
}

fn default_test_patterns() -> Vec<String> {
    vec!["*.test.*".to_string(), "*.spec.*".to_string()]
}

impl Config {
    /// Load `verdict.toml` from the project root, falling back to defaults if absent or invalid.
    pub fn load(root: &Path) -> Self {
        let path = root.join(CONFIG_FILE);
        let Ok(content) = std::fs::read_to_string(&path) else {
            return Self::default();
        };
        Self::from_toml(&content).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "ignoring invalid config");
            Self::default()
        })
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path());
        assert!(config.discovery.include.is_empty());
        assert!(!config.coverage.enabled);
        assert_eq!(config.coverage.dependency_dirs.len(), 3);
    }

    #[test]
    fn parses_all_sections() {
        let config = Config::from_toml(
            r#"
            [discovery]
            include = ["tests/**/*.test.rs"]

            [run]
            test = ["parser"]
            parallel = true
            max_workers = 2
            timeout_ms = 500
            hook_failure = "abort-suite"

            [coverage]
            enabled = true
            lcov = "coverage/lcov.info"
            "#,
        )
        .unwrap();

        assert_eq!(config.discovery.include, vec!["tests/**/*.test.rs"]);
        assert_eq!(config.run.max_workers, Some(2));
        assert_eq!(config.run.hook_failure, HookFailureMode::AbortSuite);
        assert!(config.coverage.enabled);
        assert_eq!(config.coverage.test_patterns, default_test_patterns());
    }

    #[test]
    fn invalid_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "run = 3").unwrap();
        let config = Config::load(dir.path());
        assert!(!config.run.parallel);
        assert!(Config::from_toml("run = 3").is_err());
    }
}
