use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};

use super::ScriptCoverage;

/// Source of raw coverage for one execution context (the whole run, or one
/// worker).
#[async_trait]
pub trait CoverageCollector: Send {
    /// Begin collecting. An error means coverage is unavailable here; the
    /// run continues without it.
    async fn start(&mut self) -> Result<()>;

    /// Stop collecting and hand back everything recorded since `start`.
    async fn stop(&mut self) -> Result<Vec<ScriptCoverage>>;

    /// Display name for this collector (e.g., "profile-dir").
    fn name(&self) -> &str;

    /// Directory that instrumented processes should write dumps into.
    fn profile_dir(&self) -> Option<&Path> {
        None
    }
}

/// Builds one collector per execution context. The argument is the worker
/// index (0 in single-process mode).
pub type CollectorFactory = Arc<dyn Fn(usize) -> Box<dyn CoverageCollector> + Send + Sync>;

/// One precise-coverage dump as written by V8 (`NODE_V8_COVERAGE`).
#[derive(Debug, Deserialize)]
struct ProfileDump {
    result: Vec<ScriptCoverage>,
}

/// Collects V8-style coverage dumps that instrumented processes write into a
/// directory while tests run.
pub struct ProfileDirCollector {
    dir: PathBuf,
}

impl ProfileDirCollector {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Factory giving every worker its own subdirectory of `base`.
    pub fn factory(base: impl Into<PathBuf>) -> CollectorFactory {
        let base = base.into();
        Arc::new(move |worker| {
            Box::new(ProfileDirCollector::new(base.join(format!("worker-{worker}"))))
                as Box<dyn CoverageCollector>
        })
    }

    fn dumps(&self) -> Result<Vec<PathBuf>> {
        let pattern = self.dir.join("*.json").to_string_lossy().to_string();
        let mut files: Vec<PathBuf> = glob::glob(&pattern)
            .map_err(|e| Error::pattern(pattern.as_str(), e))?
            .flatten()
            .collect();
        files.sort();
        Ok(files)
    }
}

#[async_trait]
impl CoverageCollector for ProfileDirCollector {
    async fn start(&mut self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| Error::Coverage(format!("cannot prepare {}: {e}", self.dir.display())))?;
        for stale in self.dumps()? {
            tokio::fs::remove_file(&stale)
                .await
                .map_err(|e| Error::io(&stale, e))?;
        }
        debug!(dir = %self.dir.display(), "coverage collection started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<Vec<ScriptCoverage>> {
        let mut scripts = Vec::new();
        for dump in self.dumps()? {
            let content = tokio::fs::read_to_string(&dump)
                .await
                .map_err(|e| Error::io(&dump, e))?;
            let parsed: ProfileDump = serde_json::from_str(&content)?;
            scripts.extend(parsed.result);
        }
        debug!(dir = %self.dir.display(), scripts = scripts.len(), "coverage collection stopped");
        Ok(scripts)
    }

    fn name(&self) -> &str {
        "profile-dir"
    }

    fn profile_dir(&self) -> Option<&Path> {
        Some(&self.dir)
    }
}
