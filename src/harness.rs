//! The entry point a test binary builds: register modules, then run them.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cache::{CacheEntry, PassedCache};
use crate::cli::Cli;
use crate::config::Config;
use crate::coverage::{self, CollectorFactory, CoverageFilter, CoverageSetup, ProfileDirCollector};
use crate::discovery::{TestModule, discover};
use crate::error::{Error, Result};
use crate::models::{FileError, FileResult, RunReport};
use crate::parallel::{WorkerContext, run_parallel};
use crate::report::{ConsoleReporter, print_summary};
use crate::runner::{EventSender, RunOptions, Runner, TestEvent};
use crate::session::{FileScope, TestSession};

/// Exit code for runs that could not be carried out at all.
const EXIT_ABORTED: u8 = 2;

pub struct Harness {
    root: PathBuf,
    modules: Vec<TestModule>,
    config: Config,
    coverage: Option<CollectorFactory>,
}

impl Harness {
    /// A harness rooted at `root`, with `verdict.toml` from there applied.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let config = Config::load(&root);
        Self {
            root,
            modules: Vec::new(),
            config,
            coverage: None,
        }
    }

    /// Register a test module. `path` is relative to the root.
    pub fn module<F>(mut self, path: impl Into<PathBuf>, entry: F) -> Self
    where
        F: Fn(&mut FileScope<'_>) + Send + Sync + 'static,
    {
        self.modules.push(TestModule::new(path, entry));
        self
    }

    /// Replace the default profile-directory collector.
    pub fn with_coverage_collector(mut self, factory: CollectorFactory) -> Self {
        self.coverage = Some(factory);
        self
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn modules(&self) -> &[TestModule] {
        &self.modules
    }

    /// Options resolved from config alone.
    pub fn options(&self) -> RunOptions {
        RunOptions::from_config(&self.config)
    }

    /// Discover, run and report. Test failures end up in the report; `Err`
    /// is reserved for runs that could not start (bad globs, bad coverage
    /// setup).
    pub async fn run(&self, options: &RunOptions, events: Option<EventSender>) -> Result<RunReport> {
        let start = Instant::now();
        let emit = |event: TestEvent| {
            if let Some(ref tx) = events {
                let _ = tx.send(event);
            }
        };

        let modules = discover(&self.modules, &options.include, &options.exclude)?;
        let order: HashMap<PathBuf, usize> = modules
            .iter()
            .enumerate()
            .map(|(i, m)| (m.path.clone(), i))
            .collect();

        let mut cache = options.skip_passed.then(|| PassedCache::load(&self.root));
        let mut hashes: HashMap<PathBuf, String> = HashMap::new();
        let mut cached: Vec<FileResult> = Vec::new();
        let mut to_run: Vec<TestModule> = Vec::new();
        for module in modules {
            if let Some(ref cache) = cache {
                match PassedCache::hash_file(&self.root.join(&module.path)) {
                    Ok(hash) => {
                        if cache.get(&hash).is_some_and(|e| e.file == module.path) {
                            debug!(file = %module.path.display(), "unchanged since last pass");
                            emit(TestEvent::FileCached {
                                path: module.path.clone(),
                            });
                            let mut result = FileResult::new(module.path.clone());
                            result.cached = true;
                            cached.push(result);
                            continue;
                        }
                        hashes.insert(module.path.clone(), hash);
                    }
                    Err(e) => debug!(error = %e, "cannot hash test file; running it"),
                }
            }
            to_run.push(module);
        }

        emit(TestEvent::RunStarted { files: to_run.len() });
        info!(files = to_run.len(), cached = cached.len(), parallel = options.parallel, "run started");

        let coverage = if options.coverage {
            Some(self.coverage_setup()?)
        } else {
            None
        };

        let mut report = if options.parallel {
            let ctx = WorkerContext::new(options.clone())
                .with_coverage(coverage)
                .with_events(events.clone());
            run_parallel(&to_run, options.max_workers, ctx).await
        } else {
            self.run_in_process(&to_run, options, coverage, events.clone()).await
        };

        report.files.extend(cached);
        report
            .files
            .sort_by_key(|f| order.get(&f.path).copied().unwrap_or(usize::MAX));

        if let Some(ref mut cache) = cache {
            // A filtered run only saw some of each file's tests.
            let saw_every_test = options.test.is_empty() && options.skip.is_empty();
            for file in report.files.iter().filter(|f| !f.cached) {
                let Some(hash) = hashes.get(&file.path) else { continue };
                cache.forget(&file.path);
                if saw_every_test && file.completed && !file.has_failures() {
                    cache.insert(
                        hash.clone(),
                        CacheEntry {
                            file: file.path.clone(),
                            tests: file.test_count(),
                            duration: file.duration_ms,
                        },
                    );
                }
            }
            if let Err(e) = cache.store() {
                warn!(error = %e, "cannot store passed-file cache");
                report.errors.push(FileError {
                    path: PassedCache::location(&self.root),
                    message: e.to_string(),
                });
            }
        }

        if let (Some(coverage), Some(lcov)) = (&report.coverage, &self.config.coverage.lcov) {
            let target = self.root.join(lcov);
            match coverage::lcov::write(coverage, &target) {
                Ok(()) => info!(path = %target.display(), "lcov written"),
                Err(e) => warn!(error = %e, "cannot write lcov report"),
            }
        }

        report.summary.duration = start.elapsed().as_millis() as u64;
        emit(TestEvent::RunFinished {
            summary: report.summary,
        });
        Ok(report)
    }

    /// Import every file first, then run the queue.
    async fn run_in_process(
        &self,
        modules: &[TestModule],
        options: &RunOptions,
        coverage: Option<CoverageSetup>,
        events: Option<EventSender>,
    ) -> RunReport {
        let collector = match coverage {
            Some(ref setup) => setup.begin(0).await,
            None => None,
        };

        let mut session = TestSession::new();
        let mut errors = Vec::new();
        for module in modules {
            if let Err(e) = session.import(module) {
                warn!(error = %e, "skipping test file");
                if let Some(ref tx) = events {
                    let _ = tx.send(TestEvent::Error {
                        path: Some(module.path.clone()),
                        message: e.to_string(),
                    });
                }
                errors.push(FileError {
                    path: module.path.clone(),
                    message: e.to_string(),
                });
            }
        }

        let runner = Runner::new(options.clone()).with_events(events);
        let dir = CoverageSetup::profile_dir(collector.as_deref());
        let mut report = coverage::with_profile_dir(dir, runner.run(session.into_queue())).await;
        report.errors.extend(errors);
        if let Some(ref setup) = coverage {
            report.coverage = setup.finish(collector).await;
        }
        report
    }

    fn coverage_setup(&self) -> Result<CoverageSetup> {
        let settings = &self.config.coverage;
        let root = std::path::absolute(&self.root).map_err(|e| Error::io(&self.root, e))?;
        let filter = CoverageFilter::from_config(root, settings)?;
        let factory = match self.coverage {
            Some(ref factory) => factory.clone(),
            None => ProfileDirCollector::factory(self.root.join(&settings.profile_dir)),
        };
        Ok(CoverageSetup::new(factory, filter))
    }

    /// Parse flags, run, print, and map the outcome to a process exit code.
    pub fn run_cli(self) -> ExitCode {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_env("VERDICT_LOG")
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with_writer(io::stderr)
            .try_init();

        let cli = Cli::parse();
        match self.run_main(cli) {
            Ok(report) => ExitCode::from(report.exit_code()),
            Err(e) => {
                eprintln!("[ERROR] {e:#}");
                ExitCode::from(EXIT_ABORTED)
            }
        }
    }

    fn run_main(mut self, cli: Cli) -> anyhow::Result<RunReport> {
        if let Some(ref root) = cli.root {
            self.config = Config::load(root);
            self.root = root.clone();
        }
        let mut options = self.options();
        cli.apply(&mut options);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to start async runtime")?;

        let report = runtime.block_on(async {
            let (tx, rx) = mpsc::unbounded_channel();
            let printer = tokio::spawn(ConsoleReporter::new(options.verbose).stream(rx));
            let result = self.run(&options, Some(tx)).await;
            // The sender was moved into `run`, so the stream ends here.
            let _ = printer.await;
            result
        })?;

        print_summary(&report, &mut io::stdout().lock()).context("failed to print summary")?;
        if let Some(ref path) = cli.json {
            let json = serde_json::to_string_pretty(&report)?;
            std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
        }
        Ok(report)
    }
}
