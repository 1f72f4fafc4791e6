//! Parallel execution: one worker task per test file, at most `max_workers`
//! at a time.
//!
//! Every worker builds its own [`TestSession`] and [`Runner`], so hooks and
//! queues are never shared between files. A worker that crashes becomes an
//! error entry for its file; the remaining files still run.

use std::path::PathBuf;

use futures_util::future::join_all;
use tracing::{debug, error};

use crate::coverage::{self, CoverageReport, CoverageSetup};
use crate::discovery::TestModule;
use crate::models::{FailureDetail, FileError, FileResult, RunReport, RunSummary};
use crate::runner::{EventSender, RunOptions, Runner, TestEvent};
use crate::session::TestSession;

/// What every worker gets handed.
#[derive(Clone)]
pub struct WorkerContext {
    pub options: RunOptions,
    pub coverage: Option<CoverageSetup>,
    pub events: Option<EventSender>,
}

impl WorkerContext {
    pub fn new(options: RunOptions) -> Self {
        Self {
            options,
            coverage: None,
            events: None,
        }
    }

    pub fn with_coverage(mut self, coverage: Option<CoverageSetup>) -> Self {
        self.coverage = coverage;
        self
    }

    pub fn with_events(mut self, events: Option<EventSender>) -> Self {
        self.events = events;
        self
    }

    fn emit(&self, event: TestEvent) {
        if let Some(ref tx) = self.events {
            let _ = tx.send(event);
        }
    }
}

/// The message a worker sends back to the coordinator.
#[derive(Debug, Clone)]
pub struct WorkerReport {
    pub file: PathBuf,
    pub summary: RunSummary,
    pub result: Option<FileResult>,
    pub coverage: Option<CoverageReport>,
    /// Set when the file could not be imported.
    pub error: Option<String>,
}

impl WorkerReport {
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Import and run a single test file in isolation.
pub async fn run_worker(worker: usize, module: TestModule, ctx: WorkerContext) -> WorkerReport {
    debug!(worker, file = %module.path.display(), "worker started");
    let collector = match ctx.coverage {
        Some(ref setup) => setup.begin(worker).await,
        None => None,
    };

    let mut session = TestSession::new();
    let outcome = match session.import(&module) {
        Ok(()) => {
            let runner = Runner::new(ctx.options.clone()).with_events(ctx.events.clone());
            let dir = CoverageSetup::profile_dir(collector.as_deref());
            let report = coverage::with_profile_dir(dir, runner.run(session.into_queue())).await;
            Ok((report.summary, report.files.into_iter().next()))
        }
        Err(e) => {
            ctx.emit(TestEvent::Error {
                path: Some(module.path.clone()),
                message: e.to_string(),
            });
            Err(e.to_string())
        }
    };

    let coverage = match ctx.coverage {
        Some(ref setup) => setup.finish(collector).await,
        None => None,
    };

    match outcome {
        Ok((summary, result)) => WorkerReport {
            file: module.path,
            summary,
            result,
            coverage,
            error: None,
        },
        Err(message) => WorkerReport {
            file: module.path,
            summary: RunSummary::default(),
            result: None,
            coverage,
            error: Some(message),
        },
    }
}

/// Run `modules` across worker tasks and fold their reports into one.
///
/// Files are handed out in discovery order in batches of `max_workers`; a
/// batch is awaited in full before the next one starts.
pub async fn run_parallel(modules: &[TestModule], max_workers: usize, ctx: WorkerContext) -> RunReport {
    let mut report = RunReport::default();
    let mut coverage: Option<CoverageReport> = None;

    for (batch, chunk) in modules.chunks(max_workers.max(1)).enumerate() {
        debug!(batch, files = chunk.len(), "starting worker batch");
        let handles: Vec<_> = chunk
            .iter()
            .enumerate()
            .map(|(slot, module)| {
                let worker = batch * max_workers.max(1) + slot;
                let ctx = ctx.clone();
                let module = module.clone();
                tokio::spawn(run_worker(worker, module, ctx))
            })
            .collect();

        for (module, joined) in chunk.iter().zip(join_all(handles).await) {
            match joined {
                Ok(worker) => absorb(&mut report, &mut coverage, worker),
                Err(e) => {
                    let message = if e.is_panic() {
                        format!("worker crashed: {}", FailureDetail::from_panic(e.into_panic()).message)
                    } else {
                        format!("worker cancelled: {e}")
                    };
                    error!(file = %module.path.display(), "{message}");
                    ctx.emit(TestEvent::Error {
                        path: Some(module.path.clone()),
                        message: message.clone(),
                    });
                    report.errors.push(FileError {
                        path: module.path.clone(),
                        message,
                    });
                }
            }
        }
    }

    report.coverage = coverage;
    report
}

fn absorb(report: &mut RunReport, coverage: &mut Option<CoverageReport>, worker: WorkerReport) {
    report.summary.merge(&worker.summary);
    if let Some(ref message) = worker.error {
        report.errors.push(FileError {
            path: worker.file.clone(),
            message: message.clone(),
        });
    }
    if let Some(result) = worker.result {
        report.files.push(result);
    }
    if let Some(ref part) = worker.coverage {
        coverage.get_or_insert_with(CoverageReport::default).merge(part);
    }
}
