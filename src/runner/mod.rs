//! Walks a [`TestQueue`] and turns it into a [`RunReport`].
//!
//! Files run in queue order, suites and tests in declaration order. A test
//! body's error or panic is recorded on that test only; hook failures are
//! handled by the configured [`HookFailureMode`].

pub mod events;
pub mod filter;
pub mod options;

use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::time::Instant;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::models::{FailureDetail, FileResult, RunReport, RunSummary, SuiteResult, TestResult};
use crate::session::{Callback, FileEntry, HookKind, Suite, SuiteItem, TestCase, TestQueue};

pub use events::TestEvent;
pub use filter::{NameFilter, Selection};
pub use options::{HookFailureMode, RunOptions};

pub type EventSender = mpsc::UnboundedSender<TestEvent>;

pub struct Runner {
    options: RunOptions,
    filter: NameFilter,
    events: Option<EventSender>,
}

impl Runner {
    pub fn new(options: RunOptions) -> Self {
        let filter = NameFilter::new(&options.test, &options.skip);
        Self {
            options,
            filter,
            events: None,
        }
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

    /// Run every file in the queue. Run-level events are left to the caller.
    pub async fn run(&self, queue: TestQueue) -> RunReport {
        let start = Instant::now();
        let mut report = RunReport::default();
        for entry in queue.into_entries() {
            let file = self.run_file(&entry, &mut report.summary).await;
            report.files.push(file);
        }
        report.summary.duration = elapsed_ms(start);
        report
    }

    pub async fn run_file(&self, entry: &FileEntry, summary: &mut RunSummary) -> FileResult {
        let start = Instant::now();
        self.emit(TestEvent::FileStarted {
            path: entry.path.clone(),
        });

        let mut result = FileResult::new(entry.path.clone());
        for suite in &entry.suites {
            self.run_suite(&entry.path, suite, None, summary, &mut result.describes)
                .await;
        }
        for case in &entry.tests {
            if let Some(test) = self.run_selected(&entry.path, None, case, None, summary).await {
                result.tests.push(test);
            }
        }

        result.duration_ms = elapsed_ms(start);
        result.completed = !result.has_failures();
        self.emit(TestEvent::FileFinished {
            path: entry.path.clone(),
            completed: result.completed,
            duration_ms: result.duration_ms,
        });
        result
    }

    /// Run a suite and, in declaration order, everything nested in it.
    ///
    /// Each suite gets its own [`SuiteResult`], appended to `results` in
    /// pre-order. When an enclosing suite's setup was aborted, `inherited`
    /// carries the reason and this suite's own all-hooks are not run.
    fn run_suite<'a>(
        &'a self,
        path: &'a Path,
        suite: &'a Suite,
        inherited: Option<&'a str>,
        summary: &'a mut RunSummary,
        results: &'a mut Vec<SuiteResult>,
    ) -> BoxFuture<'a, ()> {
        async move {
            let slot = results.len();
            results.push(SuiteResult {
                name: suite.name.clone(),
                tests: Vec::new(),
            });

            let aborted = match inherited {
                Some(reason) => Some(reason.to_string()),
                None => match self
                    .run_hooks(&suite.before_all, HookKind::BeforeAll, &suite.name)
                    .await
                {
                    Err(reason) if self.options.hook_failure.aborts() => {
                        Some(format!("beforeAll hook failed: {reason}"))
                    }
                    _ => None,
                },
            };

            for item in &suite.items {
                match item {
                    SuiteItem::Test(case) => {
                        if let Some(test) = self
                            .run_selected(path, Some(&suite.name), case, aborted.as_deref(), summary)
                            .await
                        {
                            results[slot].tests.push(test);
                        }
                    }
                    SuiteItem::Suite(child) => {
                        self.run_suite(path, child, aborted.as_deref(), &mut *summary, &mut *results)
                            .await;
                    }
                }
            }

            // afterAll failures are only ever logged.
            if inherited.is_none() {
                let _ = self
                    .run_hooks(&suite.after_all, HookKind::AfterAll, &suite.name)
                    .await;
            }
        }
        .boxed()
    }

    /// Apply the name filters, then run (or fail, when the suite setup was
    /// aborted) a single test and record it.
    async fn run_selected(
        &self,
        path: &Path,
        suite: Option<&str>,
        case: &TestCase,
        aborted: Option<&str>,
        summary: &mut RunSummary,
    ) -> Option<TestResult> {
        if self.filter.select(&case.name) != Selection::Run {
            summary.skipped += 1;
            self.emit(TestEvent::TestSkipped {
                file: path.to_path_buf(),
                name: case.name.clone(),
            });
            return None;
        }

        self.emit(TestEvent::TestStarted {
            file: path.to_path_buf(),
            suite: suite.map(str::to_string),
            name: case.name.clone(),
        });
        let result = match aborted {
            Some(reason) => TestResult::failed(case.name.clone(), FailureDetail::new(reason), 0),
            None => self.run_case(case).await,
        };
        debug!(
            file = %path.display(),
            test = %case.name,
            status = ?result.status,
            duration_ms = result.duration_ms,
            "test finished"
        );

        summary.record(&result);
        self.emit(TestEvent::TestFinished {
            file: path.to_path_buf(),
            suite: suite.map(str::to_string),
            result: result.clone(),
        });
        Some(result)
    }

    async fn run_case(&self, case: &TestCase) -> TestResult {
        let start = Instant::now();

        let setup = self
            .run_hooks(&case.before_each, HookKind::BeforeEach, &case.name)
            .await;
        let outcome = match setup {
            Err(reason) if self.options.hook_failure.aborts() => Err(FailureDetail::new(format!(
                "beforeEach hook failed: {reason}"
            ))),
            _ => self.invoke(&case.body).await,
        };
        // afterEach runs even when the body failed; its own failures are logged.
        let _ = self
            .run_hooks(&case.after_each, HookKind::AfterEach, &case.name)
            .await;

        let duration_ms = elapsed_ms(start);
        match outcome {
            Ok(()) => TestResult::passed(case.name.clone(), duration_ms),
            Err(failure) => TestResult::failed(case.name.clone(), failure, duration_ms),
        }
    }

    /// Run hooks in order. Every hook runs; the first failure message is
    /// returned for the caller's policy decision.
    async fn run_hooks(&self, hooks: &[Callback], kind: HookKind, owner: &str) -> Result<(), String> {
        let mut first_failure = None;
        for hook in hooks {
            if let Err(failure) = self.invoke(hook).await {
                warn!(hook = %kind, owner, error = %failure.message, "hook failed");
                first_failure.get_or_insert(failure.message);
            }
        }
        match first_failure {
            Some(message) => Err(message),
            None => Ok(()),
        }
    }

    /// Await a callback, converting errors, panics and timeouts into a
    /// failure.
    async fn invoke(&self, callback: &Callback) -> Result<(), FailureDetail> {
        let run = AssertUnwindSafe(callback.call()).catch_unwind();
        let outcome = match self.options.timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(outcome) => outcome,
                Err(_) => return Err(FailureDetail::timeout(limit)),
            },
            None => run.await,
        };
        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(error)) => Err(FailureDetail::from_error(&error)),
            Err(payload) => Err(FailureDetail::from_panic(payload)),
        }
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::*;
    use crate::discovery::TestModule;
    use crate::expect::expect;
    use crate::models::TestStatus;
    use crate::session::TestSession;

    type Log = Arc<Mutex<Vec<String>>>;

    fn push(log: &Log, entry: &str) {
        log.lock().unwrap().push(entry.to_string());
    }

    fn queue_of(modules: &[TestModule]) -> TestQueue {
        let mut session = TestSession::new();
        for module in modules {
            session.import(module).unwrap();
        }
        session.into_queue()
    }

    #[tokio::test]
    async fn failing_test_does_not_stop_its_siblings() {
        let queue = queue_of(&[TestModule::new("a.test.rs", |t| {
            t.describe("math", |t| {
                t.it("A", || async {
                    expect(1).to_be(2)?;
                    Ok(())
                });
                t.it("B", || async {
                    expect(1).to_be(1)?;
                    Ok(())
                });
            });
        })]);

        let report = Runner::new(RunOptions::default()).run(queue).await;
        let tests = &report.files[0].describes[0].tests;
        assert_eq!(tests[0].status, TestStatus::Failed);
        assert_eq!(tests[0].expected.as_deref(), Some("2"));
        assert_eq!(tests[0].received.as_deref(), Some("1"));
        assert_eq!(tests[1].status, TestStatus::Passed);
        assert_eq!(tests[1].message, "OK");
        assert_eq!(
            (report.summary.total, report.summary.passed, report.summary.failed),
            (2, 1, 1)
        );
        assert!(!report.files[0].completed);
    }

    #[tokio::test]
    async fn hooks_wrap_tests_in_scope_order() {
        let log: Log = Arc::default();
        let l = log.clone();
        let queue = queue_of(&[TestModule::new("a.test.rs", move |t| {
            let hook = |log: &Log, name: &'static str| {
                let log = log.clone();
                move || {
                    let log = log.clone();
                    async move {
                        push(&log, name);
                        Ok::<(), anyhow::Error>(())
                    }
                }
            };
            t.before_all(hook(&l, "file beforeAll"));
            t.before_each(hook(&l, "H1"));
            t.after_each(hook(&l, "file afterEach"));
            t.after_all(hook(&l, "file afterAll"));
            t.describe("suite", |t| {
                t.before_all(hook(&l, "suite beforeAll"));
                t.before_each(hook(&l, "H2"));
                t.after_each(hook(&l, "suite afterEach"));
                t.after_all(hook(&l, "suite afterAll"));
                t.it("body", hook(&l, "body"));
            });
        })]);

        Runner::new(RunOptions::default()).run(queue).await;
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "file beforeAll",
                "suite beforeAll",
                "H1",
                "H2",
                "body",
                "suite afterEach",
                "file afterEach",
                "suite afterAll",
                "file afterAll",
            ]
        );
    }

    #[tokio::test]
    async fn nested_suites_run_in_declaration_order_inside_their_parent() {
        let log: Log = Arc::default();
        let l = log.clone();
        let queue = queue_of(&[TestModule::new("a.test.rs", move |t| {
            let step = |log: &Log, name: &'static str| {
                let log = log.clone();
                move || {
                    let log = log.clone();
                    async move {
                        push(&log, name);
                        Ok::<(), anyhow::Error>(())
                    }
                }
            };
            t.describe("outer", |t| {
                t.before_all(step(&l, "outer beforeAll"));
                t.after_all(step(&l, "outer afterAll"));
                t.describe("inner", |t| {
                    t.before_all(step(&l, "inner beforeAll"));
                    t.after_all(step(&l, "inner afterAll"));
                    t.it("deep", step(&l, "deep"));
                });
                t.it("shallow", step(&l, "shallow"));
            });
        })]);

        let report = Runner::new(RunOptions::default()).run(queue).await;
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "outer beforeAll",
                "inner beforeAll",
                "deep",
                "inner afterAll",
                "shallow",
                "outer afterAll",
            ]
        );
        let describes = &report.files[0].describes;
        assert_eq!(describes[0].name, "outer");
        assert_eq!(describes[0].tests[0].name, "shallow");
        assert_eq!(describes[1].name, "outer > inner");
        assert_eq!(describes[1].tests[0].name, "deep");
        assert_eq!(report.summary.passed, 2);
    }

    #[tokio::test]
    async fn aborted_outer_setup_fails_nested_tests() {
        let queue = queue_of(&[TestModule::new("a.test.rs", |t| {
            t.describe("outer", |t| {
                t.before_all(|| async { anyhow::bail!("no db") });
                t.describe("inner", |t| {
                    t.it("deep", || async { Ok(()) });
                });
            });
        })]);

        let options = RunOptions {
            hook_failure: HookFailureMode::AbortSuite,
            ..RunOptions::default()
        };
        let report = Runner::new(options).run(queue).await;
        let deep = &report.files[0].describes[1].tests[0];
        assert_eq!(deep.message, "beforeAll hook failed: no db");
        assert_eq!(report.summary.failed, 1);
    }

    #[tokio::test]
    async fn hook_failures_are_logged_and_swallowed_by_default() {
        let queue = queue_of(&[TestModule::new("a.test.rs", |t| {
            t.describe("suite", |t| {
                t.before_all(|| async { anyhow::bail!("setup broke") });
                t.before_each(|| async { anyhow::bail!("each broke") });
                t.after_each(|| async { panic!("teardown broke") });
                t.it("still runs", || async { Ok(()) });
            });
        })]);

        let report = Runner::new(RunOptions::default()).run(queue).await;
        assert_eq!(report.summary.passed, 1);
        assert_eq!(report.summary.failed, 0);
    }

    #[tokio::test]
    async fn abort_suite_mode_fails_tests_behind_a_broken_setup() {
        let ran: Log = Arc::default();
        let r = ran.clone();
        let queue = queue_of(&[TestModule::new("a.test.rs", move |t| {
            let r = r.clone();
            t.describe("broken", move |t| {
                t.before_all(|| async { anyhow::bail!("db down") });
                t.it("never runs", move || {
                    let r = r.clone();
                    async move {
                        push(&r, "ran");
                        Ok(())
                    }
                });
            });
            t.describe("each", |t| {
                t.before_each(|| async { anyhow::bail!("fixture") });
                t.it("skipped body", || async { Ok(()) });
            });
        })]);

        let options = RunOptions {
            hook_failure: HookFailureMode::AbortSuite,
            ..RunOptions::default()
        };
        let report = Runner::new(options).run(queue).await;
        let file = &report.files[0];
        assert_eq!(file.describes[0].tests[0].message, "beforeAll hook failed: db down");
        assert_eq!(file.describes[1].tests[0].message, "beforeEach hook failed: fixture");
        assert_eq!(report.summary.failed, 2);
        assert!(ran.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn filters_exclude_tests_from_counts() {
        let queue = queue_of(&[TestModule::new("a.test.rs", |t| {
            t.describe("suite", |t| {
                t.it("foo passes", || async { Ok(()) });
                t.it("bar fails", || async { anyhow::bail!("nope") });
            });
            t.test("foo top", || async { Ok(()) });
            t.test("foo skipped", || async { anyhow::bail!("nope") });
        })]);

        let options = RunOptions {
            test: vec!["foo".to_string()],
            skip: vec!["skipped".to_string()],
            ..RunOptions::default()
        };
        let report = Runner::new(options).run(queue).await;
        let summary = report.summary;
        assert_eq!((summary.total, summary.passed, summary.failed), (2, 2, 0));
        assert_eq!(summary.skipped, 2);
        assert_eq!(report.files[0].test_count(), 2);
    }

    #[tokio::test]
    async fn panics_and_plain_errors_become_failures() {
        let queue = queue_of(&[TestModule::new("b.test.rs", |t| {
            t.test("boom", || async { anyhow::bail!("boom") });
            t.test("panics", || async { panic!("kaboom") });
        })]);

        let report = Runner::new(RunOptions::default()).run(queue).await;
        let tests = &report.files[0].tests;
        assert_eq!(tests[0].message, "boom");
        assert_eq!(tests[0].expected, None);
        assert_eq!(tests[0].received, None);
        assert_eq!(tests[1].message, "kaboom");
        assert_eq!(report.summary.failed, 2);
    }

    #[tokio::test]
    async fn hanging_tests_time_out() {
        let queue = queue_of(&[TestModule::new("slow.test.rs", |t| {
            t.test("hangs", || async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            });
            t.test("fast", || async { Ok(()) });
        })]);

        let options = RunOptions {
            timeout: Some(Duration::from_millis(20)),
            ..RunOptions::default()
        };
        let report = Runner::new(options).run(queue).await;
        assert_eq!(report.files[0].tests[0].message, "Test timed out after 20ms");
        assert_eq!(report.files[0].tests[1].status, TestStatus::Passed);
    }

    #[tokio::test]
    async fn events_follow_execution_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let queue = queue_of(&[TestModule::new("a.test.rs", |t| {
            t.test("only", || async { Ok(()) });
            t.test("left out", || async { Ok(()) });
        })]);
        let options = RunOptions {
            skip: vec!["left out".to_string()],
            ..RunOptions::default()
        };
        Runner::new(options).with_events(Some(tx)).run(queue).await;

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(match event {
                TestEvent::FileStarted { .. } => "file-started",
                TestEvent::TestStarted { .. } => "test-started",
                TestEvent::TestFinished { .. } => "test-finished",
                TestEvent::TestSkipped { .. } => "test-skipped",
                TestEvent::FileFinished { .. } => "file-finished",
                _ => "other",
            });
        }
        assert_eq!(
            kinds,
            vec!["file-started", "test-started", "test-finished", "test-skipped", "file-finished"]
        );
    }
}
