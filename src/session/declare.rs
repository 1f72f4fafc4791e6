use std::future::Future;

use tracing::warn;

use super::hooks::{Callback, HookKind, HookRegistry, TestOutcome};
use super::queue::{FileEntry, Suite, TestCase};

/// Separator between enclosing and nested suite names.
pub const SUITE_SEPARATOR: &str = " > ";

/// Declaration context handed to a test module while it is imported.
///
/// `describe`, `it`, `test` and the hook functions only record; test bodies
/// run later, when the runner walks the queue.
pub struct FileScope<'s> {
    hooks: &'s mut HookRegistry,
    entry: &'s mut FileEntry,
    /// Suites whose bodies are executing, outermost first.
    open: Vec<Suite>,
}

impl<'s> FileScope<'s> {
    pub(crate) fn new(hooks: &'s mut HookRegistry, entry: &'s mut FileEntry) -> Self {
        Self {
            hooks,
            entry,
            open: Vec::new(),
        }
    }

    /// Declare a suite. The body runs immediately; tests and suites it
    /// declares are queued inside it, in order.
    ///
    /// File-scope `beforeAll` hooks run before a top-level suite's own, and
    /// its `afterAll` hooks run before the file-scope ones. A nested suite
    /// runs entirely inside its parent's `beforeAll`/`afterAll`.
    pub fn describe<F>(&mut self, name: impl Into<String>, body: F)
    where
        F: FnOnce(&mut FileScope<'s>),
    {
        let name = match self.open.last() {
            Some(parent) => format!("{}{}{}", parent.name, SUITE_SEPARATOR, name.into()),
            None => name.into(),
        };

        let mut suite = Suite::new(name);
        if self.open.is_empty() {
            suite
                .before_all
                .extend_from_slice(self.hooks.file().get(HookKind::BeforeAll));
        }
        self.open.push(suite);
        self.hooks.enter_suite();
        body(self);
        let mut own = self.hooks.clear_suite_level_hooks();
        let Some(mut suite) = self.open.pop() else {
            return;
        };

        suite.before_all.extend(own.take(HookKind::BeforeAll));
        suite.after_all.extend(own.take(HookKind::AfterAll));
        match self.open.last_mut() {
            Some(parent) => parent.push_suite(suite),
            None => {
                suite
                    .after_all
                    .extend_from_slice(self.hooks.file().get(HookKind::AfterAll));
                self.entry.suites.push(suite);
            }
        }
    }

    /// Declare a test in the enclosing suite, snapshotting the hooks
    /// registered so far.
    pub fn it<F, Fut>(&mut self, name: impl Into<String>, body: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TestOutcome> + Send + 'static,
    {
        let case = TestCase {
            name: name.into(),
            body: Callback::new(body),
            before_each: self.hooks.before_each_chain(),
            after_each: self.hooks.after_each_chain(),
        };
        match self.open.last_mut() {
            Some(suite) => suite.push_test(case),
            None => {
                warn!(
                    file = %self.entry.path.display(),
                    test = %case.name,
                    "`it` outside of `describe`; queued as a top-level test"
                );
                self.entry.tests.push(case);
            }
        }
    }

    /// Declare a top-level test of the file. Only file-scope hooks apply,
    /// even when called from inside a suite body.
    pub fn test<F, Fut>(&mut self, name: impl Into<String>, body: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TestOutcome> + Send + 'static,
    {
        let file = self.hooks.file();
        let case = TestCase {
            name: name.into(),
            body: Callback::new(body),
            before_each: file.get(HookKind::BeforeEach).to_vec(),
            after_each: file.get(HookKind::AfterEach).to_vec(),
        };
        self.entry.tests.push(case);
    }

    pub fn before_all<F, Fut>(&mut self, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TestOutcome> + Send + 'static,
    {
        self.hooks.register(HookKind::BeforeAll, Callback::new(hook));
    }

    pub fn after_all<F, Fut>(&mut self, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TestOutcome> + Send + 'static,
    {
        self.hooks.register(HookKind::AfterAll, Callback::new(hook));
    }

    pub fn before_each<F, Fut>(&mut self, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TestOutcome> + Send + 'static,
    {
        self.hooks.register(HookKind::BeforeEach, Callback::new(hook));
    }

    pub fn after_each<F, Fut>(&mut self, hook: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TestOutcome> + Send + 'static,
    {
        self.hooks.register(HookKind::AfterEach, Callback::new(hook));
    }

    /// Record the file-scope hooks on the entry once the module has run.
    pub(crate) fn finish(self) {
        let file = self.hooks.file();
        self.entry.before_all = file.get(HookKind::BeforeAll).to_vec();
        self.entry.after_all = file.get(HookKind::AfterAll).to_vec();
    }
}
