use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;

/// Outcome of a test body or hook.
pub type TestOutcome = anyhow::Result<()>;

type CallbackFn = dyn Fn() -> BoxFuture<'static, TestOutcome> + Send + Sync;

/// A zero-argument async callable: a test body or a lifecycle hook.
///
/// Cloning is cheap; the same hook is shared by every test that snapshotted it.
#[derive(Clone)]
pub struct Callback(Arc<CallbackFn>);

impl Callback {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TestOutcome> + Send + 'static,
    {
        Self(Arc::new(move || Box::pin(f())))
    }

    pub fn call(&self) -> BoxFuture<'static, TestOutcome> {
        (self.0)()
    }

    pub fn ptr_eq(&self, other: &Callback) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callback(..)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    BeforeAll,
    AfterAll,
    BeforeEach,
    AfterEach,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HookKind::BeforeAll => "beforeAll",
            HookKind::AfterAll => "afterAll",
            HookKind::BeforeEach => "beforeEach",
            HookKind::AfterEach => "afterEach",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookScope {
    /// Declared at the top level of a test file; applies to every test in it.
    File,
    /// Declared inside a suite body; applies to tests of that suite only.
    Suite,
}

/// Four ordered hook sequences, one per [`HookKind`].
#[derive(Debug, Clone, Default)]
pub struct HookSet {
    before_all: Vec<Callback>,
    after_all: Vec<Callback>,
    before_each: Vec<Callback>,
    after_each: Vec<Callback>,
}

impl HookSet {
    pub fn get(&self, kind: HookKind) -> &[Callback] {
        match kind {
            HookKind::BeforeAll => &self.before_all,
            HookKind::AfterAll => &self.after_all,
            HookKind::BeforeEach => &self.before_each,
            HookKind::AfterEach => &self.after_each,
        }
    }

    fn get_mut(&mut self, kind: HookKind) -> &mut Vec<Callback> {
        match kind {
            HookKind::BeforeAll => &mut self.before_all,
            HookKind::AfterAll => &mut self.after_all,
            HookKind::BeforeEach => &mut self.before_each,
            HookKind::AfterEach => &mut self.after_each,
        }
    }

    pub fn push(&mut self, kind: HookKind, hook: Callback) {
        self.get_mut(kind).push(hook);
    }

    pub fn take(&mut self, kind: HookKind) -> Vec<Callback> {
        std::mem::take(self.get_mut(kind))
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        self.before_all.is_empty()
            && self.after_all.is_empty()
            && self.before_each.is_empty()
            && self.after_each.is_empty()
    }
}

/// Pending lifecycle hooks, split into file scope and a stack of open suite
/// scopes.
///
/// Scope is decided by the frame stack the declaration API pushes around
/// each suite body: a hook lands in the innermost open suite, or at file
/// scope when no suite body is executing.
#[derive(Debug, Default)]
pub struct HookRegistry {
    file: HookSet,
    suites: Vec<HookSet>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: HookKind, hook: Callback) -> HookScope {
        match self.suites.last_mut() {
            Some(frame) => {
                frame.push(kind, hook);
                HookScope::Suite
            }
            None => {
                self.file.push(kind, hook);
                HookScope::File
            }
        }
    }

    /// Open a suite frame. Must be paired with [`clear_suite_level_hooks`].
    ///
    /// [`clear_suite_level_hooks`]: HookRegistry::clear_suite_level_hooks
    pub fn enter_suite(&mut self) {
        self.suites.push(HookSet::default());
    }

    /// Close the innermost suite frame, returning the hooks it collected.
    /// Sibling suites declared afterwards start from an empty frame.
    pub fn clear_suite_level_hooks(&mut self) -> HookSet {
        self.suites.pop().unwrap_or_default()
    }

    pub fn clear_file_level_hooks(&mut self) {
        self.file.clear();
    }

    pub fn file(&self) -> &HookSet {
        &self.file
    }

    pub fn current_suite(&self) -> Option<&HookSet> {
        self.suites.last()
    }

    pub fn depth(&self) -> usize {
        self.suites.len()
    }

    /// File hooks first, then each open suite from outermost to innermost.
    pub fn before_each_chain(&self) -> Vec<Callback> {
        std::iter::once(&self.file)
            .chain(self.suites.iter())
            .flat_map(|set| set.get(HookKind::BeforeEach).iter().cloned())
            .collect()
    }

    /// Innermost suite first, file hooks last.
    pub fn after_each_chain(&self) -> Vec<Callback> {
        self.suites
            .iter()
            .rev()
            .chain(std::iter::once(&self.file))
            .flat_map(|set| set.get(HookKind::AfterEach).iter().cloned())
            .collect()
    }
}
