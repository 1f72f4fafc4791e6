//! Declaration-time state for one run (or one worker).
//!
//! A [`TestSession`] owns the hook registry and the test queue. It is built
//! fresh for each run, so nothing declared in one run can leak into another.

pub mod declare;
pub mod hooks;
pub mod queue;

use std::panic::AssertUnwindSafe;

use tracing::debug;

use crate::discovery::TestModule;
use crate::error::{Error, Result};
use crate::models::FailureDetail;

pub use declare::{FileScope, SUITE_SEPARATOR};
pub use hooks::{Callback, HookKind, HookRegistry, HookScope, HookSet, TestOutcome};
pub use queue::{FileEntry, Suite, SuiteItem, TestCase, TestQueue};

#[derive(Debug, Default)]
pub struct TestSession {
    hooks: HookRegistry,
    queue: TestQueue,
}

impl TestSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a module's declarations against a fresh file entry.
    ///
    /// A panic inside the module's entry function is reported as
    /// [`Error::Import`] and the file's entry is dropped from the queue.
    pub fn import(&mut self, module: &TestModule) -> Result<()> {
        debug!(file = %module.path.display(), "importing test module");
        self.hooks.clear_file_level_hooks();
        let entry = self.queue.set_current_file(module.path.clone());
        let mut scope = FileScope::new(&mut self.hooks, entry);

        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
            module.declare(&mut scope);
            scope
        }));
        match outcome {
            Ok(scope) => {
                scope.finish();
                Ok(())
            }
            Err(payload) => {
                // A panic can leave suite frames open.
                while self.hooks.depth() > 0 {
                    self.hooks.clear_suite_level_hooks();
                }
                self.queue.remove(&module.path);
                Err(Error::Import {
                    path: module.path.clone(),
                    message: FailureDetail::from_panic(payload).message,
                })
            }
        }
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    pub fn queue(&self) -> &TestQueue {
        &self.queue
    }

    pub fn into_queue(self) -> TestQueue {
        self.queue
    }
}
