use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

use super::hooks::Callback;

/// A declared test with the hook chains that were registered when it was
/// declared. Hooks registered later never attach retroactively.
#[derive(Debug, Clone)]
pub struct TestCase {
    pub name: String,
    pub body: Callback,
    /// File-scope hooks first, then suite-scope.
    pub before_each: Vec<Callback>,
    /// Suite-scope hooks first, then file-scope.
    pub after_each: Vec<Callback>,
}

/// One entry of a suite body, kept in declaration order.
#[derive(Debug, Clone)]
pub enum SuiteItem {
    Test(TestCase),
    Suite(Suite),
}

/// A `describe` block. Nested suites sit among the tests in the order they
/// were declared, and run inside this suite's beforeAll/afterAll.
#[derive(Debug, Clone, Default)]
pub struct Suite {
    pub name: String,
    pub items: Vec<SuiteItem>,
    pub before_all: Vec<Callback>,
    pub after_all: Vec<Callback>,
}

impl Suite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn push_test(&mut self, test: TestCase) {
        self.items.push(SuiteItem::Test(test));
    }

    pub fn push_suite(&mut self, suite: Suite) {
        self.items.push(SuiteItem::Suite(suite));
    }

    /// Tests declared directly in this suite.
    pub fn tests(&self) -> impl Iterator<Item = &TestCase> {
        self.items.iter().filter_map(|item| match item {
            SuiteItem::Test(test) => Some(test),
            SuiteItem::Suite(_) => None,
        })
    }

    /// Suites declared directly in this suite.
    pub fn suites(&self) -> impl Iterator<Item = &Suite> {
        self.items.iter().filter_map(|item| match item {
            SuiteItem::Suite(suite) => Some(suite),
            SuiteItem::Test(_) => None,
        })
    }

    /// Tests in this suite and every suite nested in it.
    pub fn test_count(&self) -> usize {
        self.items
            .iter()
            .map(|item| match item {
                SuiteItem::Test(_) => 1,
                SuiteItem::Suite(suite) => suite.test_count(),
            })
            .sum()
    }
}

/// Everything one test file declared.
#[derive(Debug, Clone, Default)]
pub struct FileEntry {
    pub path: PathBuf,
    /// Top-level suites. Nested suites live inside their parent.
    pub suites: Vec<Suite>,
    /// Tests declared outside any suite. These run without beforeAll/afterAll.
    pub tests: Vec<TestCase>,
    /// File-scope hooks as they stood when the import finished. Suites carry
    /// their own copies; the runner does not wrap top-level tests in these.
    pub before_all: Vec<Callback>,
    pub after_all: Vec<Callback>,
}

impl FileEntry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn test_count(&self) -> usize {
        self.suites.iter().map(Suite::test_count).sum::<usize>() + self.tests.len()
    }
}

/// Files in discovery order, each with its declared suites and tests.
#[derive(Debug, Default)]
pub struct TestQueue {
    entries: Vec<FileEntry>,
    active: Option<usize>,
}

impl TestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and activate the entry for `path`. Re-importing a path resets
    /// its entry in place so queue order is unchanged.
    pub fn set_current_file(&mut self, path: impl Into<PathBuf>) -> &mut FileEntry {
        let path = path.into();
        let index = match self.entries.iter().position(|e| e.path == path) {
            Some(index) => {
                self.entries[index] = FileEntry::new(path);
                index
            }
            None => {
                self.entries.push(FileEntry::new(path));
                self.entries.len() - 1
            }
        };
        self.active = Some(index);
        &mut self.entries[index]
    }

    pub fn current_mut(&mut self) -> Option<&mut FileEntry> {
        let index = self.active?;
        self.entries.get_mut(index)
    }

    /// Append a suite to the active file, returning its index there.
    pub fn add_suite(&mut self, suite: Suite) -> Result<usize> {
        let entry = self.current_mut().ok_or(Error::NoActiveFile)?;
        entry.suites.push(suite);
        Ok(entry.suites.len() - 1)
    }

    /// Append a top-level test to the active file.
    pub fn add_test(&mut self, test: TestCase) -> Result<()> {
        let entry = self.current_mut().ok_or(Error::NoActiveFile)?;
        entry.tests.push(test);
        Ok(())
    }

    pub fn get_queue(&self) -> &[FileEntry] {
        &self.entries
    }

    pub fn get(&self, path: &Path) -> Option<&FileEntry> {
        self.entries.iter().find(|e| e.path == path)
    }

    /// Drop a file's entry, e.g. after its import failed.
    pub fn remove(&mut self, path: &Path) -> Option<FileEntry> {
        let index = self.entries.iter().position(|e| e.path == path)?;
        self.active = None;
        Some(self.entries.remove(index))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.active = None;
    }

    pub fn into_entries(self) -> Vec<FileEntry> {
        self.entries
    }
}
