use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use verdict::cache::{CACHE_FILE, PassedCache};
use verdict::prelude::*;

fn options() -> RunOptions {
    RunOptions {
        skip_passed: true,
        ..RunOptions::default()
    }
}

fn counting(root: &std::path::Path, runs: Arc<AtomicUsize>) -> Harness {
    Harness::new(root).module("a.test.rs", move |t| {
        let runs = Arc::clone(&runs);
        t.test("counts", move || {
            let runs = Arc::clone(&runs);
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
    })
}

#[tokio::test]
async fn unchanged_passing_file_is_not_run_again() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.test.rs"), "v1").unwrap();
    let runs = Arc::new(AtomicUsize::new(0));
    let harness = counting(dir.path(), Arc::clone(&runs));

    let first = harness.run(&options(), None).await.unwrap();
    assert_eq!(first.summary.passed, 1);
    assert!(dir.path().join(CACHE_FILE).exists());

    let second = harness.run(&options(), None).await.unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(second.summary.total, 0);
    assert!(second.file("a.test.rs").unwrap().cached);

    fs::write(dir.path().join("a.test.rs"), "v2").unwrap();
    let third = harness.run(&options(), None).await.unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert_eq!(third.summary.passed, 1);
    assert_eq!(PassedCache::load(dir.path()).len(), 1);
}

#[tokio::test]
async fn failing_file_is_never_cached() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("b.test.rs"), "v1").unwrap();
    let harness = Harness::new(dir.path()).module("b.test.rs", |t| {
        t.test("fails", || async { anyhow::bail!("boom") });
    });

    harness.run(&options(), None).await.unwrap();
    let again = harness.run(&options(), None).await.unwrap();
    assert_eq!(again.summary.failed, 1);
    assert!(PassedCache::load(dir.path()).is_empty());
}

#[tokio::test]
async fn cache_is_ignored_without_skip_passed() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.test.rs"), "v1").unwrap();
    let runs = Arc::new(AtomicUsize::new(0));
    let harness = counting(dir.path(), Arc::clone(&runs));

    harness.run(&options(), None).await.unwrap();
    harness.run(&RunOptions::default(), None).await.unwrap();
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn filtered_pass_does_not_cache_the_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("c.test.rs"), "v1").unwrap();
    let harness = Harness::new(dir.path()).module("c.test.rs", |t| {
        t.test("good", || async { Ok(()) });
        t.test("bad", || async { anyhow::bail!("boom") });
    });

    let only_good = RunOptions {
        test: vec!["good".to_string()],
        ..options()
    };
    let first = harness.run(&only_good, None).await.unwrap();
    assert_eq!(first.summary.passed, 1);
    assert!(PassedCache::load(dir.path()).is_empty());

    let second = harness.run(&options(), None).await.unwrap();
    assert!(!second.file("c.test.rs").unwrap().cached);
    assert_eq!(second.summary.failed, 1);
    assert_eq!(second.exit_code(), 1);
}
