use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use verdict::Config;
use verdict::coverage::{self, ProfileDirCollector};
use verdict::prelude::*;

/// Writes a V8-style dump for `source` into the worker's profile directory,
/// the way an instrumented child process would.
fn dump(profiles: &Path, source: &Path, covered_bytes: usize) {
    fs::create_dir_all(profiles).unwrap();
    let url = url::Url::from_file_path(source).unwrap().to_string();
    let body = serde_json::json!({
        "result": [{
            "scriptId": "1",
            "url": url,
            "functions": [{
                "functionName": "",
                "isBlockCoverage": true,
                "ranges": [
                    {"startOffset": 0, "endOffset": 12, "count": 1},
                    {"startOffset": covered_bytes, "endOffset": 12, "count": 0}
                ]
            }]
        }]
    });
    fs::write(profiles.join("coverage-1.json"), body.to_string()).unwrap();
}

#[tokio::test]
async fn profile_dumps_become_line_coverage_and_lcov() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    let source = root.join("src").join("lib.js");
    fs::create_dir_all(source.parent().unwrap()).unwrap();
    // Three lines of four bytes each.
    fs::write(&source, "aaa\nbbb\nccc\n").unwrap();

    let config = Config::from_toml(
        r#"
        [coverage]
        enabled = true
        profile_dir = "profiles"
        lcov = "out/lcov.info"
        "#,
    )
    .unwrap();
    let source_for_test = source.clone();

    let harness = Harness::new(&root)
        .with_config(config)
        .module("app.test.js", move |t| {
            let source = source_for_test.clone();
            t.test("exercises lib", move || {
                let source = source.clone();
                async move {
                    let profiles = coverage::profile_dir().expect("coverage run");
                    dump(&profiles, &source, 8);
                    Ok(())
                }
            });
        });

    let mut options = harness.options();
    assert!(options.coverage);
    options.parallel = false;
    let report = harness.run(&options, None).await.unwrap();

    let coverage = report.coverage.expect("coverage collected");
    let file = coverage.get(&std::path::absolute(&source).unwrap()).unwrap();
    assert_eq!(file.covered.iter().copied().collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(file.uncovered.iter().copied().collect::<Vec<_>>(), vec![3]);

    let lcov = fs::read_to_string(root.join("out/lcov.info")).unwrap();
    assert!(lcov.contains("DA:3,0"));
    assert!(lcov.contains("LH:2"));
}

#[tokio::test]
async fn custom_collector_factory_is_used_per_worker() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("custom");
    let harness = Harness::new(dir.path())
        .with_coverage_collector(ProfileDirCollector::factory(&base))
        .module("a.test.rs", |t| {
            t.test("noop", || async { Ok(()) });
        })
        .module("b.test.rs", |t| {
            t.test("noop", || async { Ok(()) });
        });

    let options = RunOptions {
        coverage: true,
        parallel: true,
        max_workers: 2,
        ..RunOptions::default()
    };
    let report = harness.run(&options, None).await.unwrap();

    assert!(report.coverage.unwrap().is_empty());
    assert!(base.join("worker-0").is_dir());
    assert!(base.join("worker-1").is_dir());
}

/// A module whose test dumps coverage for `source` into whatever profile
/// directory its worker was given, and remembers that directory.
fn dumping_module(
    harness: Harness,
    name: &str,
    source: PathBuf,
    covered_bytes: usize,
    seen: Arc<Mutex<Vec<PathBuf>>>,
) -> Harness {
    harness.module(name, move |t| {
        let source = source.clone();
        let seen = Arc::clone(&seen);
        t.test("exercises lib", move || {
            let source = source.clone();
            let seen = Arc::clone(&seen);
            async move {
                let profiles = coverage::profile_dir().expect("coverage run");
                dump(&profiles, &source, covered_bytes);
                seen.lock().unwrap().push(profiles);
                Ok(())
            }
        });
    })
}

#[tokio::test]
async fn parallel_workers_dump_into_their_own_directories() {
    let dir = tempfile::tempdir().unwrap();
    let root = std::path::absolute(dir.path()).unwrap();
    let source = root.join("src").join("lib.js");
    fs::create_dir_all(source.parent().unwrap()).unwrap();
    fs::write(&source, "aaa\nbbb\nccc\n").unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let harness = Harness::new(&root);
    let harness = dumping_module(harness, "a.test.js", source.clone(), 4, Arc::clone(&seen));
    let harness = dumping_module(harness, "b.test.js", source.clone(), 8, Arc::clone(&seen));

    let options = RunOptions {
        coverage: true,
        parallel: true,
        max_workers: 2,
        ..RunOptions::default()
    };
    let report = harness.run(&options, None).await.unwrap();
    assert_eq!(report.summary.passed, 2);

    let mut dirs = seen.lock().unwrap().clone();
    dirs.sort();
    dirs.dedup();
    assert_eq!(dirs.len(), 2);
    for profiles in &dirs {
        assert!(profiles.join("coverage-1.json").is_file());
    }

    // Worker a covered line 1, worker b lines 1 and 2.
    let coverage = report.coverage.expect("coverage collected");
    let file = coverage.get(&source).unwrap();
    assert_eq!(file.covered.iter().copied().collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(file.uncovered.iter().copied().collect::<Vec<_>>(), vec![3]);
}

#[tokio::test]
async fn profile_dir_is_unset_without_coverage() {
    let dir = tempfile::tempdir().unwrap();
    let harness = Harness::new(dir.path()).module("a.test.rs", |t| {
        t.test("no dir", || async {
            expect(coverage::profile_dir()).to_be_none()?;
            Ok(())
        });
    });
    let report = harness.run(&RunOptions::default(), None).await.unwrap();
    assert_eq!(report.summary.passed, 1);
}
