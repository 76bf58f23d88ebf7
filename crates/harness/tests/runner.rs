use gatewayqa_harness::fixtures::{FixtureKey, FixtureRegistry};
use gatewayqa_harness::runner::RESULTS_FILE;
use gatewayqa_harness::{HarnessError, Project, RunnerConfig, TestCase, TestOutcome, TestRunner, TestSuiteResult};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

const SESSION: FixtureKey<String> = FixtureKey::new("session");

fn runner_with_counter(config: RunnerConfig) -> (TestRunner, Arc<AtomicU32>) {
    let released = Arc::new(AtomicU32::new(0));
    let counter = released.clone();
    let mut registry = FixtureRegistry::new();
    registry
        .provide_with_teardown(
            SESSION,
            &[],
            |scope| {
                let name = scope.test_name().to_string();
                async move { Ok(format!("session-{}", name)) }
            },
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            },
        )
        .unwrap();
    (TestRunner::new(registry, config), released)
}

fn config(dir: &tempfile::TempDir) -> RunnerConfig {
    RunnerConfig {
        workers: 4,
        test_timeout: Duration::from_secs(5),
        suite_timeout: None,
        retries: 0,
        output_dir: dir.path().to_path_buf(),
    }
}

fn outcome_of(suite: &TestSuiteResult, name: &str) -> TestOutcome {
    suite.results.iter().find(|r| r.name == name).unwrap().outcome
}

#[tokio::test]
async fn mixed_outcomes_are_tallied() {
    let dir = tempfile::tempdir().unwrap();
    let (runner, released) = runner_with_counter(config(&dir));

    let tests = vec![
        TestCase::new("passes", |scope| async move {
            scope.get(&SESSION).await?;
            Ok::<_, HarnessError>(())
        }),
        TestCase::new("fails", |scope| async move {
            scope.get(&SESSION).await?;
            Err::<(), _>(HarnessError::Assertion("expected 201".into()))
        }),
        TestCase::new("skips", |_| async { Err(HarnessError::Skipped("exercise not enabled".into())) }),
        TestCase::new("panics", |_| async {
            if true {
                panic!("boom");
            }
            Ok(())
        }),
    ];

    let suite = runner.run(&tests, &Project::new("all")).await;
    assert_eq!(suite.total, 4);
    assert_eq!(suite.passed, 1);
    assert_eq!(suite.failed, 2);
    assert_eq!(suite.skipped, 1);
    assert!(!suite.success());

    assert_eq!(outcome_of(&suite, "skips"), TestOutcome::Skipped);
    assert_eq!(outcome_of(&suite, "panics"), TestOutcome::Failed);
    // only the two tests that resolved the session released it
    assert_eq!(released.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn retried_pass_is_flaky() {
    let dir = tempfile::tempdir().unwrap();
    let (runner, released) = runner_with_counter(RunnerConfig {
        retries: 2,
        ..config(&dir)
    });

    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let tests = vec![TestCase::new("eventually consistent", move |scope| {
        let attempt = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            scope.get(&SESSION).await?;
            if attempt == 0 {
                return Err(HarnessError::Assertion("status still pending".into()));
            }
            Ok::<_, HarnessError>(())
        }
    })];

    let suite = runner.run(&tests, &Project::new("all")).await;
    let result = &suite.results[0];
    assert_eq!(result.outcome, TestOutcome::Flaky);
    assert_eq!(result.attempts, 2);
    assert_eq!(suite.flaky, 1);
    assert!(suite.success());
    // every attempt gets its own scope and its own teardown
    assert_eq!(released.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn project_retries_override_runner() {
    let dir = tempfile::tempdir().unwrap();
    let (runner, _) = runner_with_counter(RunnerConfig {
        retries: 2,
        ..config(&dir)
    });

    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let tests = vec![TestCase::new("always fails", move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        async { Err(HarnessError::Assertion("nope".into())) }
    })
    .tag("@smoke")];

    let suite = runner.run(&tests, &Project::find("smoke").unwrap()).await;
    assert_eq!(suite.results[0].outcome, TestOutcome::Failed);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn slow_test_times_out_and_tears_down() {
    let dir = tempfile::tempdir().unwrap();
    let (runner, released) = runner_with_counter(RunnerConfig {
        test_timeout: Duration::from_millis(50),
        ..config(&dir)
    });

    let tests = vec![TestCase::new("hangs", |scope| async move {
        scope.get(&SESSION).await?;
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok::<_, HarnessError>(())
    })];

    let suite = runner.run(&tests, &Project::new("all")).await;
    assert_eq!(suite.timed_out, 1);
    assert_eq!(released.load(Ordering::SeqCst), 1);
}

/// The suite timeout cancels running tests and forces their teardown;
/// tests still queued never start.
#[tokio::test]
async fn suite_timeout_cancels_in_flight_tests() {
    let dir = tempfile::tempdir().unwrap();
    let (runner, released) = runner_with_counter(RunnerConfig {
        workers: 1,
        suite_timeout: Some(Duration::from_millis(100)),
        ..config(&dir)
    });

    let hang = |scope: gatewayqa_harness::FixtureScope| async move {
        scope.get(&SESSION).await?;
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok::<_, HarnessError>(())
    };
    let tests = vec![TestCase::new("first", hang), TestCase::new("second", hang)];

    let suite = runner.run(&tests, &Project::new("all")).await;
    assert_eq!(suite.cancelled, 2);
    assert_eq!(suite.results[0].attempts, 1);
    assert_eq!(suite.results[1].attempts, 0);
    assert_eq!(released.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn results_written_as_json() {
    let dir = tempfile::tempdir().unwrap();
    let (runner, _) = runner_with_counter(config(&dir));

    let tests = vec![
        TestCase::new("login", |_| async { Ok(()) }).tag("@smoke"),
        TestCase::new("schema", |_| async { Ok(()) }).tag("@contract"),
    ];
    let suite = runner.run(&tests, &Project::find("contract").unwrap()).await;
    let path = runner.write_results(&suite).unwrap();

    assert_eq!(path, dir.path().join(RESULTS_FILE));
    let written: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written["project"], "contract");
    assert_eq!(written["total"], 1);
    assert_eq!(written["results"][0]["name"], "schema");
    assert_eq!(written["results"][0]["outcome"], "passed");
}

/// A teardown that panics is reported beside the result, not instead of it
#[tokio::test]
async fn panicking_teardown_keeps_outcome() {
    const CONN: FixtureKey<String> = FixtureKey::new("conn");
    const EXPLODES: FixtureKey<String> = FixtureKey::new("explodes");

    let dir = tempfile::tempdir().unwrap();
    let released = Arc::new(AtomicU32::new(0));
    let counter = released.clone();
    let mut registry = FixtureRegistry::new();
    registry
        .provide_with_teardown(
            CONN,
            &[],
            |_| async { Ok("conn".to_string()) },
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            },
        )
        .unwrap();
    registry
        .provide_with_teardown(
            EXPLODES,
            &["conn"],
            |scope| async move { Ok::<_, HarnessError>(format!("{}+", scope.get(&CONN).await?)) },
            |_| async {
                if true {
                    panic!("teardown blew up");
                }
                Ok::<(), HarnessError>(())
            },
        )
        .unwrap();
    let runner = TestRunner::new(registry, config(&dir));

    let tests = vec![TestCase::new("uses both", |scope| async move {
        scope.get(&EXPLODES).await?;
        Ok::<_, HarnessError>(())
    })];
    let suite = runner.run(&tests, &Project::new("all")).await;

    let result = &suite.results[0];
    assert_eq!(result.outcome, TestOutcome::Passed);
    assert_eq!(result.attempts, 1);
    assert_eq!(result.teardown_errors.len(), 1);
    assert!(result.teardown_errors[0].contains("teardown blew up"));
    assert_eq!(released.load(Ordering::SeqCst), 1);
}
