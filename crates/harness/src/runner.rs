//! Parallel suite runner: projects, workers, retries and the JSON report

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::HarnessConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::fixtures::{FixtureRegistry, FixtureScope, ScopeLimits};

pub const RESULTS_FILE: &str = "results.json";

type TestFn = Arc<dyn Fn(FixtureScope) -> BoxFuture<'static, HarnessResult<()>> + Send + Sync>;

/// A named test body with tags such as `@smoke` or `@contract`
#[derive(Clone)]
pub struct TestCase {
    pub name: String,
    pub tags: Vec<String>,
    body: TestFn,
}

impl TestCase {
    pub fn new<F, Fut>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(FixtureScope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HarnessResult<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            tags: Vec::new(),
            body: Arc::new(move |scope| body(scope).boxed()),
        }
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.tags.push(tag.to_string());
        self
    }

    /// Name followed by tags; this is what project filters match against
    pub fn title(&self) -> String {
        if self.tags.is_empty() {
            self.name.clone()
        } else {
            format!("{} {}", self.name, self.tags.join(" "))
        }
    }
}

impl std::fmt::Debug for TestCase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestCase")
            .field("name", &self.name)
            .field("tags", &self.tags)
            .finish()
    }
}

/// A named selection of tests with its own retry policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    /// Run only tests whose title contains this
    pub grep: Option<String>,
    /// Never run tests whose title contains any of these
    pub grep_invert: Vec<String>,
    /// Overrides [`RunnerConfig::retries`]
    pub retries: Option<u32>,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            grep: None,
            grep_invert: Vec::new(),
            retries: None,
        }
    }

    pub fn grep(mut self, pattern: &str) -> Self {
        self.grep = Some(pattern.to_string());
        self
    }

    pub fn grep_invert(mut self, pattern: &str) -> Self {
        self.grep_invert.push(pattern.to_string());
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    /// The bundled projects: `api-tests`, `smoke`, `contract`, `exercises`
    pub fn builtin() -> Vec<Project> {
        vec![
            Project::new("api-tests")
                .grep_invert("@swagger")
                .grep_invert("@exercise"),
            Project::new("smoke").grep("@smoke").retries(0),
            Project::new("contract").grep("@contract").retries(0),
            Project::new("exercises").grep("@exercise"),
        ]
    }

    pub fn find(name: &str) -> Option<Project> {
        Self::builtin().into_iter().find(|p| p.name == name)
    }

    pub fn matches(&self, test: &TestCase) -> bool {
        let title = test.title();
        let included = self.grep.as_deref().map_or(true, |g| title.contains(g));
        let excluded = self.grep_invert.iter().any(|g| title.contains(g.as_str()));
        included && !excluded
    }

    pub fn select(&self, tests: &[TestCase]) -> Vec<TestCase> {
        tests.iter().filter(|t| self.matches(t)).cloned().collect()
    }
}

/// Configuration for the test runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub workers: usize,
    pub test_timeout: Duration,
    /// Cancels whatever is still running when it elapses
    pub suite_timeout: Option<Duration>,
    pub retries: u32,
    pub output_dir: PathBuf,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        let cores = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(2);
        Self {
            workers: (cores / 2).max(1),
            test_timeout: Duration::from_secs(30),
            suite_timeout: None,
            retries: 0,
            output_dir: PathBuf::from("test-results"),
        }
    }
}

impl RunnerConfig {
    /// Defaults with two retries on CI
    pub fn for_harness(config: &HarnessConfig) -> Self {
        Self {
            retries: if config.ci { 2 } else { 0 },
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestOutcome {
    Passed,
    /// Passed, but only after at least one retry
    Flaky,
    Failed,
    TimedOut,
    Skipped,
    Cancelled,
}

impl TestOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, TestOutcome::Failed | TestOutcome::TimedOut | TestOutcome::Cancelled)
    }

    fn from_error(err: &HarnessError) -> Self {
        match err {
            HarnessError::Skipped(_) => TestOutcome::Skipped,
            HarnessError::Cancelled(_) => TestOutcome::Cancelled,
            HarnessError::Timeout { .. } => TestOutcome::TimedOut,
            _ => TestOutcome::Failed,
        }
    }
}

/// Result of running a single test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub tags: Vec<String>,
    pub outcome: TestOutcome,
    pub attempts: u32,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub teardown_errors: Vec<String>,
    /// Fixtures resolved by the final attempt, in construction order
    pub fixtures: Vec<String>,
}

/// Result of running all tests of a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub project: String,
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub flaky: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub skipped: usize,
    pub cancelled: usize,
    pub duration_ms: u64,
    pub results: Vec<TestResult>,
}

impl TestSuiteResult {
    fn tally(project: &str, started_at: DateTime<Utc>, duration_ms: u64, results: Vec<TestResult>) -> Self {
        let count = |o: TestOutcome| results.iter().filter(|r| r.outcome == o).count();
        Self {
            project: project.to_string(),
            started_at,
            total: results.len(),
            passed: count(TestOutcome::Passed),
            flaky: count(TestOutcome::Flaky),
            failed: count(TestOutcome::Failed),
            timed_out: count(TestOutcome::TimedOut),
            skipped: count(TestOutcome::Skipped),
            cancelled: count(TestOutcome::Cancelled),
            duration_ms,
            results,
        }
    }

    pub fn success(&self) -> bool {
        !self.results.iter().any(|r| r.outcome.is_failure())
    }
}

/// Runs test cases in parallel, each inside its own fixture scope
pub struct TestRunner {
    registry: Arc<FixtureRegistry>,
    config: RunnerConfig,
}

impl TestRunner {
    pub fn new(registry: FixtureRegistry, config: RunnerConfig) -> Self {
        Self {
            registry: Arc::new(registry),
            config,
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run the tests `project` selects
    pub async fn run(&self, tests: &[TestCase], project: &Project) -> TestSuiteResult {
        let selected = project.select(tests);
        let retries = project.retries.unwrap_or(self.config.retries);
        let started_at = Utc::now();
        let start = Instant::now();

        info!(
            "Running {} test(s) in project '{}' with {} worker(s)...",
            selected.len(),
            project.name,
            self.config.workers
        );

        let cancel = CancellationToken::new();
        let suite_timer = self.config.suite_timeout.map(|after| {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(after).await;
                warn!("Suite timeout of {:?} reached, cancelling running tests", after);
                cancel.cancel();
            })
        });

        let workers = Arc::new(Semaphore::new(self.config.workers.max(1)));
        let mut handles = Vec::with_capacity(selected.len());
        for test in selected {
            let registry = self.registry.clone();
            let workers = workers.clone();
            let cancel = cancel.clone();
            let timeout = self.config.test_timeout;
            let name = test.name.clone();
            let tags = test.tags.clone();

            let handle = tokio::spawn(async move {
                let permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    permit = workers.acquire_owned() => permit.ok(),
                };
                match permit {
                    Some(_permit) => run_with_retries(registry, test, retries, timeout, cancel).await,
                    None => not_started(&test),
                }
            });
            handles.push((name, tags, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (name, tags, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => TestResult {
                    name,
                    tags,
                    outcome: TestOutcome::Failed,
                    attempts: 0,
                    duration_ms: 0,
                    error: Some(format!("worker task failed: {}", e)),
                    teardown_errors: Vec::new(),
                    fixtures: Vec::new(),
                },
            };
            log_result(&result);
            results.push(result);
        }

        if let Some(timer) = suite_timer {
            timer.abort();
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        let suite = TestSuiteResult::tally(&project.name, started_at, duration_ms, results);

        info!("");
        info!(
            "Test Results: {} passed, {} flaky, {} failed, {} timed out, {} skipped, {} cancelled ({} ms)",
            suite.passed, suite.flaky, suite.failed, suite.timed_out, suite.skipped, suite.cancelled, duration_ms
        );

        suite
    }

    /// Write test results to `<output_dir>/results.json`
    pub fn write_results(&self, results: &TestSuiteResult) -> HarnessResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.output_dir.join(RESULTS_FILE);
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

async fn run_with_retries(
    registry: Arc<FixtureRegistry>,
    test: TestCase,
    retries: u32,
    timeout: Duration,
    cancel: CancellationToken,
) -> TestResult {
    let start = Instant::now();
    let mut attempt = 0;

    loop {
        attempt += 1;
        debug!(test = %test.name, attempt, "running test");

        let limits = ScopeLimits {
            timeout: Some(timeout),
            cancel: Some(cancel.clone()),
        };
        let body = test.body.clone();
        let outcome = registry.run_scoped(&test.name, limits, move |scope| body(scope)).await;

        let (result, error) = match &outcome.result {
            Ok(()) if attempt == 1 => (TestOutcome::Passed, None),
            Ok(()) => (TestOutcome::Flaky, None),
            Err(e) => (TestOutcome::from_error(e), Some(e.to_string())),
        };

        let retry = matches!(result, TestOutcome::Failed | TestOutcome::TimedOut)
            && attempt <= retries
            && !cancel.is_cancelled();
        if retry {
            warn!(
                "↻ {} attempt {} failed, retrying: {}",
                test.name,
                attempt,
                error.as_deref().unwrap_or("unknown error")
            );
            continue;
        }

        return TestResult {
            name: test.name.clone(),
            tags: test.tags.clone(),
            outcome: result,
            attempts: attempt,
            duration_ms: start.elapsed().as_millis() as u64,
            error,
            teardown_errors: outcome.teardown_errors.iter().map(|e| e.to_string()).collect(),
            fixtures: outcome.resolved.iter().map(|f| f.to_string()).collect(),
        };
    }
}

fn not_started(test: &TestCase) -> TestResult {
    TestResult {
        name: test.name.clone(),
        tags: test.tags.clone(),
        outcome: TestOutcome::Cancelled,
        attempts: 0,
        duration_ms: 0,
        error: Some("suite timed out before the test started".to_string()),
        teardown_errors: Vec::new(),
        fixtures: Vec::new(),
    }
}

fn log_result(result: &TestResult) {
    match result.outcome {
        TestOutcome::Passed => info!("✓ {} ({} ms)", result.name, result.duration_ms),
        TestOutcome::Flaky => warn!(
            "✓ {} ({} ms, flaky after {} attempts)",
            result.name, result.duration_ms, result.attempts
        ),
        TestOutcome::Skipped => info!(
            "- {} skipped: {}",
            result.name,
            result.error.as_deref().unwrap_or("")
        ),
        _ => error!(
            "✗ {} - {}",
            result.name,
            result.error.as_deref().unwrap_or("unknown error")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(name: &str) -> TestCase {
        TestCase::new(name, |_| async { Ok(()) })
    }

    #[test]
    fn test_title_includes_tags() {
        let t = noop("login works").tag("@smoke").tag("@auth");
        assert_eq!(t.title(), "login works @smoke @auth");
        assert_eq!(noop("plain").title(), "plain");
    }

    #[test]
    fn test_builtin_project_selection() {
        let tests = vec![
            noop("profile schema").tag("@contract"),
            noop("login").tag("@smoke"),
            noop("swagger ui").tag("@swagger"),
            noop("batch job").tag("@exercise"),
        ];

        let names = |p: &str| -> Vec<String> {
            Project::find(p)
                .unwrap()
                .select(&tests)
                .into_iter()
                .map(|t| t.name)
                .collect()
        };

        assert_eq!(names("smoke"), vec!["login"]);
        assert_eq!(names("contract"), vec!["profile schema"]);
        assert_eq!(names("exercises"), vec!["batch job"]);
        assert_eq!(names("api-tests"), vec!["profile schema", "login"]);
        assert!(Project::find("ui-demo").is_none());
    }

    #[test]
    fn test_retries_follow_ci() {
        let mut cfg = HarnessConfig::default();
        assert_eq!(RunnerConfig::for_harness(&cfg).retries, 0);
        cfg.ci = true;
        assert_eq!(RunnerConfig::for_harness(&cfg).retries, 2);
        assert_eq!(Project::find("smoke").unwrap().retries, Some(0));
    }

    #[test]
    fn test_outcome_classification() {
        assert_eq!(TestOutcome::from_error(&HarnessError::Skipped("x".into())), TestOutcome::Skipped);
        assert_eq!(
            TestOutcome::from_error(&HarnessError::Timeout {
                operation: "t".into(),
                after: Duration::from_secs(1)
            }),
            TestOutcome::TimedOut
        );
        assert_eq!(
            TestOutcome::from_error(&HarnessError::Registration {
                status: 400,
                body: "{}".into()
            }),
            TestOutcome::Failed
        );
        assert!(!TestOutcome::Flaky.is_failure());
        assert!(!TestOutcome::Skipped.is_failure());
        assert!(TestOutcome::Cancelled.is_failure());
    }

    #[test]
    fn test_outcome_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&TestOutcome::TimedOut).unwrap(), "\"timed_out\"");
    }
}
