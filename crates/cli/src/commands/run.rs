//! Run a project against the gateway

use anyhow::Context;
use clap::Args;
use gatewayqa_harness::readiness::ReadinessProbe;
use gatewayqa_harness::{api_fixtures, HarnessConfig, Project, RunnerConfig, TestRunner};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::output::{self, OutputFormat};
use crate::suites;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Project to run
    #[arg(long, default_value = "api-tests")]
    pub project: String,

    /// Retries per failing test (defaults to 2 on CI, 0 otherwise)
    #[arg(long)]
    pub retries: Option<u32>,

    /// Parallel workers
    #[arg(long)]
    pub workers: Option<usize>,

    /// Directory for results.json
    #[arg(long, default_value = "test-results")]
    pub output: PathBuf,

    /// Per-test timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub test_timeout: u64,

    /// Cancel everything still running after this many seconds
    #[arg(long)]
    pub suite_timeout: Option<u64>,

    /// Skip the readiness probe before running
    #[arg(long)]
    pub no_probe: bool,
}

impl RunArgs {
    fn runner_config(&self, config: &HarnessConfig) -> RunnerConfig {
        let defaults = RunnerConfig::for_harness(config);
        RunnerConfig {
            workers: self.workers.unwrap_or(defaults.workers),
            test_timeout: Duration::from_secs(self.test_timeout),
            suite_timeout: self.suite_timeout.map(Duration::from_secs),
            retries: self.retries.unwrap_or(defaults.retries),
            output_dir: self.output.clone(),
        }
    }
}

/// Returns whether every selected test passed
pub async fn execute(args: RunArgs, config: HarnessConfig, format: OutputFormat) -> anyhow::Result<bool> {
    let project = Project::find(&args.project)
        .with_context(|| format!("unknown project '{}'", args.project))?;

    if !args.no_probe {
        ReadinessProbe::new(config.api_base())
            .wait()
            .await
            .context("gateway is not ready")?;
    }

    let runner_config = args.runner_config(&config);
    info!(
        base_url = %config.api_base(),
        project = %project.name,
        retries = runner_config.retries,
        "starting run"
    );

    let registry = api_fixtures(config).context("building fixtures")?;
    let runner = TestRunner::new(registry, runner_config);
    let suite = runner.run(&suites::all(), &project).await;

    let path = runner.write_results(&suite).context("writing results")?;
    output::print_suite(&suite, format);
    output::print_info(&format!("Report: {}", path.display()));

    Ok(suite.success())
}
