//! GatewayQA CLI - Main Entry Point
//!
//! Runs black-box API suites against a running AI gateway.

use clap::{Parser, Subcommand};
use gatewayqa_harness::HarnessConfig;
use std::path::PathBuf;
use std::process::ExitCode;

use gatewayqa_cli::commands::{list, probe, run};
use gatewayqa_cli::output;

/// GatewayQA - API test harness for the AI gateway
#[derive(Parser)]
#[command(name = "gatewayqa")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Gateway base URL
    #[arg(long, env = "BASE_URL", global = true)]
    base_url: Option<String>,

    /// YAML config file; environment variables still override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a project's tests against the gateway
    Run(run::RunArgs),

    /// List bundled tests
    List(list::ListArgs),

    /// Wait for the gateway health endpoint
    Probe(probe::ProbeArgs),
}

impl Cli {
    fn harness_config(&self) -> anyhow::Result<HarnessConfig> {
        let mut config = match &self.config {
            Some(path) => HarnessConfig::load(path)?.with_env(),
            None => HarnessConfig::from_env(),
        };
        if let Some(url) = &self.base_url {
            config.base_url = url.clone();
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    match dispatch(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            ExitCode::from(2)
        }
    }
}

async fn dispatch(cli: Cli) -> anyhow::Result<bool> {
    let config = cli.harness_config()?;
    match cli.command {
        Commands::Run(args) => run::execute(args, config, cli.format).await,
        Commands::List(args) => list::execute(args, cli.format).map(|_| true),
        Commands::Probe(args) => probe::execute(args, &config).await.map(|_| true),
    }
}
