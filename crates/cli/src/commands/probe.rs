//! Readiness check against the gateway

use clap::Args;
use gatewayqa_harness::readiness::ReadinessProbe;
use gatewayqa_harness::HarnessConfig;
use std::time::Duration;

use crate::output;

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Give up after this many seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,
}

pub async fn execute(args: ProbeArgs, config: &HarnessConfig) -> anyhow::Result<()> {
    let probe = ReadinessProbe {
        deadline: Duration::from_secs(args.timeout),
        ..ReadinessProbe::new(config.api_base())
    };
    let attempts = probe.wait().await?;
    output::print_success(&format!(
        "Gateway ready at {} after {} attempt(s)",
        probe.url(),
        attempts
    ));
    Ok(())
}
