//! Readiness probing of the system under test

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{HarnessError, HarnessResult};
use crate::poll::wait_for;

pub const HEALTH_PATH: &str = "/healthz";

/// How long and how often to probe
#[derive(Debug, Clone)]
pub struct ReadinessProbe {
    pub base_url: String,
    pub path: String,
    pub deadline: Duration,
    pub interval: Duration,
}

impl ReadinessProbe {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            path: HEALTH_PATH.to_string(),
            deadline: Duration::from_secs(30),
            interval: Duration::from_millis(100),
        }
    }

    pub fn url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.path)
    }

    /// Poll the health endpoint until it answers 2xx; returns the number of attempts
    pub async fn wait(&self) -> HarnessResult<usize> {
        let url = self.url();
        let client = reqwest::Client::builder()
            .timeout(self.deadline.min(Duration::from_secs(2)))
            .build()?;
        let counter = AtomicUsize::new(0);
        let (client, target, attempts) = (&client, url.as_str(), &counter);

        debug!(%url, deadline = ?self.deadline, "probing gateway health");
        let ready = wait_for(
            || async move {
                let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
                match client.get(target).send().await {
                    Ok(resp) if resp.status().is_success() => true,
                    Ok(resp) => {
                        warn!(url = target, attempt, status = %resp.status(), "gateway not healthy yet");
                        false
                    }
                    // refused connections are normal while the gateway boots
                    Err(e) if e.is_connect() => false,
                    Err(e) => {
                        warn!(url = target, attempt, error = %e, "health request failed");
                        false
                    }
                }
            },
            self.deadline,
            self.interval,
        )
        .await;

        let attempts = counter.into_inner();
        match ready {
            Ok(()) => {
                info!(%url, attempts, "gateway is ready");
                Ok(attempts)
            }
            Err(_) => Err(HarnessError::Timeout {
                operation: format!("readiness of {} ({} attempts)", url, attempts),
                after: self.deadline,
            }),
        }
    }
}
