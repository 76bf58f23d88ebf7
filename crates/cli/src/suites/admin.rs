//! System status and maintenance mode

use gatewayqa_harness::clients::AdminClient;
use gatewayqa_harness::contract::validate_error;
use gatewayqa_harness::{ensure, FixtureScope, HarnessError, HarnessResult, TestCase};
use tracing::warn;

use super::exercise_gate;

pub fn tests() -> Vec<TestCase> {
    vec![
        TestCase::new("system status with service key", status_with_service_key).tag("@smoke"),
        TestCase::new("system status requires an api key", status_requires_key).tag("@security"),
        TestCase::new("maintenance toggle shows in status", maintenance_toggle).tag("@exercise"),
    ]
}

async fn status_with_service_key(scope: FixtureScope) -> HarnessResult<()> {
    let ctx = scope.svc_request().await?;
    let response = AdminClient::new(&ctx).status().await?;
    response.expect_ok()?;
    ensure!(response.json_value()?.get("status").is_some(), "status body has no status");
    Ok(())
}

async fn status_requires_key(scope: FixtureScope) -> HarnessResult<()> {
    let ctx = scope.request().await?;
    let response = AdminClient::new(&ctx).status().await?;
    response.expect_status(&[401])?;
    validate_error(&response.json_value()?)?;
    Ok(())
}

async fn maintenance_toggle(scope: FixtureScope) -> HarnessResult<()> {
    exercise_gate()?;
    let ctx = scope.svc_request().await?;
    let admin = AdminClient::new(&ctx);

    admin.set_maintenance(true).await?.expect_ok()?;
    let observed = async {
        let status = admin.status().await?;
        status.expect_ok()?;
        let body = status.json_value()?;
        ensure!(
            body["maintenance"]["enabled"] == true,
            "maintenance not reported as enabled: {}",
            body
        );
        Ok::<_, HarnessError>(())
    }
    .await;

    // switch it back off even when the check failed
    let restored = restore_maintenance(&admin).await;
    settle(observed, restored)
}

/// A failed check outranks a failed reset; a failed reset still fails a passing check
fn settle(observed: HarnessResult<()>, restored: HarnessResult<()>) -> HarnessResult<()> {
    if let Err(e) = restored {
        warn!(error = %e, "could not switch maintenance mode back off");
        observed?;
        return Err(e);
    }
    observed
}

async fn restore_maintenance(admin: &AdminClient<'_>) -> HarnessResult<()> {
    admin.set_maintenance(false).await?.expect_ok()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_check_survives_failed_reset() {
        let observed = Err(HarnessError::Assertion("maintenance not reported as enabled".into()));
        let restored = Err(HarnessError::Assertion("unexpected status 500".into()));
        match settle(observed, restored) {
            Err(HarnessError::Assertion(msg)) => assert!(msg.contains("not reported")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_failed_reset_fails_passing_check() {
        let restored = Err(HarnessError::Assertion("unexpected status 500".into()));
        match settle(Ok(()), restored) {
            Err(HarnessError::Assertion(msg)) => assert!(msg.contains("500")),
            other => panic!("unexpected: {:?}", other),
        }
        assert!(settle(Ok(()), Ok(())).is_ok());
    }
}
