//! Read-mostly analytics endpoints

use gatewayqa_harness::clients::AnalyticsClient;
use gatewayqa_harness::{ensure, FixtureScope, HarnessResult, TestCase};
use serde_json::json;

use super::exercise_gate;

pub fn tests() -> Vec<TestCase> {
    vec![
        TestCase::new("usage metrics for a time range", usage_in_range).tag("@contract"),
        TestCase::new("analytics requires an api key", analytics_requires_key).tag("@security"),
        TestCase::new("tracked event is accepted", track_event).tag("@exercise"),
    ]
}

async fn usage_in_range(scope: FixtureScope) -> HarnessResult<()> {
    let ctx = scope.svc_request().await?;
    let analytics = AnalyticsClient::new(&ctx);
    let range = [("start", "2024-01-01T00:00:00Z"), ("end", "2024-12-31T23:59:59Z")];

    let usage = analytics.usage(&range).await?;
    usage.expect_ok()?;
    ensure!(usage.json_value()?.is_object(), "usage body is not an object");

    analytics.performance(&range).await?.expect_status(&[200, 404])?;
    analytics.errors(&range).await?.expect_status(&[200, 404])?;
    Ok(())
}

async fn analytics_requires_key(scope: FixtureScope) -> HarnessResult<()> {
    let ctx = scope.request().await?;
    AnalyticsClient::new(&ctx).usage(&[]).await?.expect_status(&[401])?;
    Ok(())
}

async fn track_event(scope: FixtureScope) -> HarnessResult<()> {
    exercise_gate()?;
    let ctx = scope.svc_request().await?;
    let response = AnalyticsClient::new(&ctx)
        .track_event("harness_run", json!({ "source": "gatewayqa" }))
        .await?;
    response.expect_status(&[200, 201, 202])?;
    Ok(())
}
