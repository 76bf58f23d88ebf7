//! Append-only audit log

use gatewayqa_harness::clients::AuditClient;
use gatewayqa_harness::contract::validate_audit_page;
use gatewayqa_harness::generator::audit_log_data;
use gatewayqa_harness::{ensure, FixtureScope, HarnessResult, TestCase};
use serde_json::json;

pub fn tests() -> Vec<TestCase> {
    [
        TestCase::new("creates and fetches an audit entry", create_and_get),
        TestCase::new("audit entries cannot be modified", immutable_entries),
        TestCase::new("filters audit logs by action", filter_by_action),
        TestCase::new("audit entry without fields is rejected", missing_fields),
        TestCase::new("audit logs require authentication", requires_auth),
        TestCase::new("unknown audit entry is 404", unknown_entry),
    ]
    .into_iter()
    .map(|t| t.tag("@contract"))
    .collect()
}

async fn create_and_get(scope: FixtureScope) -> HarnessResult<()> {
    let ctx = scope.svc_request().await?;
    let audit = AuditClient::new(&ctx);
    let entry = audit_log_data(None);

    let created = audit.create(&entry).await?;
    created.expect_status(&[201])?;
    let id = created.id_field(&["id"])?;

    let fetched = audit.get(&id).await?;
    fetched.expect_status(&[200])?;
    let body = fetched.json_value()?;
    ensure!(body["action"] == entry.action.as_str(), "action {} != {}", body["action"], entry.action);
    ensure!(body["timestamp"].is_string(), "timestamp was not generated");
    Ok(())
}

async fn immutable_entries(scope: FixtureScope) -> HarnessResult<()> {
    let ctx = scope.svc_request().await?;
    let id = AuditClient::new(&ctx)
        .create(&audit_log_data(None))
        .await?
        .id_field(&["id"])?;

    let path = format!("/v1/audit/logs/{}", id);
    ctx.put(&path, &json!({ "action": "tampered" }))
        .await?
        .expect_status(&[405, 403, 404])?;
    ctx.delete(&path).await?.expect_status(&[405, 403, 404])?;
    Ok(())
}

async fn filter_by_action(scope: FixtureScope) -> HarnessResult<()> {
    let ctx = scope.svc_request().await?;
    let response = AuditClient::new(&ctx).list(&[("action", "login")]).await?;
    response.expect_status(&[200])?;

    let page = validate_audit_page(&response.json_value()?)?;
    ensure!(
        page.logs.iter().all(|log| log.action == "login"),
        "action filter returned other actions"
    );
    Ok(())
}

async fn missing_fields(scope: FixtureScope) -> HarnessResult<()> {
    let ctx = scope.svc_request().await?;
    ctx.post("/v1/audit/logs", &json!({ "details": {} }))
        .await?
        .expect_status(&[400])?;
    Ok(())
}

async fn requires_auth(scope: FixtureScope) -> HarnessResult<()> {
    let ctx = scope.request().await?;
    AuditClient::new(&ctx).list(&[]).await?.expect_status(&[401])?;
    Ok(())
}

async fn unknown_entry(scope: FixtureScope) -> HarnessResult<()> {
    let ctx = scope.svc_request().await?;
    AuditClient::new(&ctx)
        .get("non-existent-id")
        .await?
        .expect_status(&[404])?;
    Ok(())
}
