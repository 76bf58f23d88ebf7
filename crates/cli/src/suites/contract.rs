//! Response shape checks

use gatewayqa_harness::clients::{AuditClient, UsersClient};
use gatewayqa_harness::contract::{validate_audit_page, validate_error, validate_profile};
use gatewayqa_harness::provisioner::LoginRequest;
use gatewayqa_harness::{ensure, FixtureScope, HarnessResult, TestCase};

use super::auth_routes;

pub fn tests() -> Vec<TestCase> {
    vec![
        TestCase::new("profile matches contract", profile_matches_contract).tag("@contract"),
        TestCase::new("login errors carry an error field", login_error_shape).tag("@contract"),
        TestCase::new("audit log page shape", audit_page_shape).tag("@contract"),
    ]
}

async fn profile_matches_contract(scope: FixtureScope) -> HarnessResult<()> {
    let ctx = scope.user_request().await?;
    let user = scope.user().await?;

    let response = UsersClient::new(&ctx).profile().await?;
    response.expect_status(&[200])?;
    let profile = validate_profile(&response.json_value()?)?;

    ensure!(profile.email == user.email, "Email {} != {}", profile.email, user.email);
    ensure!(
        profile.username == user.username,
        "Username {} != {}",
        profile.username,
        user.username
    );
    Ok(())
}

async fn login_error_shape(scope: FixtureScope) -> HarnessResult<()> {
    let ctx = scope.request().await?;
    let response = UsersClient::with_routes(&ctx, auth_routes(&scope).await?)
        .login(&LoginRequest::by_email("nonexistent@example.com", "password123"))
        .await?;
    response.expect_status(&[401])?;
    validate_error(&response.json_value()?)?;
    Ok(())
}

async fn audit_page_shape(scope: FixtureScope) -> HarnessResult<()> {
    let ctx = scope.svc_request().await?;
    let response = AuditClient::new(&ctx).list(&[("page", "1"), ("limit", "10")]).await?;
    response.expect_status(&[200])?;

    let page = validate_audit_page(&response.json_value()?)?;
    ensure!(page.page == 1, "page {} != 1", page.page);
    ensure!(page.logs.len() as u64 <= page.limit, "{} logs exceed limit {}", page.logs.len(), page.limit);
    Ok(())
}
