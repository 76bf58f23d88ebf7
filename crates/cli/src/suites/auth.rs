//! Registration, login and protected endpoint access

use gatewayqa_harness::clients::UsersClient;
use gatewayqa_harness::contract::{validate_error, validate_profile};
use gatewayqa_harness::generator::{generate_identity, unique_username};
use gatewayqa_harness::provisioner::LoginRequest;
use gatewayqa_harness::{ensure, CredentialKind, FixtureScope, HarnessResult, Method, TestCase};
use serde_json::json;

use super::auth_routes;

pub fn tests() -> Vec<TestCase> {
    [
        TestCase::new("registers a new user", register_valid_user),
        TestCase::new("registration without email is handled", register_without_email),
        TestCase::new("duplicate username is rejected", duplicate_username),
        TestCase::new("logs in with valid credentials", login_valid),
        TestCase::new("rejects an invalid password", login_wrong_password),
        TestCase::new("rejects a malformed login body", login_malformed),
        TestCase::new("profile with a user JWT", profile_with_jwt),
        TestCase::new("models with the service key", models_with_service_key),
        TestCase::new("profile without credentials is 401", profile_without_auth),
        TestCase::new("profile with an invalid JWT is 401", profile_with_invalid_jwt),
        TestCase::new("admin reaches system status", admin_status_access),
        TestCase::new("non-admin is kept out of system status", user_denied_admin_status),
    ]
    .into_iter()
    .map(|t| t.tag("@security").tag("@smoke"))
    .collect()
}

async fn register_valid_user(scope: FixtureScope) -> HarnessResult<()> {
    let ctx = scope.request().await?;
    let identity = generate_identity("auth");

    let response = UsersClient::with_routes(&ctx, auth_routes(&scope).await?)
        .register(&identity)
        .await?;
    response.expect_status(&[200, 201])?;

    let body = response.json_value()?;
    if let Some(email) = body.get("Email").and_then(|v| v.as_str()) {
        ensure!(email == identity.email, "registered email {} != {}", email, identity.email);
    }
    ensure!(body.get("password").is_none(), "registration echoes the password");
    Ok(())
}

async fn register_without_email(scope: FixtureScope) -> HarnessResult<()> {
    let ctx = scope.request().await?;
    let body = json!({ "username": unique_username("noemail"), "password": "SecurePass123!" });
    let routes = auth_routes(&scope).await?;
    ctx.post(&routes.register, &body).await?.expect_status(&[200, 201, 400])?;
    Ok(())
}

async fn duplicate_username(scope: FixtureScope) -> HarnessResult<()> {
    let ctx = scope.request().await?;
    let first = scope.provisioned_user().await?;

    let mut again = generate_identity("dup");
    again.username = first.identity.username.clone();
    UsersClient::with_routes(&ctx, auth_routes(&scope).await?)
        .register(&again)
        .await?
        .expect_status(&[400, 409])?;
    Ok(())
}

async fn login_valid(scope: FixtureScope) -> HarnessResult<()> {
    let token = scope.user_token().await?;
    ensure!(token.kind == CredentialKind::UserJwt, "unexpected credential kind {:?}", token.kind);
    ensure!(!token.value.is_empty(), "login returned an empty token");
    Ok(())
}

async fn login_wrong_password(scope: FixtureScope) -> HarnessResult<()> {
    let ctx = scope.request().await?;
    let user = scope.provisioned_user().await?;

    let response = UsersClient::with_routes(&ctx, auth_routes(&scope).await?)
        .login(&LoginRequest::by_email(user.identity.email.clone(), "wrong-password"))
        .await?;
    response.expect_status(&[401])?;
    validate_error(&response.json_value()?)?;
    Ok(())
}

async fn login_malformed(scope: FixtureScope) -> HarnessResult<()> {
    let ctx = scope.request().await?;
    let routes = auth_routes(&scope).await?;
    ctx.post(&routes.login, &json!({ "invalid": "data" }))
        .await?
        .expect_status(&[400, 401])?;
    Ok(())
}

async fn profile_with_jwt(scope: FixtureScope) -> HarnessResult<()> {
    let ctx = scope.user_request().await?;
    let user = scope.user().await?;

    let response = UsersClient::new(&ctx).profile().await?;
    response.expect_status(&[200, 401])?;
    if response.ok() {
        let profile = validate_profile(&response.json_value()?)?;
        ensure!(profile.email == user.email, "profile email {} != {}", profile.email, user.email);
    }
    Ok(())
}

async fn models_with_service_key(scope: FixtureScope) -> HarnessResult<()> {
    let ctx = scope.svc_request().await?;
    let response = ctx.get("/v1/ai/models").await?;
    response.expect_status(&[200])?;
    let body = response.json_value()?;
    ensure!(body["models"].is_array(), "models is not a list: {}", body);
    Ok(())
}

async fn profile_without_auth(scope: FixtureScope) -> HarnessResult<()> {
    let ctx = scope.request().await?;
    UsersClient::new(&ctx).profile().await?.expect_status(&[401])?;
    Ok(())
}

async fn profile_with_invalid_jwt(scope: FixtureScope) -> HarnessResult<()> {
    let ctx = scope.request().await?;
    let request = ctx
        .request(Method::GET, "/user/profile")?
        .header("authorization", "Bearer invalid-token");
    let response = ctx.send(request).await?;
    response.expect_status(&[401])?;

    let error = validate_error(&response.json_value()?)?;
    ensure!(error.error.contains("token"), "error does not mention the token: {}", error.error);
    Ok(())
}

async fn admin_status_access(scope: FixtureScope) -> HarnessResult<()> {
    let ctx = scope.admin_request().await?;
    ctx.get("/v1/admin/system/status")
        .await?
        .expect_status(&[200, 403, 401])?;
    Ok(())
}

async fn user_denied_admin_status(scope: FixtureScope) -> HarnessResult<()> {
    let ctx = scope.user_request().await?;
    ctx.get("/v1/admin/system/status")
        .await?
        .expect_status(&[401, 403])?;
    Ok(())
}
