use gatewayqa_harness::config::{AdminCredentials, AuthRoutes};
use gatewayqa_harness::contract::validate_profile;
use gatewayqa_harness::generator::generate_identity;
use gatewayqa_harness::provisioner::{LoginRequest, Provisioner};
use gatewayqa_harness::{ContextFactory, Credential, CredentialKind, HarnessError, HeaderSet, Method};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn anonymous(server: &MockServer) -> gatewayqa_harness::RequestContext {
    ContextFactory::new(Duration::from_secs(5))
        .new_context(&server.uri(), HeaderSet::anonymous())
        .unwrap()
}

async fn mount_auth(server: &MockServer, token: &str) {
    Mock::given(method("POST"))
        .and(path("/register"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "ID": "u-1" })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": token })))
        .mount(server)
        .await;
}

/// A rejected registration surfaces the status and body the gateway returned
#[tokio::test]
async fn registration_error_carries_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/register"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "error": "email already exists" })))
        .mount(&server)
        .await;

    let ctx = anonymous(&server);
    let routes = AuthRoutes::gateway();
    let err = Provisioner::new(&ctx, &routes)
        .register_user(&generate_identity("auth"))
        .await
        .unwrap_err();

    match err {
        HarnessError::Registration { status, body } => {
            assert_eq!(status, 400);
            assert!(body.contains("email already exists"), "body: {}", body);
        }
        other => panic!("expected registration error, got {:?}", other),
    }
}

#[tokio::test]
async fn login_error_carries_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": "invalid credentials" })))
        .mount(&server)
        .await;

    let ctx = anonymous(&server);
    let routes = AuthRoutes::gateway();
    let err = Provisioner::new(&ctx, &routes)
        .login_user(&LoginRequest::by_email("nobody@example.com", "wrong"))
        .await
        .unwrap_err();

    assert!(matches!(err, HarnessError::Authentication { status: 401, ref body } if body.contains("invalid")));
}

#[tokio::test]
async fn login_without_token_is_a_contract_violation() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "ok" })))
        .mount(&server)
        .await;

    let ctx = anonymous(&server);
    let routes = AuthRoutes::gateway();
    let err = Provisioner::new(&ctx, &routes)
        .login_user(&LoginRequest::by_email("a@example.com", "pw"))
        .await
        .unwrap_err();
    assert!(matches!(err, HarnessError::Contract(_)));
}

/// register_and_login with no identity, then an authenticated profile call
#[tokio::test]
async fn register_and_login_then_profile() {
    let server = MockServer::start().await;
    mount_auth(&server, "tok-user").await;

    let ctx = anonymous(&server);
    let routes = AuthRoutes::gateway();
    let session = Provisioner::new(&ctx, &routes).register_and_login(None).await.unwrap();

    assert!(!session.token.is_empty());
    assert!(session.identity.email.starts_with("test-"));
    assert_eq!(session.user.id.as_deref(), Some("u-1"));

    Mock::given(method("GET"))
        .and(path("/user/profile"))
        .and(header("authorization", "Bearer tok-user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ID": "u-1",
            "Email": session.identity.email,
            "Username": session.identity.username,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let user_ctx = ContextFactory::new(Duration::from_secs(5))
        .new_context(
            &server.uri(),
            HeaderSet::for_credential(&Credential::user_jwt(session.token.clone())).unwrap(),
        )
        .unwrap();
    let response = user_ctx.get("/user/profile").await.unwrap();
    response.expect_status(&[200]).unwrap();

    let profile = validate_profile(&response.json_value().unwrap()).unwrap();
    assert_eq!(profile.email, session.identity.email);
    assert_eq!(profile.id, "u-1");
}

#[tokio::test]
async fn register_sends_generated_identity() {
    let server = MockServer::start().await;
    let identity = generate_identity("auth");
    Mock::given(method("POST"))
        .and(path("/users/register"))
        .and(body_partial_json(json!({
            "email": identity.email,
            "username": identity.username,
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 7 })))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = anonymous(&server);
    let routes = AuthRoutes::users_service();
    let user = Provisioner::new(&ctx, &routes).register_user(&identity).await.unwrap();
    assert_eq!(user.id.as_deref(), Some("7"));
}

/// The seeded admin logs in twice without error
#[tokio::test]
async fn admin_token_twice() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_partial_json(json!({ "email": "admin@example.com", "password": "adminpass" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "tok-admin" })))
        .expect(2)
        .mount(&server)
        .await;

    let ctx = anonymous(&server);
    let routes = AuthRoutes::gateway();
    let provisioner = Provisioner::new(&ctx, &routes);
    let admin = AdminCredentials::default();

    let first = provisioner.admin_token(&admin).await.unwrap();
    let second = provisioner.admin_token(&admin).await.unwrap();
    assert_eq!(first, "tok-admin");
    assert_eq!(second, "tok-admin");
}

#[tokio::test]
async fn slow_gateway_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "token": "late" }))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let ctx = ContextFactory::new(Duration::from_millis(100))
        .new_context(&server.uri(), HeaderSet::anonymous())
        .unwrap();
    let routes = AuthRoutes::gateway();
    let err = Provisioner::new(&ctx, &routes)
        .admin_token(&AdminCredentials::default())
        .await
        .unwrap_err();

    assert!(matches!(err, HarnessError::Timeout { .. }), "got {:?}", err);
}

/// Each context carries exactly its own credential header
#[tokio::test]
async fn contexts_never_mix_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/ai/models"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "models": [] })))
        .mount(&server)
        .await;

    let factory = ContextFactory::new(Duration::from_secs(5));
    let svc = factory
        .new_context(
            &server.uri(),
            HeaderSet::for_credential(&Credential::service_key("service-secret")).unwrap(),
        )
        .unwrap();
    let user = factory
        .new_context(
            &server.uri(),
            HeaderSet::for_credential(&Credential::user_jwt("tok-user")).unwrap(),
        )
        .unwrap();
    assert_eq!(svc.scope(), Some(CredentialKind::ServiceKey));
    assert_eq!(user.scope(), Some(CredentialKind::UserJwt));

    svc.get("/v1/ai/models").await.unwrap();
    user.get("/v1/ai/models").await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);

    let svc_req = &requests[0];
    assert_eq!(svc_req.headers.get("x-api-key").unwrap(), "service-secret");
    assert!(svc_req.headers.get("authorization").is_none());
    assert_eq!(svc_req.headers.get("content-type").unwrap(), "application/json");

    let user_req = &requests[1];
    assert_eq!(user_req.headers.get("authorization").unwrap(), "Bearer tok-user");
    assert!(user_req.headers.get("x-api-key").is_none());
}

/// Two concurrent provisionings with independent identities both succeed
#[tokio::test]
async fn parallel_provisioning_is_independent() {
    let server = MockServer::start().await;
    mount_auth(&server, "tok").await;

    let routes = AuthRoutes::gateway();
    let (a_ctx, b_ctx) = (anonymous(&server), anonymous(&server));
    let a = Provisioner::new(&a_ctx, &routes);
    let b = Provisioner::new(&b_ctx, &routes);

    let (a, b) = tokio::join!(a.register_and_login(None), b.register_and_login(None));
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_ne!(a.identity.email, b.identity.email);
    assert_ne!(a.identity.username, b.identity.username);
    assert_ne!(a_ctx.id(), b_ctx.id());
}

/// A bound context refuses a second credential; an anonymous one may carry any
#[tokio::test]
async fn bound_context_rejects_foreign_credentials() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/user/profile"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": "invalid token" })))
        .mount(&server)
        .await;

    let factory = ContextFactory::new(Duration::from_secs(5));
    let svc = factory
        .new_context(
            &server.uri(),
            HeaderSet::for_credential(&Credential::service_key("service-secret")).unwrap(),
        )
        .unwrap();

    let foreign = svc
        .request(Method::GET, "/user/profile")
        .unwrap()
        .header("authorization", "Bearer someone-else");
    assert!(matches!(svc.send(foreign).await, Err(HarnessError::Config(_))));

    let other_key = svc
        .request(Method::GET, "/user/profile")
        .unwrap()
        .header("x-api-key", "another-secret");
    assert!(matches!(svc.send(other_key).await, Err(HarnessError::Config(_))));
    assert!(server.received_requests().await.unwrap().is_empty());

    // repeating the bound value is not a second credential
    let same = svc
        .request(Method::GET, "/user/profile")
        .unwrap()
        .header("x-api-key", "service-secret");
    svc.send(same).await.unwrap().expect_status(&[401]).unwrap();

    let anon = anonymous(&server);
    let invalid_jwt = anon
        .request(Method::GET, "/user/profile")
        .unwrap()
        .header("authorization", "Bearer not-a-jwt");
    anon.send(invalid_jwt).await.unwrap().expect_status(&[401]).unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].headers.get("authorization").unwrap(), "Bearer not-a-jwt");
}
