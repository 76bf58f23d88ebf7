//! Standard API fixtures
//!
//! ```text
//! authRoutes
//! apiBase ─┬─► request ─┬─► adminToken ─► adminHeaders ─► adminRequest
//!          │            └─► userToken ◄── user
//!          │                   └─► userHeaders ─► userRequest
//!          └─► serviceHeaders ─► svcRequest
//! ```

use std::sync::Arc;

use super::{FixtureKey, FixtureRegistry, FixtureScope};
use crate::config::{AuthRoutes, HarnessConfig};
use crate::context::{ContextFactory, RequestContext};
use crate::credentials::{Credential, HeaderSet};
use crate::error::{HarnessError, HarnessResult};
use crate::generator::{generate_identity, TestIdentity};
use crate::provisioner::{LoginRequest, ProvisionedUser, Provisioner};

pub mod keys {
    use super::*;

    pub const API_BASE: FixtureKey<String> = FixtureKey::new("apiBase");
    /// Registration and login paths the provisioning fixtures use
    pub const AUTH_ROUTES: FixtureKey<AuthRoutes> = FixtureKey::new("authRoutes");
    /// Anonymous context used for registration and login
    pub const REQUEST: FixtureKey<RequestContext> = FixtureKey::new("request");
    pub const ADMIN_TOKEN: FixtureKey<Credential> = FixtureKey::new("adminToken");
    pub const USER: FixtureKey<TestIdentity> = FixtureKey::new("user");
    pub const PROVISIONED_USER: FixtureKey<ProvisionedUser> = FixtureKey::new("provisionedUser");
    pub const USER_TOKEN: FixtureKey<Credential> = FixtureKey::new("userToken");
    pub const SERVICE_HEADERS: FixtureKey<HeaderSet> = FixtureKey::new("serviceHeaders");
    pub const USER_HEADERS: FixtureKey<HeaderSet> = FixtureKey::new("userHeaders");
    pub const ADMIN_HEADERS: FixtureKey<HeaderSet> = FixtureKey::new("adminHeaders");
    pub const SVC_REQUEST: FixtureKey<RequestContext> = FixtureKey::new("svcRequest");
    pub const USER_REQUEST: FixtureKey<RequestContext> = FixtureKey::new("userRequest");
    pub const ADMIN_REQUEST: FixtureKey<RequestContext> = FixtureKey::new("adminRequest");
}

use keys::*;

async fn dispose_context(ctx: Arc<RequestContext>) -> HarnessResult<()> {
    ctx.dispose()
}

/// Build the standard fixture graph for one run.
///
/// `config` is captured read-only; every value a fixture produces belongs to
/// the scope that resolved it.
pub fn api_fixtures(config: HarnessConfig) -> HarnessResult<FixtureRegistry> {
    let config = Arc::new(config);
    let factory = Arc::new(ContextFactory::new(config.request_timeout));
    let mut registry = FixtureRegistry::new();

    let cfg = config.clone();
    registry.provide(API_BASE, &[], move |_| {
        let base = cfg.api_base().to_string();
        async move { Ok(base) }
    })?;

    let cfg = config.clone();
    registry.provide(AUTH_ROUTES, &[], move |_| {
        let routes = cfg.auth_routes.clone();
        async move { Ok(routes) }
    })?;

    let f = factory.clone();
    registry.provide_with_teardown(
        REQUEST,
        &["apiBase"],
        move |scope| {
            let f = f.clone();
            async move {
                let base = scope.get(&API_BASE).await?;
                f.new_context(&base, HeaderSet::anonymous())
            }
        },
        dispose_context,
    )?;

    let cfg = config.clone();
    registry.provide(ADMIN_TOKEN, &["request"], move |scope| {
        let cfg = cfg.clone();
        async move {
            let request = scope.get(&REQUEST).await?;
            let token = Provisioner::new(&request, &cfg.auth_routes)
                .admin_token(&cfg.admin)
                .await?;
            Ok::<_, HarnessError>(Credential::admin_jwt(token))
        }
    })?;

    registry.provide(USER, &[], |scope| {
        let prefix = scope_prefix(&scope);
        async move { Ok(generate_identity(&prefix)) }
    })?;

    let cfg = config.clone();
    registry.provide(PROVISIONED_USER, &["request", "user"], move |scope| {
        let cfg = cfg.clone();
        async move {
            let request = scope.get(&REQUEST).await?;
            let user = scope.get(&USER).await?;
            Provisioner::new(&request, &cfg.auth_routes)
                .register_user(&user)
                .await
        }
    })?;

    let cfg = config.clone();
    registry.provide(USER_TOKEN, &["request", "user", "provisionedUser"], move |scope| {
        let cfg = cfg.clone();
        async move {
            let request = scope.get(&REQUEST).await?;
            let user = scope.get(&USER).await?;
            scope.get(&PROVISIONED_USER).await?;
            let token = Provisioner::new(&request, &cfg.auth_routes)
                .login_user(&LoginRequest::from(&*user))
                .await?;
            Ok::<_, HarnessError>(Credential::user_jwt(token))
        }
    })?;

    let cfg = config.clone();
    registry.provide(SERVICE_HEADERS, &[], move |_| {
        let credential = Credential::service_key(cfg.service_api_key.clone());
        async move { HeaderSet::for_credential(&credential) }
    })?;

    registry.provide(USER_HEADERS, &["userToken"], |scope| async move {
        let token = scope.get(&USER_TOKEN).await?;
        HeaderSet::for_credential(&token)
    })?;

    registry.provide(ADMIN_HEADERS, &["adminToken"], |scope| async move {
        let token = scope.get(&ADMIN_TOKEN).await?;
        HeaderSet::for_credential(&token)
    })?;

    for (key, header_key) in [
        (SVC_REQUEST, SERVICE_HEADERS),
        (USER_REQUEST, USER_HEADERS),
        (ADMIN_REQUEST, ADMIN_HEADERS),
    ] {
        let f = factory.clone();
        registry.provide_with_teardown(
            key,
            &["apiBase", header_key.name()],
            move |scope| {
                let f = f.clone();
                async move {
                    let base = scope.get(&API_BASE).await?;
                    let headers = scope.get(&header_key).await?;
                    f.new_context(&base, headers.as_ref().clone())
                }
            },
            dispose_context,
        )?;
    }

    Ok(registry)
}

/// Identity prefix derived from the test name, limited to `[a-z0-9]`
fn scope_prefix(scope: &FixtureScope) -> String {
    let prefix: String = scope
        .test_name()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .take(12)
        .collect();
    if prefix.is_empty() {
        "test".to_string()
    } else {
        prefix
    }
}

impl FixtureScope {
    pub async fn api_base(&self) -> HarnessResult<Arc<String>> {
        self.get(&API_BASE).await
    }

    pub async fn auth_routes(&self) -> HarnessResult<Arc<AuthRoutes>> {
        self.get(&AUTH_ROUTES).await
    }

    pub async fn request(&self) -> HarnessResult<Arc<RequestContext>> {
        self.get(&REQUEST).await
    }

    pub async fn admin_token(&self) -> HarnessResult<Arc<Credential>> {
        self.get(&ADMIN_TOKEN).await
    }

    pub async fn user(&self) -> HarnessResult<Arc<TestIdentity>> {
        self.get(&USER).await
    }

    pub async fn provisioned_user(&self) -> HarnessResult<Arc<ProvisionedUser>> {
        self.get(&PROVISIONED_USER).await
    }

    pub async fn user_token(&self) -> HarnessResult<Arc<Credential>> {
        self.get(&USER_TOKEN).await
    }

    pub async fn service_headers(&self) -> HarnessResult<Arc<HeaderSet>> {
        self.get(&SERVICE_HEADERS).await
    }

    pub async fn user_headers(&self) -> HarnessResult<Arc<HeaderSet>> {
        self.get(&USER_HEADERS).await
    }

    pub async fn admin_headers(&self) -> HarnessResult<Arc<HeaderSet>> {
        self.get(&ADMIN_HEADERS).await
    }

    pub async fn svc_request(&self) -> HarnessResult<Arc<RequestContext>> {
        self.get(&SVC_REQUEST).await
    }

    pub async fn user_request(&self) -> HarnessResult<Arc<RequestContext>> {
        self.get(&USER_REQUEST).await
    }

    pub async fn admin_request(&self) -> HarnessResult<Arc<RequestContext>> {
        self.get(&ADMIN_REQUEST).await
    }
}
