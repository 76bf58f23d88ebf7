//! Credential provisioning against the system under test
//!
//! Every call goes over the wire: nothing is cached between calls, so each
//! test ends up with its own user and its own tokens.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::{AdminCredentials, AuthRoutes};
use crate::context::RequestContext;
use crate::contract::TokenResponse;
use crate::error::{HarnessError, HarnessResult};
use crate::generator::{generate_identity, TestIdentity};

/// Login body: either `email` or `username`, plus `password`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub password: String,
}

impl LoginRequest {
    pub fn by_email(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            username: None,
            password: password.into(),
        }
    }

    pub fn by_username(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: None,
            username: Some(username.into()),
            password: password.into(),
        }
    }
}

impl From<&TestIdentity> for LoginRequest {
    fn from(identity: &TestIdentity) -> Self {
        Self::by_email(&identity.email, &identity.password)
    }
}

impl From<&AdminCredentials> for LoginRequest {
    fn from(admin: &AdminCredentials) -> Self {
        Self::by_email(&admin.email, &admin.password)
    }
}

/// A user the system under test accepted at registration
#[derive(Debug, Clone)]
pub struct ProvisionedUser {
    pub identity: TestIdentity,
    /// Opaque user id, when the registration response carried one
    pub id: Option<String>,
    pub body: Value,
}

/// Result of [`Provisioner::register_and_login`]
#[derive(Debug, Clone)]
pub struct ProvisionedSession {
    pub identity: TestIdentity,
    pub user: ProvisionedUser,
    pub token: String,
}

/// Registers and authenticates users through one test's own request context
pub struct Provisioner<'a> {
    ctx: &'a RequestContext,
    routes: &'a AuthRoutes,
}

impl<'a> Provisioner<'a> {
    pub fn new(ctx: &'a RequestContext, routes: &'a AuthRoutes) -> Self {
        Self { ctx, routes }
    }

    /// `POST <register>`; any non-2xx fails with [`HarnessError::Registration`]
    pub async fn register_user(&self, identity: &TestIdentity) -> HarnessResult<ProvisionedUser> {
        debug!(email = %identity.email, "registering test user");
        let response = self.ctx.post(&self.routes.register, identity).await?;

        if !response.ok() {
            return Err(HarnessError::Registration {
                status: response.status(),
                body: response.text(),
            });
        }

        let body = response.json_value().unwrap_or(Value::Null);
        let id = ["ID", "id"].iter().find_map(|f| match body.get(*f) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        });

        Ok(ProvisionedUser {
            identity: identity.clone(),
            id,
            body,
        })
    }

    /// `POST <login>`; any non-2xx fails with [`HarnessError::Authentication`]
    pub async fn login_user(&self, credentials: &LoginRequest) -> HarnessResult<String> {
        let response = self.ctx.post(&self.routes.login, credentials).await?;

        if !response.ok() {
            return Err(HarnessError::Authentication {
                status: response.status(),
                body: response.text(),
            });
        }

        let parsed: TokenResponse = response.json().map_err(|_| {
            HarnessError::Contract(format!("login response is not JSON: {}", response.text()))
        })?;
        match parsed.token {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(HarnessError::Contract(format!(
                "login response carries no token: {}",
                response.text()
            ))),
        }
    }

    /// Register `identity` (or a freshly generated one) and log it in
    pub async fn register_and_login(&self, identity: Option<TestIdentity>) -> HarnessResult<ProvisionedSession> {
        let identity = identity.unwrap_or_else(|| generate_identity("test"));
        let user = self.register_user(&identity).await?;
        let token = self.login_user(&LoginRequest::from(&identity)).await?;
        info!(email = %identity.email, "provisioned test user");
        Ok(ProvisionedSession {
            identity,
            user,
            token,
        })
    }

    /// Log in as the pre-seeded admin; no registration involved
    pub async fn admin_token(&self, admin: &AdminCredentials) -> HarnessResult<String> {
        debug!(email = %admin.email, "logging in as seeded admin");
        self.login_user(&LoginRequest::from(admin)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_request_serialization() {
        let by_email = serde_json::to_value(LoginRequest::by_email("a@example.com", "pw")).unwrap();
        assert_eq!(by_email, serde_json::json!({ "email": "a@example.com", "password": "pw" }));

        let by_username = serde_json::to_value(LoginRequest::by_username("alice", "pw")).unwrap();
        assert_eq!(by_username, serde_json::json!({ "username": "alice", "password": "pw" }));
    }

    #[test]
    fn test_admin_login_request() {
        let req = LoginRequest::from(&AdminCredentials::default());
        assert_eq!(req.email.as_deref(), Some("admin@example.com"));
        assert_eq!(req.password, "adminpass");
    }
}
