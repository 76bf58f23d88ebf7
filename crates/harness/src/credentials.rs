//! Credentials and the header sets bound to them

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{HarnessError, HarnessResult};

pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CredentialKind {
    ServiceKey,
    UserJwt,
    AdminJwt,
}

/// A secret that authorizes requests against the system under test.
///
/// Service keys come from configuration. JWTs are obtained by logging in and
/// are never refreshed: a rejected token fails the test that holds it.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub kind: CredentialKind,
    pub value: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    pub fn service_key(value: impl Into<String>) -> Self {
        Self {
            kind: CredentialKind::ServiceKey,
            value: value.into(),
            expires_at: None,
        }
    }

    pub fn user_jwt(token: impl Into<String>) -> Self {
        Self::jwt(CredentialKind::UserJwt, token.into())
    }

    pub fn admin_jwt(token: impl Into<String>) -> Self {
        Self::jwt(CredentialKind::AdminJwt, token.into())
    }

    fn jwt(kind: CredentialKind, token: String) -> Self {
        let expires_at = jwt_expiry(&token);
        Self {
            kind,
            value: token,
            expires_at,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.map(|at| at <= Utc::now()).unwrap_or(false)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("kind", &self.kind)
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Read the `exp` claim of a JWT without verifying it. Opaque tokens yield `None`.
pub fn jwt_expiry(token: &str) -> Option<DateTime<Utc>> {
    #[derive(Deserialize)]
    struct Claims {
        exp: Option<i64>,
    }

    let mut parts = token.split('.');
    let (_, payload, _) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;
    Utc.timestamp_opt(claims.exp?, 0).single()
}

/// Immutable request headers for one credential scope.
///
/// Always carries `content-type: application/json` plus at most one of
/// `x-api-key` or `Authorization: Bearer`. The only constructors take a
/// single credential, so a set can never hold both.
#[derive(Clone)]
pub struct HeaderSet {
    headers: HeaderMap,
    kind: Option<CredentialKind>,
}

impl HeaderSet {
    /// Headers for unauthenticated access
    pub fn anonymous() -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Self {
            headers,
            kind: None,
        }
    }

    /// Headers carrying exactly `credential`
    pub fn for_credential(credential: &Credential) -> HarnessResult<Self> {
        let mut set = Self::anonymous();
        match credential.kind {
            CredentialKind::ServiceKey => {
                set.headers.insert(API_KEY_HEADER, header_value(&credential.value)?);
            }
            CredentialKind::UserJwt | CredentialKind::AdminJwt => {
                let mut value = header_value(&format!("Bearer {}", credential.value))?;
                value.set_sensitive(true);
                set.headers.insert(AUTHORIZATION, value);
            }
        }
        set.kind = Some(credential.kind);
        Ok(set)
    }

    pub fn kind(&self) -> Option<CredentialKind> {
        self.kind
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.headers.contains_key(name)
    }

    pub fn header_map(&self) -> &HeaderMap {
        &self.headers
    }
}

impl fmt::Debug for HeaderSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.headers.keys().map(|k| k.as_str()).collect();
        f.debug_struct("HeaderSet")
            .field("kind", &self.kind)
            .field("headers", &names)
            .finish()
    }
}

fn header_value(raw: &str) -> HarnessResult<HeaderValue> {
    HeaderValue::from_str(raw)
        .map_err(|e| HarnessError::Config(format!("credential is not a valid header value: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt_with(payload: serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{}.{}.signature", header, body)
    }

    #[test]
    fn test_service_headers_never_carry_authorization() {
        let set = HeaderSet::for_credential(&Credential::service_key("service-secret")).unwrap();
        assert_eq!(set.get("x-api-key"), Some("service-secret"));
        assert!(!set.contains("authorization"));
        assert_eq!(set.get("content-type"), Some("application/json"));
        assert_eq!(set.kind(), Some(CredentialKind::ServiceKey));
    }

    #[test]
    fn test_user_headers_never_carry_api_key() {
        let set = HeaderSet::for_credential(&Credential::user_jwt("abc")).unwrap();
        assert_eq!(set.get("authorization"), Some("Bearer abc"));
        assert!(!set.contains("x-api-key"));
    }

    #[test]
    fn test_anonymous_headers() {
        let set = HeaderSet::anonymous();
        assert_eq!(set.header_map().len(), 1);
        assert_eq!(set.kind(), None);
    }

    #[test]
    fn test_invalid_token_is_rejected() {
        let err = HeaderSet::for_credential(&Credential::user_jwt("bad\ntoken")).unwrap_err();
        assert!(matches!(err, HarnessError::Config(_)));
    }

    #[test]
    fn test_jwt_expiry_decoded() {
        let token = jwt_with(serde_json::json!({ "sub": "1", "exp": 4_102_444_800i64 }));
        let credential = Credential::admin_jwt(token);
        assert_eq!(
            credential.expires_at.map(|t| t.timestamp()),
            Some(4_102_444_800)
        );
        assert!(!credential.is_expired());
    }

    #[test]
    fn test_expired_jwt() {
        let token = jwt_with(serde_json::json!({ "exp": 1 }));
        assert!(Credential::user_jwt(token).is_expired());
    }

    #[test]
    fn test_opaque_token_has_no_expiry() {
        assert_eq!(jwt_expiry("not-a-jwt"), None);
        assert_eq!(jwt_expiry("a.b.c.d"), None);
        assert_eq!(jwt_expiry(&jwt_with(serde_json::json!({ "sub": "x" }))), None);
    }

    #[test]
    fn test_debug_redacts_secret() {
        let rendered = format!("{:?}", Credential::service_key("service-secret"));
        assert!(!rendered.contains("service-secret"));
    }
}
