//! Disposable HTTP request contexts bound to one credential scope

use parking_lot::Mutex;
use reqwest::header::{HeaderMap, AUTHORIZATION};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

use crate::credentials::{CredentialKind, HeaderSet, API_KEY_HEADER};
use crate::error::{HarnessError, HarnessResult};

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Builds request contexts with a shared timeout policy
#[derive(Debug, Clone)]
pub struct ContextFactory {
    timeout: Duration,
    user_agent: String,
}

impl ContextFactory {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            user_agent: format!("gatewayqa/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Create a context whose every request carries `headers`.
    ///
    /// Each context owns its own connection pool, released by [`RequestContext::dispose`].
    pub fn new_context(&self, base_url: &str, headers: HeaderSet) -> HarnessResult<RequestContext> {
        let client = reqwest::Client::builder()
            .default_headers(headers.header_map().clone())
            .timeout(self.timeout)
            .user_agent(self.user_agent.clone())
            .build()?;

        let id = NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed);
        debug!(context = id, scope = ?headers.kind(), "opened request context");

        Ok(RequestContext {
            id,
            base_url: base_url.trim_end_matches('/').to_string(),
            headers,
            timeout: self.timeout,
            client: Mutex::new(Some(client)),
        })
    }
}

/// HTTP client pre-bound to one base URL and one immutable [`HeaderSet`]
pub struct RequestContext {
    id: u64,
    base_url: String,
    headers: HeaderSet,
    timeout: Duration,
    client: Mutex<Option<reqwest::Client>>,
}

impl RequestContext {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn headers(&self) -> &HeaderSet {
        &self.headers
    }

    pub fn scope(&self) -> Option<CredentialKind> {
        self.headers.kind()
    }

    pub fn is_disposed(&self) -> bool {
        self.client.lock().is_none()
    }

    /// Absolute URLs pass through; anything else is joined onto the base URL
    pub fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Start a request with the bound headers already applied
    pub fn request(&self, method: Method, path: &str) -> HarnessResult<RequestBuilder> {
        let client = self.client.lock().clone().ok_or(HarnessError::ContextDisposed)?;
        Ok(client.request(method, self.url(path)))
    }

    /// Send a request built from this context.
    ///
    /// Per-request credential headers are only accepted on anonymous contexts;
    /// a bound context rejects any that differ from its own.
    pub async fn send(&self, builder: RequestBuilder) -> HarnessResult<ApiResponse> {
        let request = builder.build()?;
        self.check_credentials(request.headers())?;
        let method = request.method().clone();
        let url = request.url().to_string();
        let client = self.client.lock().clone().ok_or(HarnessError::ContextDisposed)?;

        debug!(context = self.id, %method, %url, "sending request");
        let response = client
            .execute(request)
            .await
            .map_err(|e| HarnessError::from_transport(e, format!("{} {}", method, url), self.timeout))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| HarnessError::from_transport(e, format!("{} {}", method, url), self.timeout))?;
        debug!(context = self.id, %method, %url, %status, "received response");

        Ok(ApiResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }

    fn check_credentials(&self, outgoing: &HeaderMap) -> HarnessResult<()> {
        let Some(kind) = self.scope() else {
            return Ok(());
        };
        for name in [AUTHORIZATION.as_str(), API_KEY_HEADER] {
            if let Some(value) = outgoing.get(name) {
                if self.headers.header_map().get(name) != Some(value) {
                    return Err(HarnessError::Config(format!(
                        "context {} is bound to {:?} and cannot send a different '{}' header",
                        self.id, kind, name
                    )));
                }
            }
        }
        Ok(())
    }

    pub async fn get(&self, path: &str) -> HarnessResult<ApiResponse> {
        self.send(self.request(Method::GET, path)?).await
    }

    pub async fn delete(&self, path: &str) -> HarnessResult<ApiResponse> {
        self.send(self.request(Method::DELETE, path)?).await
    }

    pub async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> HarnessResult<ApiResponse> {
        self.send(self.request(Method::POST, path)?.json(body)).await
    }

    pub async fn put<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> HarnessResult<ApiResponse> {
        self.send(self.request(Method::PUT, path)?.json(body)).await
    }

    pub async fn patch<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> HarnessResult<ApiResponse> {
        self.send(self.request(Method::PATCH, path)?.json(body)).await
    }

    /// Release the connection pool. A second call reports [`HarnessError::Disposal`].
    pub fn dispose(&self) -> HarnessResult<()> {
        match self.client.lock().take() {
            Some(client) => {
                drop(client);
                debug!(context = self.id, "disposed request context");
                Ok(())
            }
            None => Err(HarnessError::Disposal(format!(
                "context {} was already disposed",
                self.id
            ))),
        }
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("id", &self.id)
            .field("base_url", &self.base_url)
            .field("headers", &self.headers)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// A fully-read response from the system under test
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl ApiResponse {
    pub fn status(&self) -> u16 {
        self.status.as_u16()
    }

    pub fn ok(&self) -> bool {
        self.status.is_success()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.body
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> HarnessResult<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn json_value(&self) -> HarnessResult<serde_json::Value> {
        self.json()
    }

    /// Accept any of `expected`; several endpoints legitimately answer with alternatives
    pub fn expect_status(&self, expected: &[u16]) -> HarnessResult<&Self> {
        if expected.contains(&self.status()) {
            Ok(self)
        } else {
            Err(HarnessError::UnexpectedStatus {
                expected: expected.to_vec(),
                actual: self.status(),
                body: self.text(),
            })
        }
    }

    /// Require a 2xx response
    pub fn expect_ok(&self) -> HarnessResult<&Self> {
        if self.ok() {
            Ok(self)
        } else {
            Err(HarnessError::UnexpectedStatus {
                expected: vec![200, 201, 202, 204],
                actual: self.status(),
                body: self.text(),
            })
        }
    }

    /// First non-empty string (or number) among `fields`, e.g. `["id", "workflowId"]`
    pub fn id_field(&self, fields: &[&str]) -> HarnessResult<String> {
        let body = self.json_value()?;
        fields
            .iter()
            .find_map(|f| match body.get(*f) {
                Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s.clone()),
                Some(serde_json::Value::Number(n)) => Some(n.to_string()),
                _ => None,
            })
            .ok_or_else(|| {
                HarnessError::Contract(format!("response carries none of {:?}: {}", fields, body))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::Credential;

    fn response(status: u16, body: &str) -> ApiResponse {
        ApiResponse {
            status: StatusCode::from_u16(status).unwrap(),
            headers: HeaderMap::new(),
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_url_joining() {
        let ctx = ContextFactory::new(Duration::from_secs(1))
            .new_context("http://localhost:8080/", HeaderSet::anonymous())
            .unwrap();
        assert_eq!(ctx.url("/v1/ai/models"), "http://localhost:8080/v1/ai/models");
        assert_eq!(ctx.url("healthz"), "http://localhost:8080/healthz");
        assert_eq!(ctx.url("http://other:1/x"), "http://other:1/x");
    }

    #[test]
    fn test_dispose_twice_reports_error() {
        let ctx = ContextFactory::new(Duration::from_secs(1))
            .new_context("http://localhost:8080", HeaderSet::anonymous())
            .unwrap();
        ctx.dispose().unwrap();
        assert!(ctx.is_disposed());
        assert!(matches!(ctx.dispose(), Err(HarnessError::Disposal(_))));
        assert!(matches!(
            ctx.request(Method::GET, "/"),
            Err(HarnessError::ContextDisposed)
        ));
    }

    #[test]
    fn test_contexts_get_distinct_ids() {
        let factory = ContextFactory::new(Duration::from_secs(1));
        let headers = HeaderSet::for_credential(&Credential::service_key("k")).unwrap();
        let a = factory.new_context("http://a", headers.clone()).unwrap();
        let b = factory.new_context("http://a", headers).unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.scope(), Some(CredentialKind::ServiceKey));
    }

    #[test]
    fn test_expect_status_accepts_alternatives() {
        let resp = response(400, r#"{"error":"bad"}"#);
        assert!(resp.expect_status(&[200, 201, 400]).is_ok());
        match resp.expect_status(&[200]) {
            Err(HarnessError::UnexpectedStatus { actual, body, .. }) => {
                assert_eq!(actual, 400);
                assert!(body.contains("bad"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_id_field_fallbacks() {
        assert_eq!(response(201, r#"{"workflowId":"wf-1"}"#).id_field(&["id", "workflowId"]).unwrap(), "wf-1");
        assert_eq!(response(201, r#"{"id":42}"#).id_field(&["id"]).unwrap(), "42");
        assert!(matches!(
            response(201, r#"{"id":""}"#).id_field(&["id"]),
            Err(HarnessError::Contract(_))
        ));
    }
}
