//! Typed clients for the gateway's API groups
//!
//! Clients borrow a [`RequestContext`] and inherit its credential scope, so
//! the same client type is used for anonymous, service-key and JWT access.
//! Every call returns the raw [`ApiResponse`]; status expectations stay with
//! the caller.

use reqwest::Method;
use serde::Serialize;
use serde_json::json;

use crate::config::AuthRoutes;
use crate::context::{ApiResponse, RequestContext};
use crate::error::HarnessResult;
use crate::generator::{AuditLogData, NotificationData, TestIdentity, WorkflowData};
use crate::provisioner::LoginRequest;

/// Query-string pairs appended to list endpoints
pub type Query<'q> = [(&'q str, &'q str)];

async fn get_with_query(ctx: &RequestContext, path: &str, query: &Query<'_>) -> HarnessResult<ApiResponse> {
    ctx.send(ctx.request(Method::GET, path)?.query(query)).await
}

pub struct UsersClient<'a> {
    ctx: &'a RequestContext,
    routes: AuthRoutes,
}

impl<'a> UsersClient<'a> {
    pub fn new(ctx: &'a RequestContext) -> Self {
        Self::with_routes(ctx, AuthRoutes::gateway())
    }

    pub fn with_routes(ctx: &'a RequestContext, routes: AuthRoutes) -> Self {
        Self { ctx, routes }
    }

    pub async fn register(&self, identity: &TestIdentity) -> HarnessResult<ApiResponse> {
        self.ctx.post(&self.routes.register, identity).await
    }

    pub async fn login(&self, request: &LoginRequest) -> HarnessResult<ApiResponse> {
        self.ctx.post(&self.routes.login, request).await
    }

    pub async fn profile(&self) -> HarnessResult<ApiResponse> {
        self.ctx.get("/user/profile").await
    }

    pub async fn list_users(&self) -> HarnessResult<ApiResponse> {
        self.ctx.get("/users").await
    }
}

/// `/v1/ai/*`
pub struct AiClient<'a> {
    ctx: &'a RequestContext,
}

impl<'a> AiClient<'a> {
    pub fn new(ctx: &'a RequestContext) -> Self {
        Self { ctx }
    }

    pub async fn complete(&self, prompt: &str, model: &str) -> HarnessResult<ApiResponse> {
        self.ctx
            .post("/v1/ai/complete", &json!({ "prompt": prompt, "model": model }))
            .await
    }

    /// Submit a batch job; the gateway answers 200 or 202 with `jobId` or `id`
    pub async fn batch(&self, inputs: &[&str]) -> HarnessResult<ApiResponse> {
        self.ctx.post("/v1/ai/batch", &json!({ "inputs": inputs })).await
    }

    pub async fn job(&self, job_id: &str) -> HarnessResult<ApiResponse> {
        self.ctx.get(&format!("/v1/ai/jobs/{}", job_id)).await
    }

    pub async fn models(&self) -> HarnessResult<ApiResponse> {
        self.ctx.get("/v1/ai/models").await
    }
}

/// `/v1/workflows/*`
pub struct WorkflowsClient<'a> {
    ctx: &'a RequestContext,
}

impl<'a> WorkflowsClient<'a> {
    pub fn new(ctx: &'a RequestContext) -> Self {
        Self { ctx }
    }

    pub async fn create(&self, workflow: &WorkflowData) -> HarnessResult<ApiResponse> {
        self.ctx.post("/v1/workflows/", workflow).await
    }

    pub async fn get(&self, id: &str) -> HarnessResult<ApiResponse> {
        self.ctx.get(&format!("/v1/workflows/{}", id)).await
    }

    pub async fn list(&self, page: u32, limit: u32) -> HarnessResult<ApiResponse> {
        let (page, limit) = (page.to_string(), limit.to_string());
        get_with_query(self.ctx, "/v1/workflows/", &[("page", page.as_str()), ("limit", limit.as_str())]).await
    }

    pub async fn update<T: Serialize + ?Sized>(&self, id: &str, changes: &T) -> HarnessResult<ApiResponse> {
        self.ctx.put(&format!("/v1/workflows/{}", id), changes).await
    }

    /// Start an execution; the gateway answers 202 with an `execution_id`
    pub async fn execute(&self, id: &str, triggered_by: &str) -> HarnessResult<ApiResponse> {
        self.ctx
            .post(
                &format!("/v1/workflows/{}/execute", id),
                &json!({ "triggered_by": triggered_by }),
            )
            .await
    }

    pub async fn status(&self, id: &str) -> HarnessResult<ApiResponse> {
        self.ctx.get(&format!("/v1/workflows/{}/status", id)).await
    }

    pub async fn approve(&self, id: &str, reason: &str) -> HarnessResult<ApiResponse> {
        self.ctx
            .post(&format!("/v1/workflows/{}/approve", id), &json!({ "reason": reason }))
            .await
    }

    pub async fn reject(&self, id: &str, reason: &str) -> HarnessResult<ApiResponse> {
        self.ctx
            .post(&format!("/v1/workflows/{}/reject", id), &json!({ "reason": reason }))
            .await
    }
}

/// `/v1/notifications/*`
pub struct NotificationsClient<'a> {
    ctx: &'a RequestContext,
}

impl<'a> NotificationsClient<'a> {
    pub fn new(ctx: &'a RequestContext) -> Self {
        Self { ctx }
    }

    pub async fn create(&self, notification: &NotificationData) -> HarnessResult<ApiResponse> {
        self.ctx.post("/v1/notifications/", notification).await
    }

    pub async fn get(&self, id: &str) -> HarnessResult<ApiResponse> {
        self.ctx.get(&format!("/v1/notifications/{}", id)).await
    }

    /// Filters such as `type`, `status`, `priority`, `recipient`, `page`, `limit`
    pub async fn list(&self, query: &Query<'_>) -> HarnessResult<ApiResponse> {
        get_with_query(self.ctx, "/v1/notifications/", query).await
    }

    pub async fn update<T: Serialize + ?Sized>(&self, id: &str, changes: &T) -> HarnessResult<ApiResponse> {
        self.ctx.put(&format!("/v1/notifications/{}", id), changes).await
    }

    pub async fn mark_read(&self, id: &str) -> HarnessResult<ApiResponse> {
        self.ctx
            .put(&format!("/v1/notifications/{}/read", id), &json!({}))
            .await
    }

    pub async fn mark_unread(&self, id: &str) -> HarnessResult<ApiResponse> {
        self.ctx
            .put(&format!("/v1/notifications/{}/unread", id), &json!({}))
            .await
    }

    pub async fn delete(&self, id: &str) -> HarnessResult<ApiResponse> {
        self.ctx.delete(&format!("/v1/notifications/{}", id)).await
    }

    pub async fn broadcast(&self, recipients: &[&str], notification: &NotificationData) -> HarnessResult<ApiResponse> {
        let body = json!({
            "recipients": recipients,
            "type": notification.kind,
            "title": notification.title,
            "message": notification.message,
            "priority": notification.priority,
        });
        self.ctx.post("/v1/notifications/broadcast", &body).await
    }
}

/// `/v1/audit/logs*`
///
/// Append-only: there is no update or delete.
pub struct AuditClient<'a> {
    ctx: &'a RequestContext,
}

impl<'a> AuditClient<'a> {
    pub fn new(ctx: &'a RequestContext) -> Self {
        Self { ctx }
    }

    pub async fn create(&self, entry: &AuditLogData) -> HarnessResult<ApiResponse> {
        self.ctx.post("/v1/audit/logs", entry).await
    }

    pub async fn get(&self, id: &str) -> HarnessResult<ApiResponse> {
        self.ctx.get(&format!("/v1/audit/logs/{}", id)).await
    }

    pub async fn list(&self, query: &Query<'_>) -> HarnessResult<ApiResponse> {
        get_with_query(self.ctx, "/v1/audit/logs", query).await
    }
}

/// `/v1/analytics/*`
pub struct AnalyticsClient<'a> {
    ctx: &'a RequestContext,
}

impl<'a> AnalyticsClient<'a> {
    pub fn new(ctx: &'a RequestContext) -> Self {
        Self { ctx }
    }

    pub async fn usage(&self, query: &Query<'_>) -> HarnessResult<ApiResponse> {
        get_with_query(self.ctx, "/v1/analytics/usage", query).await
    }

    pub async fn performance(&self, query: &Query<'_>) -> HarnessResult<ApiResponse> {
        get_with_query(self.ctx, "/v1/analytics/performance", query).await
    }

    pub async fn errors(&self, query: &Query<'_>) -> HarnessResult<ApiResponse> {
        get_with_query(self.ctx, "/v1/analytics/errors", query).await
    }

    pub async fn track_event(&self, event_type: &str, properties: serde_json::Value) -> HarnessResult<ApiResponse> {
        self.ctx
            .post(
                "/v1/analytics/events",
                &json!({ "event_type": event_type, "properties": properties }),
            )
            .await
    }
}

/// `/v1/admin/system/*`
pub struct AdminClient<'a> {
    ctx: &'a RequestContext,
}

impl<'a> AdminClient<'a> {
    pub fn new(ctx: &'a RequestContext) -> Self {
        Self { ctx }
    }

    pub async fn status(&self) -> HarnessResult<ApiResponse> {
        self.ctx.get("/v1/admin/system/status").await
    }

    pub async fn set_maintenance(&self, enabled: bool) -> HarnessResult<ApiResponse> {
        self.ctx
            .post("/v1/admin/system/maintenance", &json!({ "enabled": enabled }))
            .await
    }

    pub async fn config(&self) -> HarnessResult<ApiResponse> {
        self.ctx.get("/v1/admin/system/config").await
    }
}
