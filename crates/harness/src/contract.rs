//! Typed response bodies and boundary validation
//!
//! Bodies from the system under test are loosely shaped JSON. These checks run
//! once at the boundary and hand back typed values, so scenario code never
//! probes properties ad hoc.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{HarnessError, HarnessResult};

/// Authenticated user profile (`ID`, `Email`, `Username` on the wire)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Email")]
    pub email: String,
    #[serde(rename = "Username")]
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuditLogPage {
    pub logs: Vec<AuditLogEntry>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuditLogEntry {
    pub id: String,
    pub timestamp: String,
    pub user_id: String,
    pub action: String,
    pub resource_type: String,
    pub resource_id: String,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

/// Status of an asynchronous AI job
#[derive(Debug, Clone, Deserialize)]
pub struct JobStatus {
    pub status: String,
    #[serde(default)]
    pub outputs: Option<Vec<Value>>,
}

impl JobStatus {
    pub fn is_completed(&self) -> bool {
        self.status == "completed"
    }
}

/// Collects every violation before failing, so one report names them all
#[derive(Debug, Default)]
struct Violations(Vec<String>);

impl Violations {
    fn non_empty_string(&mut self, body: &Value, field: &str, min_len: usize) {
        match body.get(field) {
            Some(Value::String(s)) if s.chars().count() >= min_len => {}
            Some(Value::String(_)) => self.0.push(format!("/{} is shorter than {}", field, min_len)),
            Some(other) => self.0.push(format!("/{} must be a string, got {}", field, other)),
            None => self.0.push(format!("(root) missing required property '{}'", field)),
        }
    }

    fn absent(&mut self, body: &Value, field: &str) {
        if body.get(field).is_some() {
            self.0.push(format!("(root) must not expose '{}'", field));
        }
    }

    fn finish(self, what: &str) -> HarnessResult<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(HarnessError::Contract(format!(
                "{} validation failed: {}",
                what,
                self.0.join("; ")
            )))
        }
    }
}

/// Validate a profile body: required non-empty `ID`, `Email` (3+ chars),
/// `Username`, and no password field in any casing.
pub fn validate_profile(body: &Value) -> HarnessResult<UserProfile> {
    if !body.is_object() {
        return Err(HarnessError::Contract(format!("profile must be an object, got {}", body)));
    }
    let mut v = Violations::default();
    v.non_empty_string(body, "ID", 1);
    v.non_empty_string(body, "Email", 3);
    v.non_empty_string(body, "Username", 1);
    v.absent(body, "password");
    v.absent(body, "Password");
    v.finish("Profile schema")?;
    Ok(serde_json::from_value(body.clone())?)
}

/// Validate an error body `{ "error": "<non-empty>" }`
pub fn validate_error(body: &Value) -> HarnessResult<ErrorBody> {
    let mut v = Violations::default();
    v.non_empty_string(body, "error", 1);
    v.finish("Error body")?;
    Ok(serde_json::from_value(body.clone())?)
}

/// Validate an audit log page and every entry in it
pub fn validate_audit_page(body: &Value) -> HarnessResult<AuditLogPage> {
    serde_json::from_value(body.clone())
        .map_err(|e| HarnessError::Contract(format!("Audit log page validation failed: {}", e)))
}
