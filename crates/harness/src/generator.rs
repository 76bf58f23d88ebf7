//! Unique test data generation
//!
//! Every value is `prefix-<base36 millis>-<random>`: the prefix tells you which
//! test produced it, the timestamp orders it, and the random suffix keeps two
//! calls in the same millisecond apart.

use chrono::{SecondsFormat, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Random suffix length for identities. 36^8 keeps same-millisecond collisions
/// out of reach for tens of thousands of calls per run.
pub const IDENTITY_SUFFIX_LEN: usize = 8;

/// Minimum random suffix length accepted by [`unique_string`].
pub const MIN_SUFFIX_LEN: usize = 6;

pub const TEST_PASSWORD: &str = "SecurePass123!";
pub const EMAIL_DOMAIN: &str = "example.com";

/// A throwaway user owned by exactly one test
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TestIdentity {
    pub email: String,
    pub username: String,
    pub password: String,
}

/// Encode a number in lowercase base 36
pub fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(ALPHABET[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).unwrap_or_default()
}

fn random_alphanumeric(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

fn millis_base36() -> String {
    to_base36(Utc::now().timestamp_millis().max(0) as u64)
}

/// `prefix-<base36 millis>-<random(len)>`, with `len` raised to [`MIN_SUFFIX_LEN`]
pub fn unique_string(prefix: &str, len: usize) -> String {
    format!(
        "{}-{}-{}",
        prefix,
        millis_base36(),
        random_alphanumeric(len.max(MIN_SUFFIX_LEN))
    )
}

/// Unique email under the test domain
pub fn unique_email(prefix: &str) -> String {
    format!("{}@{}", unique_string(prefix, IDENTITY_SUFFIX_LEN), EMAIL_DOMAIN)
}

/// Unique username made only of `[a-z0-9-]`
pub fn unique_username(prefix: &str) -> String {
    unique_string(prefix, IDENTITY_SUFFIX_LEN)
}

/// Fresh identity whose email starts with `prefix-` and username with `{prefix}user-`
pub fn generate_identity(prefix: &str) -> TestIdentity {
    TestIdentity {
        email: unique_email(prefix),
        username: unique_username(&format!("{}user", prefix)),
        password: TEST_PASSWORD.to_string(),
    }
}

/// Unique name for workflows, notifications and other resources
pub fn resource_name(prefix: &str) -> String {
    unique_string(prefix, MIN_SUFFIX_LEN)
}

pub fn strong_password() -> String {
    format!("Str0ng!-{}", unique_string("pw", 10))
}

/// Uniform integer in `min..=max`
pub fn rand_int(min: i64, max: i64) -> i64 {
    if min >= max {
        return min;
    }
    rand::thread_rng().gen_range(min..=max)
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationData {
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub priority: String,
    pub recipient: String,
}

pub fn notification_data(recipient: Option<&str>) -> NotificationData {
    let id = resource_name("notif");
    NotificationData {
        title: format!("Test Notification {}", id),
        message: format!("This is a test notification created at {}", now_rfc3339()),
        kind: "info".to_string(),
        priority: "medium".to_string(),
        recipient: recipient
            .map(str::to_string)
            .unwrap_or_else(|| unique_email("notif-user")),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowData {
    pub name: String,
    pub description: String,
    pub steps: Vec<WorkflowStep>,
}

pub fn workflow_data() -> WorkflowData {
    let id = resource_name("workflow");
    let step = |id: &str, name: &str, kind: &str, description: &str| WorkflowStep {
        id: id.to_string(),
        name: name.to_string(),
        kind: kind.to_string(),
        description: description.to_string(),
    };
    WorkflowData {
        name: format!("Test Workflow {}", id),
        description: format!("Test workflow created at {}", now_rfc3339()),
        steps: vec![
            step("step1", "Initial Step", "manual", "First step in the workflow"),
            step("step2", "Processing Step", "automated", "Automated processing step"),
        ],
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogData {
    pub action: String,
    pub user_id: String,
    pub resource_type: String,
    pub resource_id: String,
    pub details: serde_json::Value,
}

pub fn audit_log_data(user_id: Option<&str>) -> AuditLogData {
    let id = resource_name("audit");
    AuditLogData {
        action: "test.action".to_string(),
        user_id: user_id.unwrap_or("test-user").to_string(),
        resource_type: "test_resource".to_string(),
        resource_id: format!("resource-{}", id),
        details: serde_json::json!({
            "test": true,
            "timestamp": now_rfc3339(),
            "action_id": id,
        }),
    }
}
