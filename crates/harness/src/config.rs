//! Harness configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::HarnessResult;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_SERVICE_API_KEY: &str = "service-secret";

/// Configuration shared (read-only) by every fixture graph in a run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Base URL of the system under test
    pub base_url: String,

    /// Static service secret sent as `x-api-key`
    pub service_api_key: String,

    /// Deadline applied to every request a context sends
    #[serde(with = "duration_ms")]
    pub request_timeout: Duration,

    /// Pre-seeded administrative identity
    pub admin: AdminCredentials,

    /// Registration and login endpoints
    pub auth_routes: AuthRoutes,

    /// Running under CI
    pub ci: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            service_api_key: DEFAULT_SERVICE_API_KEY.to_string(),
            request_timeout: Duration::from_secs(10),
            admin: AdminCredentials::default(),
            auth_routes: AuthRoutes::default(),
            ci: false,
        }
    }
}

/// Credentials of the seeded admin account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminCredentials {
    pub email: String,
    pub password: String,
}

impl Default for AdminCredentials {
    fn default() -> Self {
        Self {
            email: "admin@example.com".to_string(),
            password: "adminpass".to_string(),
        }
    }
}

/// Paths of the registration and login endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthRoutes {
    pub register: String,
    pub login: String,
}

impl AuthRoutes {
    /// Routes exposed directly on the gateway
    pub fn gateway() -> Self {
        Self {
            register: "/register".to_string(),
            login: "/login".to_string(),
        }
    }

    /// Routes proxied to the users service
    pub fn users_service() -> Self {
        Self {
            register: "/users/register".to_string(),
            login: "/users/login".to_string(),
        }
    }
}

impl Default for AuthRoutes {
    fn default() -> Self {
        Self::gateway()
    }
}

impl HarnessConfig {
    /// Load configuration from a YAML file, falling back to defaults when absent
    pub fn load(path: &Path) -> HarnessResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = serde_yaml::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a YAML file
    pub fn save(&self, path: &Path) -> HarnessResult<()> {
        let content = serde_yaml::to_string(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Overlay `BASE_URL`, `PORT`, `SERVICE_API_KEY` and `CI` from the process environment
    pub fn with_env(self) -> Self {
        self.with_vars(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with the process environment
    pub fn from_env() -> Self {
        Self::default().with_env()
    }

    fn with_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = var("BASE_URL").filter(|v| !v.is_empty()) {
            self.base_url = url;
        } else if let Some(port) = var("PORT").and_then(|p| p.parse::<u16>().ok()) {
            self.base_url = format!("http://localhost:{}", port);
        }
        if let Some(key) = var("SERVICE_API_KEY").filter(|v| !v.is_empty()) {
            self.service_api_key = key;
        }
        if let Some(ci) = var("CI") {
            self.ci = !matches!(ci.as_str(), "" | "0" | "false");
        }
        self
    }

    /// Base URL without a trailing slash
    pub fn api_base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = HarnessConfig::default();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.service_api_key, "service-secret");
        assert_eq!(config.admin.email, "admin@example.com");
        assert_eq!(config.auth_routes.login, "/login");
        assert!(!config.ci);
    }

    #[test]
    fn test_env_overlay() {
        let config = HarnessConfig::default().with_vars(vars(&[
            ("BASE_URL", "http://gateway:9000/"),
            ("SERVICE_API_KEY", "other-secret"),
            ("CI", "true"),
        ]));
        assert_eq!(config.api_base(), "http://gateway:9000");
        assert_eq!(config.service_api_key, "other-secret");
        assert!(config.ci);
    }

    #[test]
    fn test_port_used_without_base_url() {
        let config = HarnessConfig::default().with_vars(vars(&[("PORT", "8181"), ("CI", "0")]));
        assert_eq!(config.base_url, "http://localhost:8181");
        assert!(!config.ci);
    }

    #[test]
    fn test_yaml_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("harness.yaml");

        let mut config = HarnessConfig::default();
        config.auth_routes = AuthRoutes::users_service();
        config.request_timeout = Duration::from_millis(2500);
        config.save(&path).unwrap();

        let loaded = HarnessConfig::load(&path).unwrap();
        assert_eq!(loaded.auth_routes, AuthRoutes::users_service());
        assert_eq!(loaded.request_timeout, Duration::from_millis(2500));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: HarnessConfig = serde_yaml::from_str("base_url: http://sut:1234\n").unwrap();
        assert_eq!(config.base_url, "http://sut:1234");
        assert_eq!(config.admin, AdminCredentials::default());
    }

    #[test]
    fn test_missing_file_is_default() {
        let config = HarnessConfig::load(Path::new("/nonexistent/harness.yaml")).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }
}
