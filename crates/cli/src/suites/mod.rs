//! Live suites against a running gateway
//!
//! Tags follow the project filters: `@smoke`, `@contract`, `@security`,
//! `@exercise`. Exercise tests skip unless `RUN_EXERCISES` is set.

use gatewayqa_harness::config::AuthRoutes;
use gatewayqa_harness::{FixtureScope, HarnessError, HarnessResult, TestCase};

pub mod admin;
pub mod ai;
pub mod analytics;
pub mod audit;
pub mod auth;
pub mod contract;
pub mod notifications;
pub mod workflows;

pub const EXERCISES_ENV: &str = "RUN_EXERCISES";

/// Every bundled test case
pub fn all() -> Vec<TestCase> {
    [
        auth::tests(),
        contract::tests(),
        ai::tests(),
        workflows::tests(),
        notifications::tests(),
        audit::tests(),
        analytics::tests(),
        admin::tests(),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// The auth routes the fixtures provision through
pub(crate) async fn auth_routes(scope: &FixtureScope) -> HarnessResult<AuthRoutes> {
    Ok(scope.auth_routes().await?.as_ref().clone())
}

pub(crate) fn exercise_gate() -> HarnessResult<()> {
    if std::env::var_os(EXERCISES_ENV).is_some() {
        Ok(())
    } else {
        Err(HarnessError::Skipped(format!("exercise disabled, set {} to run it", EXERCISES_ENV)))
    }
}
