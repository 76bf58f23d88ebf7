//! GatewayQA test harness
//!
//! This crate provisions everything an isolated API test against the AI
//! gateway needs:
//! - Collision-free identities and payloads for every test invocation
//! - Registration, login and admin token acquisition
//! - Request contexts bound to exactly one credential scope
//! - Lazily resolved, per-test fixtures with guaranteed teardown
//! - A parallel runner with projects, retries and a JSON report
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  TestRunner (parallel workers)              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  FixtureRegistry::run_scoped(test) -> ScopedOutcome         │
//! │    ├── FixtureScope (memo slot per fixture, per test)       │
//! │    │     ├── user        <- generator::generate_identity    │
//! │    │     ├── userToken   <- Provisioner::login_user         │
//! │    │     ├── adminToken  <- Provisioner::admin_token        │
//! │    │     ├── *Headers    <- HeaderSet::for_credential       │
//! │    │     └── *Request    <- ContextFactory::new_context     │
//! │    └── teardown() in reverse construction order             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  RequestContext -> clients::{Users, Ai, Workflows, ...}     │
//! │    └── ApiResponse + contract::validate_*                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod clients;
pub mod config;
pub mod context;
pub mod contract;
pub mod credentials;
pub mod error;
pub mod fixtures;
pub mod generator;
pub mod poll;
pub mod provisioner;
pub mod readiness;
pub mod runner;

pub use config::HarnessConfig;
pub use context::{ApiResponse, ContextFactory, RequestContext};
pub use credentials::{Credential, CredentialKind, HeaderSet};
pub use error::{HarnessError, HarnessResult};
pub use fixtures::{api_fixtures, FixtureKey, FixtureRegistry, FixtureScope};
pub use generator::{generate_identity, unique_string, TestIdentity};
pub use poll::{poll, wait_for, PollPolicy, PollStatus};
pub use provisioner::Provisioner;
pub use reqwest::Method;
pub use runner::{Project, RunnerConfig, TestCase, TestOutcome, TestRunner, TestSuiteResult};
