//! GatewayQA CLI
//!
//! Runs the bundled gateway suites through the harness runner and
//! renders the results.

pub mod commands;
pub mod output;
pub mod suites;
