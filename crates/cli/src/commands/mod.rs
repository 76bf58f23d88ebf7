//! CLI Commands

pub mod list;
pub mod probe;
pub mod run;
