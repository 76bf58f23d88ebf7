//! List the bundled tests a project selects

use anyhow::Context;
use clap::Args;
use gatewayqa_harness::{Project, TestCase};
use serde::Serialize;

use crate::output::{self, OutputFormat, TableDisplay};
use crate::suites;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Project whose selection to show; all tests when omitted
    #[arg(long)]
    pub project: Option<String>,
}

#[derive(Serialize)]
struct TestRow {
    name: String,
    tags: Vec<String>,
}

impl TableDisplay for TestRow {
    fn headers() -> Vec<&'static str> {
        vec!["Test", "Tags"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.name.clone(), self.tags.join(" ")]
    }
}

pub fn execute(args: ListArgs, format: OutputFormat) -> anyhow::Result<()> {
    let tests = select(suites::all(), args.project.as_deref())?;
    let rows: Vec<TestRow> = tests
        .into_iter()
        .map(|t| TestRow {
            name: t.name,
            tags: t.tags,
        })
        .collect();
    output::print_list(&rows, format);
    Ok(())
}

pub(crate) fn select(tests: Vec<TestCase>, project: Option<&str>) -> anyhow::Result<Vec<TestCase>> {
    match project {
        Some(name) => {
            let project = Project::find(name).with_context(|| {
                let known: Vec<String> = Project::builtin().into_iter().map(|p| p.name).collect();
                format!("unknown project '{}' (known: {})", name, known.join(", "))
            })?;
            Ok(project.select(&tests))
        }
        None => Ok(tests),
    }
}
