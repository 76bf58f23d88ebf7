//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use gatewayqa_harness::runner::TestResult;
use gatewayqa_harness::{TestOutcome, TestSuiteResult};
use serde::Serialize;

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

impl TableDisplay for TestResult {
    fn headers() -> Vec<&'static str> {
        vec!["Test", "Tags", "Outcome", "Attempts", "Duration", "Error"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.tags.join(" "),
            outcome_label(self.outcome).to_string(),
            self.attempts.to_string(),
            format!("{} ms", self.duration_ms),
            self.error.clone().unwrap_or_default(),
        ]
    }
}

fn outcome_label(outcome: TestOutcome) -> &'static str {
    match outcome {
        TestOutcome::Passed => "passed",
        TestOutcome::Flaky => "flaky",
        TestOutcome::Failed => "failed",
        TestOutcome::TimedOut => "timed out",
        TestOutcome::Skipped => "skipped",
        TestOutcome::Cancelled => "cancelled",
    }
}

fn outcome_color(outcome: TestOutcome) -> Color {
    match outcome {
        TestOutcome::Passed => Color::Green,
        TestOutcome::Flaky | TestOutcome::Skipped => Color::Yellow,
        _ => Color::Red,
    }
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    if items.is_empty() {
        println!("No items found.");
        return;
    }

    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);

            table.set_header(T::headers());
            for item in items {
                table.add_row(item.row());
            }

            println!("{table}");
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(items).unwrap_or_default());
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(items).unwrap_or_default());
        }
    }
}

/// Print every test result plus the totals line
pub fn print_suite(suite: &TestSuiteResult, format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(TestResult::headers());

            for result in &suite.results {
                let mut row = result.row();
                let outcome = row.remove(2);
                let mut cells: Vec<Cell> = row.into_iter().map(Cell::new).collect();
                cells.insert(2, Cell::new(outcome).fg(outcome_color(result.outcome)));
                table.add_row(cells);
            }

            println!("{table}");
            print_totals(suite);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(suite).unwrap_or_default());
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(suite).unwrap_or_default());
        }
    }
}

fn print_totals(suite: &TestSuiteResult) {
    let mut parts = vec![format!("{} passed", suite.passed).green().to_string()];
    if suite.flaky > 0 {
        parts.push(format!("{} flaky", suite.flaky).yellow().to_string());
    }
    if suite.failed > 0 {
        parts.push(format!("{} failed", suite.failed).red().to_string());
    }
    if suite.timed_out > 0 {
        parts.push(format!("{} timed out", suite.timed_out).red().to_string());
    }
    if suite.skipped > 0 {
        parts.push(format!("{} skipped", suite.skipped).yellow().to_string());
    }
    if suite.cancelled > 0 {
        parts.push(format!("{} cancelled", suite.cancelled).red().to_string());
    }
    println!(
        "{} [{}] {} ({} ms)",
        "Results".bold(),
        suite.project,
        parts.join(", "),
        suite.duration_ms
    );
}

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}

/// Print info message
pub fn print_info(message: &str) {
    println!("ℹ️  {}", message);
}
