//! Output formatting for CLI commands.

use colored::Colorize;
use serde::Serialize;
use stakeplan_allocation::{Allocation, LifecycleAction, ValidatorRecord};
use tabled::{Table, Tabled};

const CLI_SCHEMA_VERSION: &str = "stakeplan.cli.v1";

/// Output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON format.
    Json,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Self {
        match value {
            "json" => OutputFormat::Json,
            _ => OutputFormat::Table,
        }
    }
}

/// Print data in the specified format.
pub fn print_output<T: Serialize + Tabled>(data: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if data.is_empty() {
                println!("{}", "No items found.".dimmed());
            } else {
                println!("{}", Table::new(data));
            }
        }
        OutputFormat::Json => println!("{}", format_json(data, "[]")),
    }
}

/// Print a single item as JSON.
pub fn print_single<T: Serialize>(data: &T) {
    println!("{}", format_json(data, "{}"));
}

/// Print a success message.
pub fn print_success(message: &str) {
    println!("{} {}", "Success:".green().bold(), message);
}

/// Print an info message.
pub fn print_info(message: &str) {
    println!("{} {}", "Info:".blue().bold(), message);
}

/// Print a warning to stderr.
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "Warning:".yellow().bold(), message);
}

/// One row of the working validator table.
#[derive(Debug, Clone, Serialize, Tabled)]
pub struct ValidatorRow {
    /// 1-based command index.
    #[tabled(rename = "#")]
    pub index: usize,
    #[tabled(rename = "Validator")]
    pub name: String,
    #[tabled(rename = "Vote account")]
    pub vote_account: String,
    #[tabled(rename = "Current")]
    pub current: String,
    #[tabled(rename = "Pending")]
    pub pending: String,
    #[tabled(rename = "Target")]
    pub target: String,
    #[tabled(rename = "Change")]
    pub change: String,
    #[tabled(rename = "Action")]
    pub action: String,
}

impl ValidatorRow {
    fn new(index: usize, record: &ValidatorRecord) -> Self {
        let change = record.change();
        Self {
            index: index + 1,
            name: record.display_name().unwrap_or("-").to_string(),
            vote_account: record.identity().short(),
            current: format_amount(record.current_balance()),
            pending: format_amount(record.pending_balance()),
            target: format_amount(record.target_balance()),
            change: if change == 0.0 {
                "-".to_string()
            } else {
                format!("{:+.4}", change)
            },
            action: match record.action() {
                LifecycleAction::Keep => String::new(),
                other => other.as_str().to_string(),
            },
        }
    }
}

/// Rows for every validator, largest target first.
pub fn validator_rows(allocation: &Allocation) -> Vec<ValidatorRow> {
    allocation
        .display_order()
        .into_iter()
        .filter_map(|index| {
            allocation
                .get(index)
                .map(|record| ValidatorRow::new(index, record))
        })
        .collect()
}

/// Render the working table followed by a totals line.
pub fn render_allocation(allocation: &Allocation) -> String {
    let rows = validator_rows(allocation);
    let current: f64 = allocation.records().iter().map(|r| r.current_balance()).sum();
    let target: f64 = allocation
        .kept()
        .chain(allocation.proposed())
        .map(|r| r.target_balance())
        .sum();

    let mut out = if rows.is_empty() {
        "No validators.".to_string()
    } else {
        Table::new(rows).to_string()
    };
    out.push_str(&format!(
        "\nReserve {}  |  current {}  |  target {}",
        format_amount(allocation.reserve().balance),
        format_amount(current),
        format_amount(target),
    ));
    out
}

/// Coins with four decimals, which is what operators read at.
pub fn format_amount(amount: f64) -> String {
    format!("{:.4}", amount)
}

fn format_json<T: Serialize + ?Sized>(data: &T, fallback: &str) -> String {
    let value = serde_json::to_value(data).unwrap_or_else(|_| serde_json::json!({}));
    let wrapped = wrap_with_schema(value);
    serde_json::to_string_pretty(&wrapped).unwrap_or_else(|_| fallback.to_string())
}

fn wrap_with_schema(value: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "schemaVersion": CLI_SCHEMA_VERSION,
        "data": value
    })
}
