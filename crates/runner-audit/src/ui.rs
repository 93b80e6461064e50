//! UI helpers for the runner-audit CLI.
//!
//! Provides consistent formatting for console output during collection
//! and cleanup.

use colored::Colorize;

use crate::config::ClusterTarget;
use crate::status::RunnerStatus;

/// Print a section header.
pub fn print_section(title: &str) {
    println!();
    println!("{}", "═".repeat(70).bright_black());
    println!("{}", title.cyan().bold());
    println!("{}", "═".repeat(70).bright_black());
    println!();
}

/// Print the header shown before a cluster's namespaces are queried.
pub fn print_cluster_header(target: &ClusterTarget, org: Option<&str>) {
    println!();
    println!("{}", "═".repeat(70).bright_black());
    println!("{} {}", "Cluster:".bright_black(), target.cluster.cyan().bold());
    println!("{} {}", "API:    ".bright_black(), target.api_endpoint);
    if let Some(org) = org {
        println!("{} {}", "Org:    ".bright_black(), org);
    }
    println!("{}", "═".repeat(70).bright_black());
}

/// Print a success message.
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message.green());
}

/// Print a warning message.
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message.yellow());
}

/// Print an error message.
pub fn print_error(message: &str) {
    println!("{} {}", "✗".red().bold(), message.red());
}

/// Print an info message.
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Print a key-value pair.
pub fn print_kv(key: &str, value: &str) {
    println!("  {} {}", format!("{key}:").bright_black(), value.green());
}

/// Print a runner offered for deletion, before its confirmation prompt.
pub fn print_runner_candidate(runner: &str, org: &str, age: &str, status: RunnerStatus) {
    println!("{}", runner_candidate_line(runner, org, age, status));
}

fn runner_candidate_line(runner: &str, org: &str, age: &str, status: RunnerStatus) -> String {
    format!(
        "  {} {} {} {}",
        runner.bold(),
        org.bright_black(),
        age.bright_black(),
        status.to_string().yellow()
    )
}

/// Print a list item.
pub fn print_list_item(item: &str) {
    println!("  {} {item}", "•".bright_black());
}
