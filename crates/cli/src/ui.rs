//! UI helpers for the flowscope CLI.
//!
//! Provides consistent formatting for console output during check runs.

use colored::Colorize;

/// Print a section header for a check stage.
pub fn print_section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
    println!("{}", "─".repeat(40).bright_black());
}

/// Print a single check result line.
pub fn print_check_result(subject: &str, passed: bool, detail: Option<&str>) {
    let status = if passed { "✓".green() } else { "✗".red() };

    let text = if let Some(msg) = detail {
        format!("{subject} - {msg}")
    } else {
        subject.to_string()
    };

    println!("  {status} {text}");
}

/// Print the final verdict line.
pub fn print_verdict(passed: bool) {
    println!();
    if passed {
        println!("Status check results are {}", "√".green().bold());
    } else {
        println!("Status check results are {}", "✗".red().bold());
    }
}
