//! Check results and run reports.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::CheckMode;
use crate::ui;

/// A single check outcome. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    /// What was checked (resource name, permission tuple, transport).
    pub subject: String,
    /// Which kind of check produced this (e.g. "namespace", "permission").
    pub category: String,
    pub passed: bool,
    /// Failure cause or extra context, when there is one.
    pub detail: Option<String>,
}

impl CheckResult {
    #[must_use]
    pub fn pass(subject: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            category: category.into(),
            passed: true,
            detail: None,
        }
    }

    #[must_use]
    pub fn fail(
        subject: impl Into<String>,
        category: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            category: category.into(),
            passed: false,
            detail: Some(detail.into()),
        }
    }

    /// Attach detail text to a passing result.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// The ordered outcome of a whole check run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckReport {
    pub mode: CheckMode,
    pub namespace: String,
    pub timestamp: String,
    pub results: Vec<CheckResult>,
}

impl CheckReport {
    #[must_use]
    pub fn new(mode: CheckMode, namespace: impl Into<String>) -> Self {
        Self {
            mode,
            namespace: namespace.into(),
            timestamp: Utc::now().to_rfc3339(),
            results: Vec::new(),
        }
    }

    /// Record a result, preserving arrival order.
    pub fn record(&mut self, result: CheckResult) {
        self.results.push(result);
    }

    /// Record every result of a finished stage.
    pub fn record_all(&mut self, results: Vec<CheckResult>) {
        self.results.extend(results);
    }

    /// Overall verdict: AND over every recorded result.
    ///
    /// A run that produced no results did not verify anything and fails.
    #[must_use]
    pub fn all_passed(&self) -> bool {
        !self.results.is_empty() && self.results.iter().all(|r| r.passed)
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.passed).count()
    }

    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.passed).count()
    }

    /// Print the per-check lines grouped by category, plus the verdict.
    pub fn print_summary(&self) {
        let mut current_category: Option<&str> = None;

        for result in &self.results {
            if current_category != Some(result.category.as_str()) {
                ui::print_section(&result.category);
                current_category = Some(result.category.as_str());
            }
            ui::print_check_result(&result.subject, result.passed, result.detail.as_deref());
        }

        println!();
        println!(
            "{}/{} checks passed",
            self.passed_count(),
            self.total()
        );
        ui::print_verdict(self.all_passed());
    }
}
