//! Output formatting for command results
//!
//! Every command renders either as pretty JSON for machines or as text for a
//! terminal.

use anyhow::{Context, Result};
use serde::Serialize;

use crate::pipeline::PipelineOutcome;
use crate::sanitize::RedactionStats;

const RULE: &str = "\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    Json,
    /// Terminal text
    Human,
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a completed pipeline run
    pub fn format_outcome(&self, outcome: &PipelineOutcome) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(outcome)
                .context("Failed to serialize pipeline outcome to JSON"),
            OutputFormat::Human => Ok(self.format_outcome_human(outcome)),
        }
    }

    /// Formats the result of a standalone sanitize pass
    pub fn format_sanitize(&self, stats: &RedactionStats) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(stats)
                .context("Failed to serialize redaction stats to JSON"),
            OutputFormat::Human => Ok(self.format_sanitize_human(stats)),
        }
    }

    pub fn format_health(&self, health: &HealthReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(health)
                .context("Failed to serialize health report to JSON"),
            OutputFormat::Human => Ok(self.format_health_human(health)),
        }
    }

    fn format_outcome_human(&self, outcome: &PipelineOutcome) -> String {
        let mut output = String::new();

        output.push_str(&outcome.report.to_string());
        output.push('\n');
        output.push_str(&outcome.rewrite.to_string());
        output.push('\n');

        output.push_str("Submission Summary\n");
        output.push_str(RULE);
        output.push_str("\n\n");
        output.push_str(&format!("Submission:   {}\n", outcome.submission_id));
        output.push_str(&format!("Primary file: {}\n", outcome.primary_file));
        output.push_str(&format!("Issues found: {}\n", outcome.issues_found));
        output.push_str(&format!("Changes made: {}\n", outcome.changes_made));
        output.push_str(&format!("Iteration:    {}\n", outcome.iteration));
        output.push_str(&format!("Phase:        {}\n", outcome.state.phase));

        match (&outcome.build_id, outcome.build_status) {
            (Some(id), Some(status)) => {
                output.push_str(&format!("Build:        {} ({})\n", id, status));
            }
            _ => output.push_str("Build:        not verified\n"),
        }

        output.push_str(&format!(
            "Redaction:    {} removed, {} modified, {} secrets\n",
            outcome.redaction.files_removed,
            outcome.redaction.files_modified,
            outcome.redaction.secrets_redacted
        ));

        output.push_str("\nArtifacts:\n");
        output.push_str(&format!("  source:       {}\n", outcome.artifacts.source_archive));
        let stored = [
            ("code", &outcome.artifacts.rewritten_code),
            ("dockerfile", &outcome.artifacts.build_manifest),
            ("requirements", &outcome.artifacts.requirements),
            ("manifest", &outcome.artifacts.refactor_manifest),
        ];
        for (label, locator) in stored {
            if let Some(locator) = locator {
                output.push_str(&format!("  {:<13} {}\n", format!("{}:", label), locator));
            }
        }

        output
    }

    fn format_sanitize_human(&self, stats: &RedactionStats) -> String {
        let mut output = String::new();

        output.push_str("Sanitize Summary\n");
        output.push_str(RULE);
        output.push_str("\n\n");
        output.push_str(&format!("Files removed:    {}\n", stats.files_removed));
        output.push_str(&format!("Files modified:   {}\n", stats.files_modified));
        output.push_str(&format!("Secrets redacted: {}\n", stats.secrets_redacted));

        if !stats.issues.is_empty() {
            output.push_str(&format!("\nIssues ({}):\n", stats.issues.len()));
            for issue in &stats.issues {
                output.push_str(&format!("  \u{2717} {}\n", issue));
            }
        }

        output
    }

    fn format_health_human(&self, health: &HealthReport) -> String {
        let mut output = String::new();

        output.push_str("Backend Health Status\n");
        output.push_str(RULE);
        output.push_str("\n\n");

        for (label, status) in [("Generative", &health.generative), ("Build", &health.build)] {
            let symbol = if status.available { "\u{2713}" } else { "\u{2717}" };
            output.push_str(&format!("{} {}: {}\n", symbol, label, status.name));
            output.push_str(&format!("  Message: {}\n", status.message));
            if let Some(ref details) = status.details {
                output.push_str(&format!("  Details: {}\n", details));
            }
            output.push('\n');
        }

        output.push_str(&format!(
            "Eligible strategies: {}\n",
            health.candidates.join(" -> ")
        ));

        output
    }
}

/// Status of one backend
#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub name: String,
    pub available: bool,
    pub message: String,
    pub details: Option<String>,
}

impl ComponentHealth {
    pub fn available(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            available: true,
            message: message.into(),
            details: None,
        }
    }

    pub fn unavailable(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            available: false,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// What `retrofit health` reports
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub generative: ComponentHealth,
    pub build: ComponentHealth,
    /// Eligible generative strategies in priority order
    pub candidates: Vec<String>,
}
