//! Logging-based progress handler

use super::{ProgressEvent, ProgressHandler};
use crate::sanitize::redact_text;
use tracing::{debug, info, warn};

/// Handler that logs progress events using tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl ProgressHandler for LoggingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Started { submission_id } => {
                info!(submission_id = %submission_id, "Starting modernization");
            }
            ProgressEvent::PhaseStarted { phase } => {
                info!(phase = %phase, "Starting phase");
            }
            ProgressEvent::PhaseComplete { phase, duration } => {
                info!(
                    phase = %phase,
                    duration_ms = duration.as_millis(),
                    "Phase complete"
                );
            }
            ProgressEvent::SanitizeComplete {
                files_removed,
                files_modified,
                issues,
            } => {
                if *issues > 0 {
                    warn!(files_removed, files_modified, issues, "Sanitize complete with issues");
                } else {
                    info!(files_removed, files_modified, "Sanitize complete");
                }
            }
            ProgressEvent::GenerationStarted { task, iteration } => {
                debug!(?task, iteration, "Sending generation request");
            }
            ProgressEvent::GenerationComplete {
                task,
                iteration,
                response_time,
            } => {
                debug!(
                    ?task,
                    iteration,
                    response_time_ms = response_time.as_millis(),
                    "Received generation response"
                );
            }
            ProgressEvent::IterationFailed { iteration, reason } => {
                warn!(iteration, reason = %redact_text(reason), "Iteration failed");
            }
            ProgressEvent::VerificationTriggered {
                iteration,
                build_id,
            } => {
                info!(iteration, build_id = %build_id, "Verification build triggered");
            }
            ProgressEvent::VerificationComplete {
                iteration,
                build_id,
                status,
            } => {
                info!(
                    iteration,
                    build_id = %build_id,
                    status = %status,
                    "Verification build finished"
                );
            }
            ProgressEvent::Completed {
                iterations,
                total_time,
            } => {
                info!(
                    iterations,
                    total_time_ms = total_time.as_millis(),
                    "Modernization complete"
                );
            }
            ProgressEvent::Failed { phase, error } => {
                warn!(phase = %phase, error = %redact_text(error), "Modernization failed");
            }
        }
    }
}
