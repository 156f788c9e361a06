//! Progress handler trait and events

use crate::build::BuildStatus;
use crate::llm::TaskKind;
use crate::pipeline::PipelinePhase;
use std::time::Duration;

/// Events emitted while a submission moves through the pipeline
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Submission accepted
    Started { submission_id: String },

    /// A pipeline phase was entered
    PhaseStarted { phase: PipelinePhase },

    /// A pipeline phase finished
    PhaseComplete {
        phase: PipelinePhase,
        duration: Duration,
    },

    /// Redaction finished
    SanitizeComplete {
        files_removed: usize,
        files_modified: usize,
        issues: usize,
    },

    /// Generative request started
    GenerationStarted { task: TaskKind, iteration: u32 },

    /// Generative response received
    GenerationComplete {
        task: TaskKind,
        iteration: u32,
        response_time: Duration,
    },

    /// A self-healing iteration did not produce an accepted rewrite
    IterationFailed { iteration: u32, reason: String },

    /// Verification build triggered
    VerificationTriggered { iteration: u32, build_id: String },

    /// Verification build reached a terminal status
    VerificationComplete {
        iteration: u32,
        build_id: String,
        status: BuildStatus,
    },

    /// Pipeline completed successfully
    Completed {
        iterations: u32,
        total_time: Duration,
    },

    /// Pipeline failed
    Failed { phase: PipelinePhase, error: String },
}

/// Trait for handling pipeline progress events
pub trait ProgressHandler: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

/// No-op handler that ignores all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHandler;

impl ProgressHandler for NoOpHandler {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingHandler {
        count: Arc<AtomicUsize>,
    }

    impl ProgressHandler for CountingHandler {
        fn on_progress(&self, _event: &ProgressEvent) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_noop_handler() {
        NoOpHandler.on_progress(&ProgressEvent::Started {
            submission_id: "s".to_string(),
        });
    }

    #[test]
    fn test_progress_events() {
        let count = Arc::new(AtomicUsize::new(0));
        let handler = CountingHandler {
            count: count.clone(),
        };

        handler.on_progress(&ProgressEvent::Started {
            submission_id: "s".to_string(),
        });
        handler.on_progress(&ProgressEvent::PhaseStarted {
            phase: PipelinePhase::Auditing,
        });
        handler.on_progress(&ProgressEvent::Completed {
            iterations: 1,
            total_time: Duration::from_secs(5),
        });

        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_event_debug() {
        let event = ProgressEvent::GenerationStarted {
            task: TaskKind::Rewrite,
            iteration: 2,
        };
        let debug_str = format!("{:?}", event);
        assert!(debug_str.contains("GenerationStarted"));
        assert!(debug_str.contains("iteration: 2"));
    }
}
