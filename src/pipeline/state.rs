use serde::Serialize;
use std::fmt;

/// Lifecycle of a submission
///
/// `PENDING -> UPLOADED -> AUDITING -> REFACTORING <-> VALIDATING -> COMPLETED`,
/// with FAILED reachable from every non-terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelinePhase {
    Pending,
    Uploaded,
    Auditing,
    Refactoring,
    Validating,
    Completed,
    Failed,
}

impl PipelinePhase {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelinePhase::Pending => "pending",
            PipelinePhase::Uploaded => "uploaded",
            PipelinePhase::Auditing => "auditing",
            PipelinePhase::Refactoring => "refactoring",
            PipelinePhase::Validating => "validating",
            PipelinePhase::Completed => "completed",
            PipelinePhase::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PipelinePhase::Completed | PipelinePhase::Failed)
    }

    pub fn can_transition_to(self, next: PipelinePhase) -> bool {
        use PipelinePhase::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Pending, Uploaded)
            | (Uploaded, Auditing)
            | (Auditing, Refactoring)
            | (Refactoring, Validating)
            | (Validating, Refactoring)
            | (Validating, Completed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for PipelinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress record of one submission, written only by the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineState {
    pub phase: PipelinePhase,
    pub completed_phases: Vec<PipelinePhase>,
    pub last_error: Option<String>,
    pub iteration: u32,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineState {
    pub fn new() -> Self {
        Self {
            phase: PipelinePhase::Pending,
            completed_phases: Vec::new(),
            last_error: None,
            iteration: 0,
        }
    }

    /// Moves to `next`, recording the current phase as completed.
    ///
    /// Returns false and leaves the state untouched for a transition the
    /// lifecycle does not allow.
    pub fn advance(&mut self, next: PipelinePhase) -> bool {
        if !self.phase.can_transition_to(next) {
            return false;
        }
        if next != PipelinePhase::Failed && !self.completed_phases.contains(&self.phase) {
            self.completed_phases.push(self.phase);
        }
        self.phase = next;
        true
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.last_error = Some(error.into());
        self.advance(PipelinePhase::Failed);
    }
}
