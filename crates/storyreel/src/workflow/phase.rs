//! Job lifecycle phases and the transitions between them.
//!
//! ```text
//! PROMPT_ENHANCEMENT --enhance--> CONFIRMATION --enhance/regenerate--> CONFIRMATION
//! CONFIRMATION --confirm(true)--> GENERATION --succeeded--> COMPLETED
//! CONFIRMATION --confirm(false)--> CANCELLED  GENERATION --failed--> FAILED
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::workflow::job::JobStatus;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    PromptEnhancement,
    Confirmation,
    Generation,
    Completed,
    Cancelled,
    Failed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::PromptEnhancement => "PROMPT_ENHANCEMENT",
            Phase::Confirmation => "CONFIRMATION",
            Phase::Generation => "GENERATION",
            Phase::Completed => "COMPLETED",
            Phase::Cancelled => "CANCELLED",
            Phase::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PROMPT_ENHANCEMENT" => Some(Phase::PromptEnhancement),
            "CONFIRMATION" => Some(Phase::Confirmation),
            "GENERATION" => Some(Phase::Generation),
            "COMPLETED" => Some(Phase::Completed),
            "CANCELLED" => Some(Phase::Cancelled),
            "FAILED" => Some(Phase::Failed),
            _ => None,
        }
    }

    /// Terminal phases accept no further mutation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed | Phase::Cancelled | Phase::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An operation that reads or changes a job's lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Enhance,
    Confirm,
    Cancel,
    StartGeneration,
    RegenerateScenes,
    /// Pipeline bookkeeping while a run is in flight.
    RecordProgress,
    CompleteGeneration,
    FailGeneration,
    GetResult,
    /// Dropping the record; refused while a run is in flight.
    Cleanup,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Enhance => "enhance",
            Operation::Confirm => "confirm",
            Operation::Cancel => "cancel",
            Operation::StartGeneration => "start generation",
            Operation::RegenerateScenes => "regenerate scenes",
            Operation::RecordProgress => "record progress",
            Operation::CompleteGeneration => "complete generation",
            Operation::FailGeneration => "fail generation",
            Operation::GetResult => "get result",
            Operation::Cleanup => "clean up",
        };
        f.write_str(name)
    }
}

/// An operation was invoked from a phase that does not allow it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cannot {operation} job {job_id} in phase {phase}")]
pub struct InvalidStateTransition {
    pub job_id: String,
    pub operation: Operation,
    pub phase: Phase,
}

/// Returns the phase reached by applying `operation` in `phase`, or `None` if the
/// operation is not allowed there.
pub fn next_phase(phase: Phase, operation: Operation) -> Option<Phase> {
    use Operation::*;
    use Phase::*;

    match (phase, operation) {
        (PromptEnhancement, Enhance) | (Confirmation, Enhance) => Some(Confirmation),
        (Confirmation, RegenerateScenes) => Some(Confirmation),
        (Confirmation, Confirm) => Some(Generation),
        (Confirmation, Cancel) => Some(Cancelled),
        (Generation, StartGeneration) | (Generation, RecordProgress) => Some(Generation),
        (Generation, CompleteGeneration) => Some(Completed),
        (Generation, FailGeneration) => Some(Failed),
        (Completed, GetResult) => Some(Completed),
        _ => None,
    }
}

/// Checked form of [`next_phase`].
pub fn transition(
    job_id: &str,
    phase: Phase,
    operation: Operation,
) -> Result<Phase, InvalidStateTransition> {
    next_phase(phase, operation).ok_or_else(|| InvalidStateTransition {
        job_id: job_id.to_string(),
        operation,
        phase,
    })
}

/// Status a job carries after entering `phase`. Generation is `Active` until a run starts.
pub fn status_for(phase: Phase, running: bool) -> JobStatus {
    match phase {
        Phase::PromptEnhancement | Phase::Confirmation => JobStatus::Active,
        Phase::Generation if running => JobStatus::Processing,
        Phase::Generation => JobStatus::Active,
        Phase::Completed => JobStatus::Completed,
        Phase::Cancelled => JobStatus::Cancelled,
        Phase::Failed => JobStatus::Failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_PHASES: [Phase; 6] = [
        Phase::PromptEnhancement,
        Phase::Confirmation,
        Phase::Generation,
        Phase::Completed,
        Phase::Cancelled,
        Phase::Failed,
    ];

    const MUTATING: [Operation; 8] = [
        Operation::Enhance,
        Operation::Confirm,
        Operation::Cancel,
        Operation::StartGeneration,
        Operation::RegenerateScenes,
        Operation::RecordProgress,
        Operation::CompleteGeneration,
        Operation::FailGeneration,
    ];

    #[test]
    fn test_happy_path() {
        let p = transition("j", Phase::PromptEnhancement, Operation::Enhance).unwrap();
        assert_eq!(p, Phase::Confirmation);
        let p = transition("j", p, Operation::Confirm).unwrap();
        assert_eq!(p, Phase::Generation);
        let p = transition("j", p, Operation::StartGeneration).unwrap();
        assert_eq!(p, Phase::Generation);
        let p = transition("j", p, Operation::CompleteGeneration).unwrap();
        assert_eq!(p, Phase::Completed);
    }

    #[test]
    fn test_enhance_is_reenterable() {
        assert_eq!(
            next_phase(Phase::Confirmation, Operation::Enhance),
            Some(Phase::Confirmation)
        );
    }

    #[test]
    fn test_cancel_only_from_confirmation() {
        assert_eq!(
            next_phase(Phase::Confirmation, Operation::Cancel),
            Some(Phase::Cancelled)
        );
        assert!(next_phase(Phase::PromptEnhancement, Operation::Cancel).is_none());
        assert!(next_phase(Phase::Generation, Operation::Cancel).is_none());
    }

    #[test]
    fn test_terminal_phases_reject_every_mutation() {
        for phase in ALL_PHASES.iter().filter(|p| p.is_terminal()) {
            for op in MUTATING {
                assert!(
                    next_phase(*phase, op).is_none(),
                    "{} should reject {}",
                    phase,
                    op
                );
            }
        }
    }

    #[test]
    fn test_get_result_only_when_completed() {
        for phase in ALL_PHASES {
            let allowed = next_phase(phase, Operation::GetResult).is_some();
            assert_eq!(allowed, phase == Phase::Completed);
        }
    }

    #[test]
    fn test_invalid_transition_message() {
        let err = transition("job-1", Phase::Cancelled, Operation::GetResult).unwrap_err();
        assert_eq!(err.phase, Phase::Cancelled);
        assert_eq!(err.to_string(), "Cannot get result job job-1 in phase CANCELLED");
    }

    #[test]
    fn test_phase_round_trips_through_str() {
        for phase in ALL_PHASES {
            assert_eq!(Phase::parse(phase.as_str()), Some(phase));
        }
        assert_eq!(Phase::parse("bogus"), None);
    }

    #[test]
    fn test_status_for_generation() {
        assert_eq!(status_for(Phase::Generation, false), JobStatus::Active);
        assert_eq!(status_for(Phase::Generation, true), JobStatus::Processing);
        assert_eq!(status_for(Phase::Failed, true), JobStatus::Failed);
    }
}
