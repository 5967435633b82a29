//! Turn state machine with validated transitions.
//!
//! One utterance moves through:
//! AwaitingInput -> Classifying -> TelemetryBranch | QaBranch -> AwaitingInput
//!
//! LanguageReset and Terminated are reachable from every live state.
//! Terminated has no way out.

use std::fmt;

use crate::error::ChatError;

/// Where the orchestrator is in handling the current utterance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TurnState {
    AwaitingInput,
    Classifying,
    TelemetryBranch,
    QaBranch,
    LanguageReset,
    Terminated,
}

impl TurnState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnState::Terminated)
    }
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnState::AwaitingInput => write!(f, "awaiting_input"),
            TurnState::Classifying => write!(f, "classifying"),
            TurnState::TelemetryBranch => write!(f, "telemetry_branch"),
            TurnState::QaBranch => write!(f, "qa_branch"),
            TurnState::LanguageReset => write!(f, "language_reset"),
            TurnState::Terminated => write!(f, "terminated"),
        }
    }
}

/// Validate that a state transition is allowed.
///
/// Valid transitions:
/// - AwaitingInput -> Classifying
/// - Classifying -> TelemetryBranch | QaBranch
/// - Classifying | TelemetryBranch | QaBranch -> AwaitingInput
/// - LanguageReset -> AwaitingInput
/// - any live state except LanguageReset -> LanguageReset
/// - any live state -> Terminated
pub fn validate_transition(from: TurnState, to: TurnState) -> Result<(), ChatError> {
    use TurnState::*;

    let valid = match (from, to) {
        (Terminated, _) => false,
        (_, Terminated) => true,
        (LanguageReset, LanguageReset) => false,
        (_, LanguageReset) => true,
        (AwaitingInput, Classifying)
        | (Classifying, TelemetryBranch)
        | (Classifying, QaBranch)
        | (Classifying, AwaitingInput)
        | (TelemetryBranch, AwaitingInput)
        | (QaBranch, AwaitingInput)
        | (LanguageReset, AwaitingInput) => true,
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(ChatError::InvalidTransition(from, to))
    }
}
