//! Error types for the turn pipeline.

use aerochat_core::error::AeroError;

use crate::state_machine::TurnState;

/// Errors from the chat engine.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("intent classifier unavailable: {0}")]
    ClassifierUnavailable(String),
    #[error("malformed conversation history: {0}")]
    MalformedHistory(String),
    #[error("generation service error: {0}")]
    Generation(String),
    #[error("translation error: {0}")]
    Translation(String),
    #[error("unknown locale: {0}")]
    UnknownLocale(String),
    #[error("invalid turn transition: {0} -> {1}")]
    InvalidTransition(TurnState, TurnState),
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<AeroError> for ChatError {
    fn from(err: AeroError) -> Self {
        match err {
            AeroError::UnknownLocale(code) => ChatError::UnknownLocale(code),
            other => ChatError::Config(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        ChatError::Generation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_display() {
        let err = ChatError::ClassifierUnavailable("file not found".to_string());
        assert_eq!(
            err.to_string(),
            "intent classifier unavailable: file not found"
        );

        let err = ChatError::MalformedHistory("system turn missing".to_string());
        assert_eq!(
            err.to_string(),
            "malformed conversation history: system turn missing"
        );

        let err = ChatError::Generation("connection refused".to_string());
        assert_eq!(
            err.to_string(),
            "generation service error: connection refused"
        );

        let err = ChatError::MessageTooLong(2000);
        assert_eq!(
            err.to_string(),
            "message exceeds maximum length of 2000 characters"
        );
    }

    #[test]
    fn test_invalid_transition_names_states() {
        let err = ChatError::InvalidTransition(TurnState::Terminated, TurnState::Classifying);
        assert_eq!(
            err.to_string(),
            "invalid turn transition: terminated -> classifying"
        );
    }

    #[test]
    fn test_chat_error_from_aero_error() {
        let err: ChatError = AeroError::UnknownLocale("fr".to_string()).into();
        assert!(matches!(err, ChatError::UnknownLocale(ref c) if c == "fr"));

        let err: ChatError = AeroError::Config("bad".to_string()).into();
        assert!(matches!(err, ChatError::Config(_)));
        assert!(err.to_string().contains("bad"));
    }
}
