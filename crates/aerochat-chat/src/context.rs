//! Conversation context management.
//!
//! Holds the ordered turn history sent to the generation service: one pinned
//! system turn followed by the most recent user and assistant turns.

use aerochat_core::types::{Role, Turn};
use tracing::debug;

use crate::error::ChatError;

// =============================================================================
// ConversationContext
// =============================================================================

/// Bounded, ordered dialogue history with a pinned system turn.
///
/// The total number of turns, system turn included, never exceeds
/// `max_history` after an append. Eviction drops the oldest non-system turns
/// first and never summarizes.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationContext {
    turns: Vec<Turn>,
    max_history: usize,
}

impl ConversationContext {
    /// Create a context holding only the given system prompt.
    pub fn new(system_prompt: impl Into<String>, max_history: usize) -> Self {
        Self {
            turns: vec![Turn::system(system_prompt)],
            max_history,
        }
    }

    /// Build a context from raw turns, e.g. an imported transcript.
    ///
    /// No invariant is checked here; `validate` runs before the turns are
    /// sent anywhere.
    pub fn from_turns(turns: Vec<Turn>, max_history: usize) -> Self {
        Self { turns, max_history }
    }

    /// Replace every turn with a single system turn.
    pub fn reset(&mut self, system_prompt: impl Into<String>) {
        self.turns.clear();
        self.turns.push(Turn::system(system_prompt));
        debug!(max_history = self.max_history, "Conversation context reset");
    }

    pub fn append_user(&mut self, text: impl Into<String>) {
        self.turns.push(Turn::user(text));
        self.evict();
    }

    pub fn append_assistant(&mut self, text: impl Into<String>) {
        self.turns.push(Turn::assistant(text));
        self.evict();
    }

    /// Owned copy of the current turns, safe to hand to an external call.
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.clone()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.turns
            .first()
            .filter(|t| t.role() == Role::System)
            .map(|t| t.content())
    }

    /// Check the history before it leaves the process.
    ///
    /// Requires exactly one system turn, at index 0, and non-empty user turns.
    pub fn validate(&self) -> Result<(), ChatError> {
        match self.turns.first() {
            None => {
                return Err(ChatError::MalformedHistory(
                    "history is empty".to_string(),
                ))
            }
            Some(first) if first.role() != Role::System => {
                return Err(ChatError::MalformedHistory(format!(
                    "first turn has role {} instead of system",
                    first.role()
                )))
            }
            Some(_) => {}
        }

        for (index, turn) in self.turns.iter().enumerate().skip(1) {
            match turn.role() {
                Role::System => {
                    return Err(ChatError::MalformedHistory(format!(
                        "extra system turn at position {}",
                        index
                    )))
                }
                Role::User if turn.content().trim().is_empty() => {
                    return Err(ChatError::MalformedHistory(format!(
                        "empty user turn at position {}",
                        index
                    )))
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn evict(&mut self) {
        let pinned = usize::from(self.system_prompt().is_some());
        let mut evicted = 0usize;
        while self.turns.len() > self.max_history && self.turns.len() > pinned {
            self.turns.remove(pinned);
            evicted += 1;
        }
        if evicted > 0 {
            debug!(evicted, remaining = self.turns.len(), "Evicted oldest turns");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn contents(ctx: &ConversationContext) -> Vec<&str> {
        ctx.turns().iter().map(|t| t.content()).collect()
    }

    #[test]
    fn test_new_context_has_system_turn() {
        let ctx = ConversationContext::new("be brief", 10);
        assert_eq!(ctx.len(), 1);
        assert_eq!(ctx.system_prompt(), Some("be brief"));
        assert!(ctx.validate().is_ok());
    }

    #[test]
    fn test_reset_then_snapshot_is_single_system_turn() {
        let mut ctx = ConversationContext::new("old", 10);
        ctx.append_user("hi");
        ctx.append_assistant("hello");
        ctx.reset("new");
        assert_eq!(ctx.snapshot(), vec![Turn::system("new")]);
    }

    #[test]
    fn test_append_keeps_order() {
        let mut ctx = ConversationContext::new("sys", 10);
        ctx.append_user("A");
        ctx.append_assistant("B");
        assert_eq!(contents(&ctx), vec!["sys", "A", "B"]);
        assert_eq!(ctx.turns()[1].role(), Role::User);
        assert_eq!(ctx.turns()[2].role(), Role::Assistant);
    }

    #[test]
    fn test_eviction_literal_sequence() {
        let mut ctx = ConversationContext::new("sys", 4);
        ctx.append_user("A");
        ctx.append_assistant("B");
        ctx.append_user("C");
        ctx.append_assistant("D");
        assert_eq!(contents(&ctx), vec!["sys", "B", "C", "D"]);
        ctx.append_user("E");
        assert_eq!(contents(&ctx), vec!["sys", "C", "D", "E"]);
    }

    #[test]
    fn test_bounding_invariant_holds_for_long_runs() {
        for k in 2..8 {
            let mut ctx = ConversationContext::new("sys", k);
            for i in 0..50 {
                if i % 2 == 0 {
                    ctx.append_user(format!("u{}", i));
                } else {
                    ctx.append_assistant(format!("a{}", i));
                }
                assert!(ctx.len() <= k + 1);
                assert_eq!(ctx.turns()[0], Turn::system("sys"));
            }
        }
    }

    #[test]
    fn test_most_recent_turn_survives_eviction() {
        let mut ctx = ConversationContext::new("sys", 2);
        ctx.append_user("first");
        ctx.append_user("second");
        assert_eq!(contents(&ctx), vec!["sys", "second"]);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut ctx = ConversationContext::new("sys", 10);
        ctx.append_user("A");
        let snap = ctx.snapshot();
        ctx.append_assistant("B");
        assert_eq!(snap.len(), 2);
        assert_eq!(ctx.len(), 3);
    }

    #[test]
    fn test_validate_rejects_missing_system_turn() {
        let ctx = ConversationContext::from_turns(vec![Turn::user("hi")], 10);
        let err = ctx.validate().unwrap_err();
        assert!(matches!(err, ChatError::MalformedHistory(_)));
        assert!(err.to_string().contains("instead of system"));
    }

    #[test]
    fn test_validate_rejects_empty_history() {
        let ctx = ConversationContext::from_turns(vec![], 10);
        assert!(ctx.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_second_system_turn() {
        let ctx = ConversationContext::from_turns(
            vec![Turn::system("a"), Turn::user("hi"), Turn::system("b")],
            10,
        );
        let err = ctx.validate().unwrap_err();
        assert!(err.to_string().contains("position 2"));
    }

    #[test]
    fn test_validate_rejects_blank_user_turn() {
        let ctx = ConversationContext::from_turns(vec![Turn::system("a"), Turn::user("  ")], 10);
        assert!(ctx.validate().is_err());
    }

    #[test]
    fn test_validate_allows_empty_assistant_turn() {
        let ctx =
            ConversationContext::from_turns(vec![Turn::system("a"), Turn::assistant("")], 10);
        assert!(ctx.validate().is_ok());
    }

    #[test]
    fn test_eviction_without_system_turn_drops_front() {
        let mut ctx = ConversationContext::from_turns(vec![Turn::user("x")], 2);
        ctx.append_assistant("y");
        ctx.append_user("z");
        assert_eq!(contents(&ctx), vec!["y", "z"]);
    }
}
