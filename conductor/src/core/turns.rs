//! Turn-alternation guard for the manager's reasoning call.
//!
//! Some backends reject two consecutive assistant turns, or an injected
//! instruction directly after a tool result. These helpers keep the required
//! alternation: result -> assistant -> instruction.

use crate::core::types::{Message, Role};

/// Persisted user entry added when the previous turn ended in plain text.
pub const CONTINUE_PROMPT: &str =
    "Continue. Use your tools to make progress, or call git_commit when the work is done.";

/// Transient assistant acknowledgment placed between a result and an instruction.
pub const ACKNOWLEDGEMENT: &str = "Acknowledged.";

/// True when the last entry is an assistant turn without intents.
pub fn continuation_needed(history: &[Message]) -> bool {
    history.last().is_some_and(Message::is_plain_assistant)
}

/// Build the request view of `history` with a one-off instruction appended.
///
/// The returned vector is for a single reasoning call; `history` is untouched.
pub fn with_instruction(history: &[Message], instruction: &str) -> Vec<Message> {
    let mut messages = history.to_vec();
    if messages.last().is_some_and(|m| m.role == Role::Tool) {
        messages.push(Message::assistant(ACKNOWLEDGEMENT, Vec::new()));
    }
    messages.push(Message::user(instruction));
    messages
}

/// High-priority instruction injected while grace turns remain.
pub fn budget_instruction(tokens: usize, limit: usize, grace_remaining: u32) -> String {
    format!(
        "URGENT: the conversation is over its context budget (~{tokens} of {limit} tokens). \
         Persist your progress now (update IMPLEMENTATION_PLAN.md and AGENTS.md with what is \
         done and what remains), then call git_commit immediately. {grace_remaining} grace \
         turn(s) remain before the session is force-saved and terminated."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ToolCall;
    use serde_json::json;

    #[test]
    fn plain_assistant_tail_needs_continuation() {
        let history = vec![Message::system("s"), Message::assistant("thinking", Vec::new())];
        assert!(continuation_needed(&history));
    }

    #[test]
    fn assistant_with_intents_does_not_need_continuation() {
        let call = ToolCall::new("1", "list_dir", json!({}));
        let history = vec![Message::assistant("", vec![call])];
        assert!(!continuation_needed(&history));
        assert!(!continuation_needed(&[]));
    }

    #[test]
    fn instruction_after_result_gets_acknowledgment_first() {
        let history = vec![
            Message::assistant("", vec![ToolCall::new("1", "list_dir", json!({}))]),
            Message::tool_result("1", "[]"),
        ];
        let messages = with_instruction(&history, "save now");

        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::Assistant, Role::Tool, Role::Assistant, Role::User]
        );
        assert_eq!(messages[3].content, "save now");
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn instruction_after_user_entry_is_appended_directly() {
        let history = vec![Message::system("s"), Message::user("go")];
        let messages = with_instruction(&history, "save now");
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[2].role, Role::User);
    }
}
