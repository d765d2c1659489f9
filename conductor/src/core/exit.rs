//! Completion-signal detection.

use crate::core::intent::GIT_COMMIT;
use crate::core::types::{Message, Role};

/// True iff the most recent assistant entry declared the completion intent.
///
/// Result and user entries after that assistant entry are skipped; older
/// assistant entries are never consulted.
pub fn completion_requested(history: &[Message]) -> bool {
    history
        .iter()
        .rev()
        .find(|message| message.role == Role::Assistant)
        .is_some_and(|message| {
            message
                .tool_calls
                .iter()
                .any(|call| call.name == GIT_COMMIT)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ToolCall;
    use serde_json::json;

    fn commit_turn() -> Message {
        Message::assistant(
            "",
            vec![
                ToolCall::new("1", "read_file", json!({"path": "a"})),
                ToolCall::new("2", GIT_COMMIT, json!({"message": "done"})),
            ],
        )
    }

    #[test]
    fn fires_when_latest_assistant_turn_commits() {
        let history = vec![
            Message::system("s"),
            commit_turn(),
            Message::tool_result("1", "a"),
            Message::tool_result("2", "committed"),
        ];
        assert!(completion_requested(&history));
    }

    #[test]
    fn ignores_commit_in_earlier_history() {
        let history = vec![
            commit_turn(),
            Message::tool_result("2", "committed"),
            Message::assistant("", vec![ToolCall::new("3", "list_dir", json!({}))]),
            Message::tool_result("3", "[]"),
        ];
        assert!(!completion_requested(&history));
    }

    #[test]
    fn plain_text_turn_does_not_fire() {
        let history = vec![commit_turn(), Message::assistant("all done", Vec::new())];
        assert!(!completion_requested(&history));
        assert!(!completion_requested(&[]));
    }
}
