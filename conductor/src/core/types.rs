//! Shared deterministic types for the orchestration core.
//!
//! These types define stable contracts between the manager, dispatcher,
//! executors and reducer. They serialize into checkpoints and backend requests,
//! so field names are part of the on-disk and wire format.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Author of a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    /// Result of an intent or tool call.
    Tool,
}

/// A raw action request emitted by the reasoning call.
///
/// For the manager these are intents; inside an executor they are tool calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// One entry of the conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls,
            tool_call_id: None,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
        }
    }

    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// True for an assistant entry that ended in plain text (no intents).
    pub fn is_plain_assistant(&self) -> bool {
        self.role == Role::Assistant && self.tool_calls.is_empty()
    }
}

/// The reasoning call's reply: text and/or tool calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssistantTurn {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

impl AssistantTurn {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: None,
            tool_calls,
        }
    }

    pub fn into_message(self) -> Message {
        Message::assistant(self.content.unwrap_or_default(), self.tool_calls)
    }
}

/// A tool declaration offered to the reasoning call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema for the arguments object.
    pub parameters: Value,
}

/// Bounded category of delegated work. Each maps to one executor variant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    FileEdit,
    Admin,
    Shell,
    Research,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::FileEdit => "file_edit",
            Capability::Admin => "admin",
            Capability::Shell => "shell",
            Capability::Research => "research",
        }
    }
}

/// Lifecycle of a queued task within one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Done,
    Failed,
}

/// Executable unit derived from an intent. Lives for one turn only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub capability: Capability,
    pub description: String,
    pub status: TaskStatus,
}

impl Task {
    pub fn pending(
        id: impl Into<String>,
        capability: Capability,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            capability,
            description: description.into(),
            status: TaskStatus::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_serialization_omits_empty_fields() {
        let msg = Message::user("hello");
        let encoded = serde_json::to_string(&msg).expect("encode");
        assert_eq!(encoded, r#"{"role":"user","content":"hello"}"#);
    }

    #[test]
    fn assistant_turn_parses_without_content() {
        let turn: AssistantTurn = serde_json::from_value(json!({
            "tool_calls": [{"id": "c1", "name": "list_dir"}]
        }))
        .expect("decode");
        assert_eq!(turn.content, None);
        assert_eq!(turn.tool_calls[0].arguments, Value::Null);

        let msg = turn.into_message();
        assert_eq!(msg.role, Role::Assistant);
        assert!(!msg.is_plain_assistant());
    }

    #[test]
    fn capability_orders_deterministically() {
        let mut caps = vec![
            Capability::Research,
            Capability::Shell,
            Capability::FileEdit,
            Capability::Admin,
        ];
        caps.sort();
        assert_eq!(
            caps,
            vec![
                Capability::FileEdit,
                Capability::Admin,
                Capability::Shell,
                Capability::Research
            ]
        );
    }
}
