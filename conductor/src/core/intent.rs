//! Typed intents parsed from the manager's raw tool calls.
//!
//! Intent names are matched exhaustively into [`IntentKind`]; anything else
//! lands in [`IntentKind::Unknown`], and a known name with unusable arguments
//! lands in [`IntentKind::Invalid`]. Parsing never fails.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::core::types::{ToolCall, ToolSpec};

pub const PLAN_TASKS: &str = "plan_tasks";
pub const RUN_SHELL: &str = "run_shell";
pub const ADMIN_TASK: &str = "admin_task";
pub const RESEARCH: &str = "research";
pub const READ_FILE: &str = "read_file";
pub const LIST_DIR: &str = "list_dir";
/// The completion signal. Its presence in the latest assistant turn ends the session.
pub const GIT_COMMIT: &str = "git_commit";

/// Classified intent payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentKind {
    /// Bulk delegation: one file-editing task per description.
    Plan { tasks: Vec<String> },
    Shell { instructions: String },
    Admin { instructions: String },
    Research { question: String },
    ReadFile { path: String },
    ListDir { path: String },
    Commit { message: String },
    /// Known intent name with malformed arguments.
    Invalid { name: String, reason: String },
    Unknown { name: String },
}

/// A single declared action from the manager, carrying its unique id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intent {
    pub id: String,
    pub kind: IntentKind,
}

impl Intent {
    pub fn from_call(call: &ToolCall) -> Self {
        Self {
            id: call.id.clone(),
            kind: classify_call(&call.name, &call.arguments),
        }
    }
}

/// Parse every call of an assistant turn, preserving emission order.
pub fn intents_from_calls(calls: &[ToolCall]) -> Vec<Intent> {
    calls.iter().map(Intent::from_call).collect()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PlanEntry {
    Text(String),
    Described { description: String },
}

#[derive(Deserialize)]
struct PlanArgs {
    tasks: Vec<PlanEntry>,
}

#[derive(Deserialize)]
struct InstructionArgs {
    instructions: String,
}

#[derive(Deserialize)]
struct ResearchArgs {
    question: String,
}

#[derive(Deserialize)]
struct PathArgs {
    path: String,
}

#[derive(Deserialize)]
struct OptionalPathArgs {
    #[serde(default)]
    path: Option<String>,
}

#[derive(Deserialize)]
struct CommitArgs {
    message: String,
}

fn classify_call(name: &str, arguments: &Value) -> IntentKind {
    let parsed = match name {
        PLAN_TASKS => parse::<PlanArgs>(arguments).and_then(|args| {
            let tasks: Vec<String> = args
                .tasks
                .into_iter()
                .map(|entry| match entry {
                    PlanEntry::Text(text) => text,
                    PlanEntry::Described { description } => description,
                })
                .collect();
            if tasks.is_empty() {
                return Err("tasks must list at least one description".to_string());
            }
            if tasks.iter().any(|task| task.trim().is_empty()) {
                return Err("task descriptions must be non-empty".to_string());
            }
            Ok(IntentKind::Plan { tasks })
        }),
        RUN_SHELL => parse::<InstructionArgs>(arguments)
            .and_then(|args| non_empty("instructions", args.instructions))
            .map(|instructions| IntentKind::Shell { instructions }),
        ADMIN_TASK => parse::<InstructionArgs>(arguments)
            .and_then(|args| non_empty("instructions", args.instructions))
            .map(|instructions| IntentKind::Admin { instructions }),
        RESEARCH => parse::<ResearchArgs>(arguments)
            .and_then(|args| non_empty("question", args.question))
            .map(|question| IntentKind::Research { question }),
        READ_FILE => parse::<PathArgs>(arguments).map(|args| IntentKind::ReadFile { path: args.path }),
        LIST_DIR => parse::<OptionalPathArgs>(arguments).map(|args| IntentKind::ListDir {
            path: args.path.unwrap_or_else(|| ".".to_string()),
        }),
        GIT_COMMIT => parse::<CommitArgs>(arguments)
            .and_then(|args| non_empty("message", args.message))
            .map(|message| IntentKind::Commit { message }),
        other => {
            return IntentKind::Unknown {
                name: other.to_string(),
            };
        }
    };

    parsed.unwrap_or_else(|reason| IntentKind::Invalid {
        name: name.to_string(),
        reason,
    })
}

fn parse<T: DeserializeOwned>(arguments: &Value) -> Result<T, String> {
    // Some backends send `null` for argument-less calls.
    let empty = Value::Object(Default::default());
    let arguments = if arguments.is_null() {
        &empty
    } else {
        arguments
    };
    T::deserialize(arguments).map_err(|err| err.to_string())
}

fn non_empty(field: &str, value: String) -> Result<String, String> {
    if value.trim().is_empty() {
        return Err(format!("{field} must be non-empty"));
    }
    Ok(value)
}

/// Intent schema declared to the manager's reasoning call.
pub fn manager_tool_specs() -> Vec<ToolSpec> {
    vec![
        spec(
            PLAN_TASKS,
            "Delegate file-editing work to parallel workers, one worker per task description.",
            json!({
                "type": "object",
                "properties": {
                    "tasks": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Self-contained task descriptions, one per worker."
                    }
                },
                "required": ["tasks"]
            }),
        ),
        spec(
            RUN_SHELL,
            "Delegate shell work (build, test, install) to a command worker. At most one per turn.",
            instructions_schema(),
        ),
        spec(
            ADMIN_TASK,
            "Delegate privileged file maintenance, including protected paths, to an admin worker.",
            instructions_schema(),
        ),
        spec(
            RESEARCH,
            "Ask a research worker to look up up-to-date library documentation.",
            json!({
                "type": "object",
                "properties": {
                    "question": {"type": "string", "description": "What to find out."}
                },
                "required": ["question"]
            }),
        ),
        spec(
            READ_FILE,
            "Read a file from the workspace.",
            path_schema(true),
        ),
        spec(
            LIST_DIR,
            "List the entries of a workspace directory.",
            path_schema(false),
        ),
        spec(
            GIT_COMMIT,
            "Commit all workspace changes. Ends the session; a fresh session starts afterwards.",
            json!({
                "type": "object",
                "properties": {
                    "message": {"type": "string", "description": "Commit message."}
                },
                "required": ["message"]
            }),
        ),
    ]
}

fn spec(name: &str, description: &str, parameters: Value) -> ToolSpec {
    ToolSpec {
        name: name.to_string(),
        description: description.to_string(),
        parameters,
    }
}

fn instructions_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "instructions": {"type": "string", "description": "What the worker must achieve."}
        },
        "required": ["instructions"]
    })
}

fn path_schema(required: bool) -> Value {
    let required: Vec<&str> = if required { vec!["path"] } else { Vec::new() };
    json!({
        "type": "object",
        "properties": {
            "path": {"type": "string", "description": "Path relative to the workspace root."}
        },
        "required": required
    })
}
