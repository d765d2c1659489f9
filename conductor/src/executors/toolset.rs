//! Executor tools and the per-capability toolsets.
//!
//! Tool invocation never fails across this boundary: every error is rendered
//! into the result string the executor's reasoning loop sees next.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::core::types::{Capability, ToolCall, ToolSpec};
use crate::error::{ExecutionError, ToolError, ValidationError};
use crate::executors::ExecutorContext;
use crate::io::workspace::{Access, WriteMode};
use crate::logging::preview;

pub const READ_FILE: &str = "read_file";
pub const WRITE_FILE: &str = "write_file";
pub const LIST_DIR: &str = "list_dir";
pub const RUN_COMMAND: &str = "run_command";
pub const LOOKUP_DOCS: &str = "lookup_docs";

/// A parsed executor tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tool {
    ReadFile {
        path: String,
    },
    WriteFile {
        path: String,
        content: String,
        mode: WriteMode,
    },
    ListDir {
        path: String,
    },
    RunCommand {
        command: String,
        timeout: Option<u64>,
        background: bool,
    },
    LookupDocs {
        library: String,
        query: String,
    },
}

#[derive(Deserialize)]
struct PathArgs {
    path: String,
}

#[derive(Deserialize)]
struct ListArgs {
    #[serde(default)]
    path: Option<String>,
}

#[derive(Deserialize)]
struct WriteArgs {
    path: String,
    content: String,
    #[serde(default)]
    mode: WriteMode,
}

#[derive(Deserialize)]
struct CommandArgs {
    command: String,
    #[serde(default)]
    timeout: Option<u64>,
    #[serde(default)]
    background: bool,
}

#[derive(Deserialize)]
struct DocsArgs {
    library: String,
    query: String,
}

impl Tool {
    /// Parse a raw call. Unknown names and bad arguments are validation errors.
    pub fn parse(call: &ToolCall) -> Result<Self, ValidationError> {
        let name = call.name.as_str();
        match name {
            READ_FILE => args::<PathArgs>(name, &call.arguments).map(|a| Tool::ReadFile { path: a.path }),
            WRITE_FILE => args::<WriteArgs>(name, &call.arguments).map(|a| Tool::WriteFile {
                path: a.path,
                content: a.content,
                mode: a.mode,
            }),
            LIST_DIR => args::<ListArgs>(name, &call.arguments).map(|a| Tool::ListDir {
                path: a.path.unwrap_or_else(|| ".".to_string()),
            }),
            RUN_COMMAND => args::<CommandArgs>(name, &call.arguments).map(|a| Tool::RunCommand {
                command: a.command,
                timeout: a.timeout,
                background: a.background,
            }),
            LOOKUP_DOCS => args::<DocsArgs>(name, &call.arguments).map(|a| Tool::LookupDocs {
                library: a.library,
                query: a.query,
            }),
            other => Err(ValidationError::UnknownCapability {
                name: other.to_string(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Tool::ReadFile { .. } => READ_FILE,
            Tool::WriteFile { .. } => WRITE_FILE,
            Tool::ListDir { .. } => LIST_DIR,
            Tool::RunCommand { .. } => RUN_COMMAND,
            Tool::LookupDocs { .. } => LOOKUP_DOCS,
        }
    }
}

fn args<T: DeserializeOwned>(name: &str, arguments: &Value) -> Result<T, ValidationError> {
    let empty = Value::Object(Default::default());
    let arguments = if arguments.is_null() {
        &empty
    } else {
        arguments
    };
    T::deserialize(arguments).map_err(|err| ValidationError::MalformedArguments {
        name: name.to_string(),
        reason: err.to_string(),
    })
}

/// Tool names available to a capability.
pub fn tool_names(capability: Capability) -> &'static [&'static str] {
    match capability {
        Capability::FileEdit | Capability::Admin => &[READ_FILE, WRITE_FILE, LIST_DIR],
        Capability::Shell => &[RUN_COMMAND],
        Capability::Research => &[LOOKUP_DOCS],
    }
}

/// Tool declarations offered to an executor's reasoning call.
pub fn tool_specs(capability: Capability) -> Vec<ToolSpec> {
    tool_names(capability)
        .iter()
        .map(|name| spec_for(name))
        .collect()
}

fn spec_for(name: &str) -> ToolSpec {
    let (description, parameters) = match name {
        READ_FILE => (
            "Read a file from the workspace.",
            json!({
                "type": "object",
                "properties": {"path": {"type": "string"}},
                "required": ["path"]
            }),
        ),
        WRITE_FILE => (
            "Write content to a file in the workspace. mode is 'overwrite' (default) or 'append'.",
            json!({
                "type": "object",
                "properties": {
                    "path": {"type": "string"},
                    "content": {"type": "string"},
                    "mode": {"type": "string", "enum": ["overwrite", "append"]}
                },
                "required": ["path", "content"]
            }),
        ),
        LIST_DIR => (
            "List the entries of a workspace directory.",
            json!({
                "type": "object",
                "properties": {"path": {"type": "string"}}
            }),
        ),
        RUN_COMMAND => (
            "Run a shell command in the workspace. Set background to start it detached without capturing output.",
            json!({
                "type": "object",
                "properties": {
                    "command": {"type": "string"},
                    "timeout": {"type": "integer", "minimum": 1, "description": "Seconds to wait."},
                    "background": {"type": "boolean"}
                },
                "required": ["command"]
            }),
        ),
        _ => (
            "Fetch up-to-date documentation snippets for a library.",
            json!({
                "type": "object",
                "properties": {
                    "library": {"type": "string", "description": "Library name, e.g. 'tokio'."},
                    "query": {"type": "string", "description": "What to look up."}
                },
                "required": ["library", "query"]
            }),
        ),
    };
    ToolSpec {
        name: name.to_string(),
        description: description.to_string(),
        parameters,
    }
}

/// Run one tool call for `capability` and render the outcome as text.
pub fn invoke(ctx: &ExecutorContext, capability: Capability, call: &ToolCall) -> String {
    info!(
        tool = %call.name,
        args = %preview(&call.arguments.to_string(), 500),
        capability = capability.as_str(),
        "tool call"
    );
    let result = if tool_names(capability).contains(&call.name.as_str()) {
        Tool::parse(call)
            .map_err(ToolError::from)
            .and_then(|tool| execute(ctx, capability, tool))
    } else {
        Ok(format!(
            "Error: tool '{}' is not available to this executor",
            call.name
        ))
    };
    match result {
        Ok(text) => {
            info!(tool = %call.name, output = %preview(&text, 500), "tool result");
            text
        }
        Err(err) => {
            warn!(tool = %call.name, err = %err, "tool error");
            err.to_result_string()
        }
    }
}

fn execute(ctx: &ExecutorContext, capability: Capability, tool: Tool) -> Result<String, ToolError> {
    let access = match capability {
        Capability::Admin => Access::Privileged,
        _ => Access::Standard,
    };
    match tool {
        Tool::ReadFile { path } => ctx.workspace.read_file(&path),
        Tool::WriteFile {
            path,
            content,
            mode,
        } => ctx.workspace.write_file(&path, &content, mode, access),
        Tool::ListDir { path } => ctx.workspace.list_dir(&path),
        Tool::RunCommand {
            command,
            timeout,
            background,
        } => ctx.shell.run(&command, timeout, background),
        Tool::LookupDocs { library, query } => ctx
            .docs
            .lookup(&library, &query)
            .map_err(|e| ExecutionError::Failed(format!("documentation lookup failed: {e:#}")).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{TestWorkspace, executor_context, scripted_backend};

    fn call(name: &str, arguments: Value) -> ToolCall {
        ToolCall::new("t1", name, arguments)
    }

    #[test]
    fn write_mode_defaults_to_overwrite() {
        let tool = Tool::parse(&call(WRITE_FILE, json!({"path": "a", "content": "x"}))).expect("parse");
        assert_eq!(
            tool,
            Tool::WriteFile {
                path: "a".to_string(),
                content: "x".to_string(),
                mode: WriteMode::Overwrite
            }
        );
    }

    #[test]
    fn bad_write_mode_is_malformed() {
        let err = Tool::parse(&call(
            WRITE_FILE,
            json!({"path": "a", "content": "x", "mode": "truncate"}),
        ))
        .unwrap_err();
        assert!(matches!(err, ValidationError::MalformedArguments { .. }));
    }

    #[test]
    fn tool_outside_toolset_is_refused_without_running() {
        let ws = TestWorkspace::new().expect("ws");
        let ctx = executor_context(&ws, scripted_backend(Vec::new()));
        let out = invoke(
            &ctx,
            Capability::Research,
            &call(WRITE_FILE, json!({"path": "a.txt", "content": "x"})),
        );
        assert_eq!(out, "Error: tool 'write_file' is not available to this executor");
        assert!(!ws.path().join("a.txt").exists());
    }

    #[test]
    fn file_edit_cannot_write_protected_paths_but_admin_can() {
        let ws = TestWorkspace::new().expect("ws");
        let ctx = executor_context(&ws, scripted_backend(Vec::new()));
        let write = call(WRITE_FILE, json!({"path": "specs/a.md", "content": "x"}));

        let denied = invoke(&ctx, Capability::FileEdit, &write);
        assert!(denied.starts_with("Error: Access denied"), "{denied}");

        let allowed = invoke(&ctx, Capability::Admin, &write);
        assert!(allowed.starts_with("Successfully wrote"), "{allowed}");
    }

    #[test]
    fn escape_attempt_is_rendered_as_error() {
        let ws = TestWorkspace::new().expect("ws");
        let ctx = executor_context(&ws, scripted_backend(Vec::new()));
        let out = invoke(&ctx, Capability::FileEdit, &call(READ_FILE, json!({"path": "../../etc/passwd"})));
        assert!(out.contains("resolves outside the workspace"), "{out}");
    }

    #[test]
    fn research_uses_docs_source() {
        let ws = TestWorkspace::new().expect("ws");
        let ctx = executor_context(&ws, scripted_backend(Vec::new()));
        let out = invoke(
            &ctx,
            Capability::Research,
            &call(LOOKUP_DOCS, json!({"library": "tokio", "query": "spawn"})),
        );
        assert!(out.contains("tokio"), "{out}");
    }

    #[test]
    fn toolsets_are_disjoint_where_required() {
        assert_eq!(tool_names(Capability::Shell), &[RUN_COMMAND]);
        assert_eq!(tool_names(Capability::Research), &[LOOKUP_DOCS]);
        assert_eq!(tool_specs(Capability::FileEdit).len(), 3);
    }
}
