//! Error taxonomy for the orchestration loop.
//!
//! Two families exist and they travel differently:
//!
//! - **Recoverable** ([`ValidationError`], [`ExecutionError`], joined as
//!   [`ToolError`]): raised inside tools, executors and synchronous dispatcher
//!   actions, then rendered into a result string the manager sees next turn.
//!   They never cross the tool boundary as `Err`.
//! - **Fatal** ([`BudgetExceeded`], [`ReasoningCallError`]): abort the turn and
//!   travel inside `anyhow::Error` up to the binary, which picks an exit code
//!   via `downcast_ref`.

use std::io;

use thiserror::Error;

/// Rejected input: bad path, bad arguments, or an unrecognized capability.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Access denied: '{path}' resolves outside the workspace")]
    PathEscapesRoot { path: String },
    #[error("Access denied: '{path}' is protected and requires the admin executor")]
    ProtectedPath { path: String },
    #[error("Access denied: '{path}' is inside the orchestrator state directory")]
    ReservedPath { path: String },
    #[error("invalid arguments for '{name}': {reason}")]
    MalformedArguments { name: String, reason: String },
    #[error("unknown capability '{name}'")]
    UnknownCapability { name: String },
}

/// An underlying file, process or network operation failed.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
    #[error(
        "command timed out after {secs} seconds. Consider increasing the timeout or breaking the task into smaller steps"
    )]
    TimedOut { secs: u64 },
    #[error("{0}")]
    Failed(String),
}

impl ExecutionError {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// Anything a tool can fail with. Always rendered to text at the boundary.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

impl ToolError {
    /// Render as the labeled error string folded into history.
    pub fn to_result_string(&self) -> String {
        format!("Error: {self}")
    }
}

/// Hard token-budget overrun: grace turns are exhausted.
#[derive(Debug, Error)]
#[error("token budget exhausted: ~{tokens} tokens against a limit of {limit} with no grace turns left")]
pub struct BudgetExceeded {
    pub tokens: usize,
    pub limit: usize,
}

/// The reasoning backend failed or timed out; the turn is aborted.
#[derive(Debug, Error)]
#[error("reasoning call failed: {source:#}")]
pub struct ReasoningCallError {
    #[source]
    pub source: anyhow::Error,
}
