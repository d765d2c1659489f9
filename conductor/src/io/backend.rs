//! Reasoning backend abstraction.
//!
//! The [`ReasoningBackend`] trait decouples orchestration from the actual
//! text-generation service. [`CommandBackend`] bridges to any program that
//! reads a JSON request on stdin and prints a JSON reply; tests use scripted
//! backends that return predetermined turns without spawning processes.

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::core::types::{AssistantTurn, Message, Role, ToolSpec};
use crate::io::config::BackendConfig;
use crate::io::process::Bounded;

/// One reasoning call: conversation so far plus the declared tools.
#[derive(Debug, Clone, Serialize)]
pub struct ReasoningRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSpec>,
}

impl ReasoningRequest {
    /// Content of the first system message, if any.
    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
    }
}

/// Maps a conversation to the next assistant turn.
///
/// Shared across executor threads, hence `Send + Sync`.
pub trait ReasoningBackend: Send + Sync {
    fn complete(&self, request: &ReasoningRequest) -> Result<AssistantTurn>;
}

/// Backend that spawns a configured command per request.
#[derive(Debug, Clone)]
pub struct CommandBackend {
    program: String,
    args: Vec<String>,
    workdir: PathBuf,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl CommandBackend {
    pub fn from_config(config: &BackendConfig, workdir: impl Into<PathBuf>) -> Result<Self> {
        let (program, args) = config
            .command
            .split_first()
            .ok_or_else(|| anyhow!("backend.command is not configured"))?;
        if program.trim().is_empty() {
            return Err(anyhow!("backend.command must name a program"));
        }
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            workdir: workdir.into(),
            timeout: Duration::from_secs(config.timeout_secs),
            output_limit_bytes: config.output_limit_bytes,
        })
    }
}

impl ReasoningBackend for CommandBackend {
    #[instrument(skip_all, fields(model = %request.model, messages = request.messages.len()))]
    fn complete(&self, request: &ReasoningRequest) -> Result<AssistantTurn> {
        let payload = serde_json::to_vec(request).context("serialize reasoning request")?;
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).current_dir(&self.workdir);

        debug!(program = %self.program, bytes = payload.len(), "invoking backend");
        let output = Bounded::new(self.timeout, self.output_limit_bytes)
            .run(cmd, Some(&payload))
            .context("run backend command")?;

        if output.timed_out {
            warn!(timeout_secs = self.timeout.as_secs(), "backend timed out");
            return Err(anyhow!("backend timed out after {:?}", self.timeout));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "backend failed");
            return Err(anyhow!(
                "backend exited with status {:?}: {}",
                output.status.code(),
                output.stderr.text().trim()
            ));
        }
        if output.stdout.dropped > 0 {
            return Err(anyhow!(
                "backend reply exceeded {} bytes",
                self.output_limit_bytes
            ));
        }

        let turn: AssistantTurn =
            serde_json::from_slice(&output.stdout.bytes).context("parse backend reply")?;
        info!(tool_calls = turn.tool_calls.len(), "backend replied");
        Ok(turn)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn backend(script: &str) -> CommandBackend {
        let config = BackendConfig {
            command: vec!["sh".to_string(), "-c".to_string(), script.to_string()],
            timeout_secs: 10,
            output_limit_bytes: 10_000,
        };
        CommandBackend::from_config(&config, std::env::temp_dir()).expect("backend")
    }

    fn request() -> ReasoningRequest {
        ReasoningRequest {
            model: "m".to_string(),
            messages: vec![Message::system("sys"), Message::user("hi")],
            tools: Vec::new(),
        }
    }

    #[test]
    fn parses_reply_from_stdout() {
        let reply = r#"{"content":"ok","tool_calls":[{"id":"1","name":"list_dir","arguments":{}}]}"#;
        let turn = backend(&format!("cat >/dev/null; echo '{reply}'"))
            .complete(&request())
            .expect("complete");
        assert_eq!(turn.content.as_deref(), Some("ok"));
        assert_eq!(turn.tool_calls[0].name, "list_dir");
    }

    #[test]
    fn request_reaches_stdin_as_json() {
        let script = r#"grep -q '"model":"m"' && echo '{"content":"saw model"}'"#;
        let turn = backend(script).complete(&request()).expect("complete");
        assert_eq!(turn.content.as_deref(), Some("saw model"));
    }

    #[test]
    fn nonzero_exit_is_an_error() {
        let err = backend("cat >/dev/null; echo boom >&2; exit 1")
            .complete(&request())
            .unwrap_err();
        assert!(format!("{err:#}").contains("boom"));
    }

    #[test]
    fn missing_command_is_a_config_error() {
        let err = CommandBackend::from_config(&BackendConfig::default(), ".").unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }

    #[test]
    fn system_prompt_is_first_system_message() {
        assert_eq!(request().system_prompt(), Some("sys"));
    }
}
