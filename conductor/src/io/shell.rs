//! Shell execution inside the workspace.
//!
//! Commands run as `<prefix...> sh -c <command>` with the workspace root as
//! working directory. The prefix lets deployments route commands into a
//! container (for example `["docker", "exec", "-w", "/app", "sandbox"]`).

use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use tracing::{info, instrument};

use crate::error::{ExecutionError, ToolError};
use crate::io::config::ShellConfig;
use crate::io::process::{Bounded, spawn_detached};

#[derive(Debug, Clone)]
pub struct ShellRunner {
    workdir: PathBuf,
    config: ShellConfig,
}

impl ShellRunner {
    pub fn new(workdir: impl Into<PathBuf>, config: ShellConfig) -> Self {
        Self {
            workdir: workdir.into(),
            config,
        }
    }

    /// Effective timeout: the request (or the default), clamped to the maximum.
    pub fn effective_timeout(&self, requested_secs: Option<u64>) -> u64 {
        requested_secs
            .unwrap_or(self.config.default_timeout_secs)
            .clamp(1, self.config.max_timeout_secs)
    }

    /// Run a command and report its output as text.
    ///
    /// With `background`, the command is started detached and no output is
    /// captured.
    #[instrument(skip_all, fields(background))]
    pub fn run(
        &self,
        command: &str,
        timeout_secs: Option<u64>,
        background: bool,
    ) -> Result<String, ToolError> {
        let cmd = self.build(command);
        if background {
            let pid = spawn_detached(cmd).map_err(|e| ExecutionError::Failed(format!("{e:#}")))?;
            info!(pid, "background command started");
            return Ok(format!("Command started in background (pid {pid}): {command}"));
        }

        let secs = self.effective_timeout(timeout_secs);
        let output = Bounded::new(Duration::from_secs(secs), self.config.output_limit_bytes)
            .run(cmd, None)
            .map_err(|e| ExecutionError::Failed(format!("{e:#}")))?;
        if output.timed_out {
            return Err(ExecutionError::TimedOut { secs }.into());
        }
        info!(exit_code = output.exit_code(), "command finished");
        Ok(output.render())
    }

    fn build(&self, command: &str) -> Command {
        let mut parts = self.config.prefix.iter();
        let mut cmd = match parts.next() {
            Some(program) => {
                let mut cmd = Command::new(program);
                cmd.args(parts);
                cmd.arg("sh");
                cmd
            }
            None => Command::new("sh"),
        };
        cmd.arg("-c").arg(command).current_dir(&self.workdir);
        cmd
    }
}
