//! Capability executors: bounded, stateless tool-using sub-loops.
//!
//! All four variants share [`engine::SubLoop`]; they differ only in their
//! prompt template and toolset.

pub mod engine;
pub mod prompt;
pub mod toolset;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::core::types::{Task, TaskStatus};
use crate::io::backend::ReasoningBackend;
use crate::io::config::{ConductorConfig, ShellConfig};
use crate::io::docs::DocsSource;
use crate::io::shell::ShellRunner;
use crate::io::workspace::Workspace;

use engine::SubLoop;
use prompt::{PromptEngine, PromptInputs};

/// Step and wall-clock limits for one executor run.
#[derive(Debug, Clone, Copy)]
pub struct ExecutorLimits {
    pub max_steps: u32,
    pub timeout: Duration,
}

/// Everything an executor run needs. Shared read-only across parallel runs.
pub struct ExecutorContext {
    pub backend: Arc<dyn ReasoningBackend>,
    pub docs: Arc<dyn DocsSource>,
    pub workspace: Workspace,
    pub shell: ShellRunner,
    pub model: String,
    pub limits: ExecutorLimits,
    pub protected_paths: Vec<String>,
    pub shell_config: ShellConfig,
    prompts: PromptEngine,
}

impl ExecutorContext {
    pub fn new(
        config: &ConductorConfig,
        workspace: Workspace,
        backend: Arc<dyn ReasoningBackend>,
        docs: Arc<dyn DocsSource>,
    ) -> Result<Self> {
        let shell = ShellRunner::new(workspace.root(), config.shell.clone());
        Ok(Self {
            backend,
            docs,
            shell,
            workspace,
            model: config.executor.model.clone(),
            limits: ExecutorLimits {
                max_steps: config.executor.max_steps,
                timeout: Duration::from_secs(config.executor.timeout_secs),
            },
            protected_paths: config.protected_paths.clone(),
            shell_config: config.shell.clone(),
            prompts: PromptEngine::new()?,
        })
    }
}

/// Outcome of one executor run, already attributed to its task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorReport {
    pub task_id: String,
    pub description: String,
    pub outcome: Result<String, String>,
}

impl ExecutorReport {
    pub fn failed(task: &Task, reason: impl Into<String>) -> Self {
        Self {
            task_id: task.id.clone(),
            description: task.description.clone(),
            outcome: Err(reason.into()),
        }
    }

    pub fn status(&self) -> TaskStatus {
        if self.outcome.is_ok() {
            TaskStatus::Done
        } else {
            TaskStatus::Failed
        }
    }

    /// Result text recorded under the task id.
    pub fn render(&self) -> String {
        match &self.outcome {
            Ok(text) => format!(
                "Worker {} ({}) Result: {text}",
                self.task_id, self.description
            ),
            Err(reason) => format!(
                "Worker {} ({}) Failed: {reason}",
                self.task_id, self.description
            ),
        }
    }
}

/// Run one task to completion. Never returns an error: failures are reported.
#[instrument(skip_all, fields(task_id = %task.id, capability = task.capability.as_str()))]
pub fn run_task(ctx: &ExecutorContext, task: &Task) -> ExecutorReport {
    let inputs = PromptInputs {
        workspace_root: ctx.workspace.root(),
        protected_paths: &ctx.protected_paths,
        shell: &ctx.shell_config,
    };
    let prompt = match ctx.prompts.render(task, &inputs) {
        Ok(prompt) => prompt,
        Err(err) => return ExecutorReport::failed(task, format!("prompt rendering failed: {err:#}")),
    };

    let outcome = SubLoop::new(ctx, task.capability)
        .run(prompt)
        .map_err(|err| err.to_string());
    match &outcome {
        Ok(_) => info!("executor finished"),
        Err(reason) => warn!(%reason, "executor failed"),
    }
    ExecutorReport {
        task_id: task.id.clone(),
        description: task.description.clone(),
        outcome,
    }
}
