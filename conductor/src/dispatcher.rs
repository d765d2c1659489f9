//! Routes one turn's intents: classification, synchronous intents, fan-out.
//!
//! After [`Dispatcher::dispatch`] returns, `state.results` holds exactly one
//! entry per non-plan intent and one per plan sub-task, which is what the
//! reducer expects.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use tracing::{info, instrument, warn};

use crate::core::dispatch::classify;
use crate::core::intent::{Intent, IntentKind};
use crate::core::state::SessionState;
use crate::core::types::{Task, TaskStatus};
use crate::error::{ExecutionError, ToolError};
use crate::executors::{ExecutorContext, ExecutorReport, run_task};
use crate::io::git::CommitAction;
use crate::io::workspace::Workspace;
use crate::logging::preview;
use crate::task_group::TaskGroupRunner;

/// Counters for one dispatch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    /// Intents answered without running anything (rejections, validation).
    pub resolved: usize,
    pub synchronous: usize,
    pub tasks: usize,
    pub failed_tasks: usize,
}

pub struct Dispatcher {
    workspace: Workspace,
    commit: Arc<dyn CommitAction>,
    executors: Arc<ExecutorContext>,
    group: TaskGroupRunner,
}

impl Dispatcher {
    pub fn new(
        workspace: Workspace,
        commit: Arc<dyn CommitAction>,
        executors: Arc<ExecutorContext>,
    ) -> Result<Self> {
        Ok(Self {
            workspace,
            commit,
            executors,
            group: TaskGroupRunner::new()?,
        })
    }

    /// Run the completion side effect directly, bypassing the manager.
    pub fn force_commit(&self, message: &str) -> Result<String> {
        let outcome = self.commit.commit_all(message)?;
        Ok(outcome.describe(message))
    }

    #[instrument(skip_all, fields(intents = intents.len()))]
    pub fn dispatch(&self, state: &mut SessionState, intents: &[Intent]) -> Result<DispatchSummary> {
        let plan = classify(intents);
        let mut summary = DispatchSummary {
            resolved: plan.resolved.len(),
            synchronous: plan.synchronous.len(),
            tasks: plan.task_count(),
            failed_tasks: 0,
        };
        for (id, text) in plan.resolved.iter() {
            warn!(%id, result = %preview(text, 500), "intent resolved without execution");
        }
        state.results.merge(plan.resolved)?;
        state.pending = plan.queues;

        // Synchronous intents finish before any executor starts, so the
        // commit never overlaps parallel work.
        for intent in &plan.synchronous {
            let text = self.run_synchronous(intent);
            info!(id = %intent.id, result = %preview(&text, 500), "synchronous intent finished");
            state.results.insert(intent.id.clone(), text)?;
        }

        summary.failed_tasks = self.fan_out(state)?;
        info!(
            resolved = summary.resolved,
            synchronous = summary.synchronous,
            tasks = summary.tasks,
            failed = summary.failed_tasks,
            "dispatch complete"
        );
        Ok(summary)
    }

    fn run_synchronous(&self, intent: &Intent) -> String {
        let result: Result<String, ToolError> = match &intent.kind {
            IntentKind::ReadFile { path } => self.workspace.read_file(path),
            IntentKind::ListDir { path } => self.workspace.list_dir(path),
            IntentKind::Commit { message } => self
                .commit
                .commit_all(message)
                .map(|outcome| outcome.describe(message))
                .map_err(|e| ExecutionError::Failed(format!("commit failed: {e:#}")).into()),
            other => Err(ExecutionError::Failed(format!(
                "intent kind {other:?} cannot run synchronously"
            ))
            .into()),
        };
        result.unwrap_or_else(|err| err.to_result_string())
    }

    /// Run every queued task and record one result per task. Returns the
    /// number of failed tasks.
    fn fan_out(&self, state: &mut SessionState) -> Result<usize> {
        let mut units = Vec::new();
        let mut descriptions = BTreeMap::new();
        for task in state.pending.values_mut().flatten() {
            task.status = TaskStatus::Running;
            descriptions.insert(task.id.clone(), task.clone());
            units.push((task.id.clone(), task.clone()));
        }
        if units.is_empty() {
            return Ok(0);
        }

        let ctx = Arc::clone(&self.executors);
        let outcome = self
            .group
            .run(units, move |task: Task| run_task(&ctx, &task))?;

        let mut reports: Vec<ExecutorReport> = outcome.completed.into_iter().map(|(_, r)| r).collect();
        for (id, message) in outcome.panicked {
            if let Some(task) = descriptions.get(&id) {
                reports.push(ExecutorReport::failed(task, format!("executor panicked: {message}")));
            }
        }

        let mut failed = 0;
        for report in reports {
            let status = report.status();
            if status == TaskStatus::Failed {
                failed += 1;
            }
            if let Some(task) = state
                .pending
                .values_mut()
                .flatten()
                .find(|task| task.id == report.task_id)
            {
                task.status = status;
            }
            state.results.insert(report.task_id.clone(), report.render())?;
        }
        Ok(failed)
    }
}
