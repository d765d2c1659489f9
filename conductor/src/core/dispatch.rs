//! Deterministic classification of a turn's intents.
//!
//! Produces the per-capability task queues, the results that can be resolved
//! without running anything, and the list of synchronous intents the
//! dispatcher must execute in emission order. No I/O happens here.

use std::collections::BTreeMap;

use crate::core::intent::{Intent, IntentKind, RUN_SHELL};
use crate::core::results::ResultMap;
use crate::core::types::{Capability, Task};
use crate::error::ValidationError;

/// Classification output for one turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchPlan {
    pub queues: BTreeMap<Capability, Vec<Task>>,
    /// Rejections and validation failures, keyed by intent id.
    pub resolved: ResultMap,
    /// Intents to execute inline, in emission order.
    pub synchronous: Vec<Intent>,
}

impl DispatchPlan {
    pub fn task_count(&self) -> usize {
        self.queues.values().map(Vec::len).sum()
    }
}

/// Id of the `index`-th sub-task of a plan intent.
pub fn subtask_id(parent: &str, index: usize) -> String {
    format!("{parent}_{index}")
}

/// Result text for a surplus shell intent.
pub fn shell_rejection(intent_id: &str) -> String {
    format!("Error: only one {RUN_SHELL} intent allowed per turn; '{intent_id}' was not executed.")
}

/// Classify intents into queues, immediate results, and synchronous work.
///
/// Invariants:
/// - every intent yields either queued task(s), a resolved result, or a
///   synchronous entry, never more than one of those;
/// - at most one [`Capability::Shell`] task is queued;
/// - plan sub-task ids are `<intent-id>_<index>`.
pub fn classify(intents: &[Intent]) -> DispatchPlan {
    let mut plan = DispatchPlan::default();
    let mut shell_queued = false;

    for intent in intents {
        match &intent.kind {
            IntentKind::Plan { tasks } => {
                let queue = plan.queues.entry(Capability::FileEdit).or_default();
                for (index, description) in tasks.iter().enumerate() {
                    queue.push(Task::pending(
                        subtask_id(&intent.id, index),
                        Capability::FileEdit,
                        description.clone(),
                    ));
                }
            }
            IntentKind::Shell { instructions } => {
                if shell_queued {
                    resolve(&mut plan, &intent.id, shell_rejection(&intent.id));
                    continue;
                }
                shell_queued = true;
                enqueue(&mut plan, intent, Capability::Shell, instructions);
            }
            IntentKind::Admin { instructions } => {
                enqueue(&mut plan, intent, Capability::Admin, instructions);
            }
            IntentKind::Research { question } => {
                enqueue(&mut plan, intent, Capability::Research, question);
            }
            IntentKind::ReadFile { .. } | IntentKind::ListDir { .. } | IntentKind::Commit { .. } => {
                plan.synchronous.push(intent.clone());
            }
            IntentKind::Invalid { name, reason } => {
                let err = ValidationError::MalformedArguments {
                    name: name.clone(),
                    reason: reason.clone(),
                };
                resolve(&mut plan, &intent.id, format!("Error: {err}"));
            }
            IntentKind::Unknown { name } => {
                let err = ValidationError::UnknownCapability { name: name.clone() };
                resolve(&mut plan, &intent.id, format!("Error: {err}"));
            }
        }
    }

    plan
}

fn enqueue(plan: &mut DispatchPlan, intent: &Intent, capability: Capability, description: &str) {
    plan.queues
        .entry(capability)
        .or_default()
        .push(Task::pending(intent.id.clone(), capability, description));
}

fn resolve(plan: &mut DispatchPlan, intent_id: &str, text: String) {
    // First resolution wins; ids are unique per turn so this only matters for
    // a misbehaving backend.
    let _ = plan.resolved.insert(intent_id, text);
}
