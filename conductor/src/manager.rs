//! The manager: the orchestrator's single decision point.
//!
//! Each step runs the turn-taking guard and the token governor, then asks the
//! reasoning backend for the next assistant turn and appends it to history.

use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::Result;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::core::budget::{BudgetVerdict, estimate_tokens};
use crate::core::dispatch::subtask_id;
use crate::core::intent::{Intent, PLAN_TASKS, intents_from_calls, manager_tool_specs};
use crate::core::state::SessionState;
use crate::core::turns::{CONTINUE_PROMPT, budget_instruction, continuation_needed, with_instruction};
use crate::core::types::{Message, ToolCall, ToolSpec};
use crate::error::ReasoningCallError;
use crate::io::backend::{ReasoningBackend, ReasoningRequest};
use crate::logging::preview;

/// What one manager step produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerStep {
    /// A new assistant entry was appended; `intents` are its parsed calls.
    Responded {
        intents: Vec<Intent>,
        estimated_tokens: usize,
        verdict: BudgetVerdict,
    },
    /// Over budget with no grace left; the reasoning call was skipped.
    BudgetExhausted { tokens: usize, limit: usize },
}

pub struct Manager {
    backend: Arc<dyn ReasoningBackend>,
    model: String,
    token_limit: usize,
    tools: Vec<ToolSpec>,
}

impl Manager {
    pub fn new(backend: Arc<dyn ReasoningBackend>, model: impl Into<String>, token_limit: usize) -> Self {
        Self {
            backend,
            model: model.into(),
            token_limit,
            tools: manager_tool_specs(),
        }
    }

    #[instrument(skip_all, fields(iteration = state.iteration))]
    pub fn step(&self, state: &mut SessionState) -> Result<ManagerStep> {
        if continuation_needed(&state.history) {
            info!("previous turn ended in plain text; adding continuation entry");
            state.history.push(Message::user(CONTINUE_PROMPT));
        }

        let tokens = estimate_tokens(&state.history);
        let verdict = state.grace.observe(tokens, self.token_limit);
        let messages = match verdict {
            BudgetVerdict::Within => state.history.clone(),
            BudgetVerdict::Grace { remaining } => {
                warn!(tokens, limit = self.token_limit, remaining, "over token budget; grace turn");
                let instruction = budget_instruction(tokens, self.token_limit, remaining);
                with_instruction(&state.history, &instruction)
            }
            BudgetVerdict::Exhausted => {
                warn!(tokens, limit = self.token_limit, "token budget exhausted");
                return Ok(ManagerStep::BudgetExhausted {
                    tokens,
                    limit: self.token_limit,
                });
            }
        };

        let request = ReasoningRequest {
            model: self.model.clone(),
            messages,
            tools: self.tools.clone(),
        };
        let mut turn = self
            .backend
            .complete(&request)
            .map_err(|source| ReasoningCallError { source })?;

        normalize_ids(&mut turn.tool_calls, state.iteration);
        if turn.tool_calls.is_empty() {
            info!(
                text = %preview(turn.content.as_deref().unwrap_or_default(), 500),
                "manager replied with text"
            );
        }
        for call in &turn.tool_calls {
            info!(
                id = %call.id,
                intent = %call.name,
                args = %preview(&call.arguments.to_string(), 500),
                "manager intent"
            );
        }

        let intents = intents_from_calls(&turn.tool_calls);
        state.history.push(turn.into_message());
        Ok(ManagerStep::Responded {
            intents,
            estimated_tokens: tokens,
            verdict,
        })
    }
}

/// Make every intent id unique within the turn, plan sub-task ids included.
///
/// The first holder of an id keeps it unless the id is also a sub-task id of
/// some plan (`<plan>_<n>`). Losers get `call_<iteration>_<index>`, suffixed
/// further until nothing else in the turn uses it.
fn normalize_ids(calls: &mut [ToolCall], iteration: u32) {
    let mut taken = BTreeSet::new();
    let mut keep: Vec<bool> = calls
        .iter()
        .map(|call| !call.id.trim().is_empty() && taken.insert(call.id.clone()))
        .collect();
    let mut reserved: BTreeSet<String> = calls
        .iter()
        .zip(&keep)
        .filter(|(_, kept)| **kept)
        .flat_map(|(call, _)| plan_subtask_ids(&call.id, call))
        .collect();
    for (call, kept) in calls.iter().zip(keep.iter_mut()) {
        if *kept && reserved.contains(&call.id) {
            *kept = false;
        }
    }

    for (index, (call, kept)) in calls.iter_mut().zip(keep).enumerate() {
        if kept {
            continue;
        }
        let base = format!("call_{iteration}_{index}");
        let is_free = |candidate: &str| {
            !taken.contains(candidate)
                && !reserved.contains(candidate)
                && plan_subtask_ids(candidate, call)
                    .iter()
                    .all(|sub| !taken.contains(sub) && !reserved.contains(sub))
        };
        let mut replacement = base.clone();
        let mut suffix = 0;
        while !is_free(&replacement) {
            suffix += 1;
            replacement = format!("{base}_{suffix}");
        }
        warn!(original = %call.id, %replacement, "renaming intent id");
        reserved.extend(plan_subtask_ids(&replacement, call));
        taken.insert(replacement.clone());
        call.id = replacement;
    }
}

/// Ids the dispatcher will give the sub-tasks of `call` if it is a plan under `id`.
fn plan_subtask_ids(id: &str, call: &ToolCall) -> Vec<String> {
    if call.name != PLAN_TASKS {
        return Vec::new();
    }
    let width = call
        .arguments
        .get("tasks")
        .and_then(Value::as_array)
        .map_or(0, Vec::len);
    (0..width).map(|index| subtask_id(id, index)).collect()
}
