//! The tool-using reasoning sub-loop every executor variant runs.

use std::time::Instant;

use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::core::budget::remaining_budget;
use crate::core::types::{Capability, Message};
use crate::error::ReasoningCallError;
use crate::executors::{ExecutorContext, toolset};
use crate::io::backend::ReasoningRequest;

/// First user entry of every executor conversation.
pub const KICKOFF: &str = "Please start working.";

/// Ways a sub-loop ends without a final answer.
#[derive(Debug, Error)]
pub enum LoopFailure {
    #[error("task too complex, please break it down (exceeded {0} steps)")]
    StepLimit(u32),
    #[error("time budget of {0} seconds exhausted")]
    TimeBudget(u64),
    #[error(transparent)]
    Reasoning(#[from] ReasoningCallError),
}

/// One bounded executor conversation. Holds no state beyond a single run.
pub struct SubLoop<'a> {
    ctx: &'a ExecutorContext,
    capability: Capability,
}

impl<'a> SubLoop<'a> {
    pub fn new(ctx: &'a ExecutorContext, capability: Capability) -> Self {
        Self { ctx, capability }
    }

    /// Run until the reasoning call answers without tool calls.
    #[instrument(skip_all, fields(capability = self.capability.as_str()))]
    pub fn run(&self, system_prompt: String) -> Result<String, LoopFailure> {
        let deadline = Instant::now() + self.ctx.limits.timeout;
        let tools = toolset::tool_specs(self.capability);
        let mut messages = vec![Message::system(system_prompt), Message::user(KICKOFF)];

        for step in 1..=self.ctx.limits.max_steps {
            if remaining_budget(deadline).is_err() {
                warn!(step, "executor deadline passed");
                return Err(LoopFailure::TimeBudget(self.ctx.limits.timeout.as_secs()));
            }

            let request = ReasoningRequest {
                model: self.ctx.model.clone(),
                messages: messages.clone(),
                tools: tools.clone(),
            };
            let turn = self
                .ctx
                .backend
                .complete(&request)
                .map_err(|source| ReasoningCallError { source })?;

            if turn.tool_calls.is_empty() {
                debug!(step, "executor finished");
                let text = turn.content.unwrap_or_default();
                if text.trim().is_empty() {
                    return Ok("No output".to_string());
                }
                return Ok(text);
            }

            let calls = turn.tool_calls.clone();
            messages.push(turn.into_message());
            for call in &calls {
                let output = toolset::invoke(self.ctx, self.capability, call);
                messages.push(Message::tool_result(call.id.clone(), output));
            }
        }

        warn!(max_steps = self.ctx.limits.max_steps, "executor step ceiling reached");
        Err(LoopFailure::StepLimit(self.ctx.limits.max_steps))
    }
}
