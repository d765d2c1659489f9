//! Budget helpers: executor wall-clock deadlines and the manager's token governor.

use std::time::{Duration, Instant};

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::types::Message;

/// Fixed per-entry overhead added to every message (role markers, separators).
const MESSAGE_OVERHEAD_TOKENS: usize = 4;
const CHARS_PER_TOKEN: usize = 4;

/// Return the remaining time budget until the provided deadline.
pub fn remaining_budget(deadline: Instant) -> Result<Duration> {
    let remaining = deadline
        .checked_duration_since(Instant::now())
        .unwrap_or(Duration::from_secs(0));
    if remaining.is_zero() {
        return Err(anyhow!("executor time budget exhausted"));
    }
    Ok(remaining)
}

/// Rough token estimate for a conversation: one token per four characters of
/// content, call names and serialized arguments, plus a per-message overhead.
pub fn estimate_tokens(messages: &[Message]) -> usize {
    messages
        .iter()
        .map(|message| {
            let mut chars = message.content.chars().count();
            for call in &message.tool_calls {
                chars += call.name.chars().count();
                chars += call.arguments.to_string().chars().count();
            }
            chars.div_ceil(CHARS_PER_TOKEN) + MESSAGE_OVERHEAD_TOKENS
        })
        .sum()
}

/// What the governor decided for the upcoming turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetVerdict {
    /// History fits; the counter was reset.
    Within,
    /// Over budget but tolerated; `remaining` grace turns are left after this one.
    Grace { remaining: u32 },
    /// Over budget with no grace left: force-save and terminate.
    Exhausted,
}

/// Grace-turn countdown owned by the session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraceCounter {
    initial: u32,
    remaining: u32,
}

impl GraceCounter {
    pub fn new(initial: u32) -> Self {
        Self {
            initial,
            remaining: initial,
        }
    }

    /// Rebuild from a checkpoint; `remaining` is clamped to `initial`.
    pub fn restore(initial: u32, remaining: u32) -> Self {
        Self {
            initial,
            remaining: remaining.min(initial),
        }
    }

    pub fn initial(&self) -> u32 {
        self.initial
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Observe the token estimate at the start of a turn.
    ///
    /// Under (or at) the limit resets the countdown; over the limit consumes
    /// exactly one grace turn while any remain.
    pub fn observe(&mut self, tokens: usize, limit: usize) -> BudgetVerdict {
        if tokens <= limit {
            self.remaining = self.initial;
            return BudgetVerdict::Within;
        }
        if self.remaining == 0 {
            return BudgetVerdict::Exhausted;
        }
        self.remaining -= 1;
        BudgetVerdict::Grace {
            remaining: self.remaining,
        }
    }
}
