//! Explicit session state shared by the orchestration steps.

use std::collections::BTreeMap;

use crate::core::budget::GraceCounter;
use crate::core::results::ResultMap;
use crate::core::types::{Capability, Message, Task};

/// State for one restart cycle. Owned by the orchestrator; mutated strictly
/// sequentially except for the task group's disjoint result writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    /// Append-only conversation history.
    pub history: Vec<Message>,
    /// Queued tasks for the current turn. Cleared by the reducer.
    pub pending: BTreeMap<Capability, Vec<Task>>,
    /// Results for the current turn. Cleared by the reducer.
    pub results: ResultMap,
    /// Number of turns started in this session.
    pub iteration: u32,
    pub grace: GraceCounter,
}

impl SessionState {
    pub fn new(history: Vec<Message>, grace_turns: u32) -> Self {
        Self {
            history,
            pending: BTreeMap::new(),
            results: ResultMap::new(),
            iteration: 0,
            grace: GraceCounter::new(grace_turns),
        }
    }

    /// Rebuild from persisted parts. Turn-scoped queues always start empty.
    pub fn resume(history: Vec<Message>, iteration: u32, grace: GraceCounter) -> Self {
        Self {
            history,
            pending: BTreeMap::new(),
            results: ResultMap::new(),
            iteration,
            grace,
        }
    }

    pub fn pending_task_count(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    /// Drop all turn-scoped state.
    pub fn reset_turn(&mut self) {
        self.pending.clear();
        self.results.clear();
    }
}
