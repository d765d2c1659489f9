//! Session checkpoint (`<state_dir>/checkpoint.json`).
//!
//! Only history and turn counters are persisted; queues and results are
//! turn-scoped and never written.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::budget::GraceCounter;
use crate::core::state::SessionState;
use crate::core::types::Message;
use crate::io::config::write_atomic;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Checkpoint {
    pub history: Vec<Message>,
    pub iteration: u32,
    pub grace_turns_remaining: u32,
}

impl Checkpoint {
    pub fn capture(state: &SessionState) -> Self {
        Self {
            history: state.history.clone(),
            iteration: state.iteration,
            grace_turns_remaining: state.grace.remaining(),
        }
    }

    /// Rebuild session state; `grace_turns` is the configured initial value.
    pub fn into_state(self, grace_turns: u32) -> SessionState {
        SessionState::resume(
            self.history,
            self.iteration,
            GraceCounter::restore(grace_turns, self.grace_turns_remaining),
        )
    }
}

/// Load a checkpoint; a missing file means a fresh session.
pub fn load_checkpoint(path: &Path) -> Result<Option<Checkpoint>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "no checkpoint");
            return Ok(None);
        }
        Err(err) => {
            return Err(err).with_context(|| format!("read checkpoint {}", path.display()));
        }
    };
    let checkpoint: Checkpoint = serde_json::from_str(&contents)
        .with_context(|| format!("parse checkpoint {}", path.display()))?;
    debug!(
        entries = checkpoint.history.len(),
        iteration = checkpoint.iteration,
        "checkpoint loaded"
    );
    Ok(Some(checkpoint))
}

/// Atomically write the checkpoint (temp file + rename).
pub fn write_checkpoint(path: &Path, checkpoint: &Checkpoint) -> Result<()> {
    debug!(path = %path.display(), iteration = checkpoint.iteration, "writing checkpoint");
    let mut buf = serde_json::to_string_pretty(checkpoint)?;
    buf.push('\n');
    write_atomic(path, &buf)
}

/// Remove the checkpoint. Returns whether one existed.
pub fn clear_checkpoint(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err).with_context(|| format!("remove checkpoint {}", path.display())),
    }
}
