//! Per-turn transcripts under `<state_dir>/turns/<session-id>/<iteration>.json`.
//!
//! Product artifacts for post-mortems; written regardless of `RUST_LOG`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::types::{Message, ToolCall};

#[derive(Debug, Clone, Serialize)]
pub struct TurnRecord<'a> {
    pub session_id: &'a str,
    pub iteration: u32,
    pub estimated_tokens: usize,
    pub grace_turns_remaining: u32,
    pub intents: &'a [ToolCall],
    pub results: &'a [Message],
    pub duration_ms: u64,
}

/// Path of one turn's transcript.
pub fn turn_log_path(state_dir: &Path, session_id: &str, iteration: u32) -> PathBuf {
    state_dir
        .join("turns")
        .join(session_id)
        .join(format!("{iteration}.json"))
}

pub fn write_turn(state_dir: &Path, record: &TurnRecord<'_>) -> Result<PathBuf> {
    let path = turn_log_path(state_dir, record.session_id, record.iteration);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create turn log dir {}", parent.display()))?;
    }
    let mut buf = serde_json::to_string_pretty(record)?;
    buf.push('\n');
    fs::write(&path, buf).with_context(|| format!("write {}", path.display()))?;
    Ok(path)
}
