//! Stable exit codes for conductor CLI commands.

/// The session completed (or the command succeeded).
pub const OK: i32 = 0;
/// Invalid config or workspace, or any other error.
pub const INVALID: i32 = 1;
/// The session hit its turn ceiling; the checkpoint is kept.
pub const TURN_LIMIT: i32 = 2;
/// The token budget and its grace turns ran out.
pub const BUDGET_EXHAUSTED: i32 = 3;
/// The manager's reasoning call failed.
pub const REASONING_FAILED: i32 = 4;
