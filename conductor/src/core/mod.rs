//! Deterministic, pure logic shared by the orchestration loop.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod budget;
pub mod dispatch;
pub mod exit;
pub mod intent;
pub mod path;
pub mod reduce;
pub mod results;
pub mod state;
pub mod turns;
pub mod types;
