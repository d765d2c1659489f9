//! Parallel agent orchestrator.
//!
//! A manager reasoning step turns the session history into intents; the
//! dispatcher routes them to capability executors that run concurrently; the
//! reducer folds their results back into history in intent order. The crate
//! keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (intent parsing, classification,
//!   budget governor, reduction). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (filesystem, git, processes, HTTP).
//!   Behind traits where tests need doubles.
//!
//! Orchestration modules ([`manager`], [`dispatcher`], [`task_group`],
//! [`executors`], [`session`]) coordinate core logic with I/O.

pub mod core;
pub mod dispatcher;
pub mod error;
pub mod executors;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod manager;
pub mod session;
pub mod task_group;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
