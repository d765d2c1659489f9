//! I/O adapters: filesystem, processes, git, HTTP and the reasoning backend.

pub mod backend;
pub mod checkpoint;
pub mod config;
pub mod docs;
pub mod git;
pub mod process;
pub mod shell;
pub mod turn_log;
pub mod workspace;
