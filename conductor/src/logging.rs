//! Diagnostic tracing for the conductor.
//!
//! - **Tracing (this module)**: filtered by `RUST_LOG`, written to stderr and,
//!   when a path is given, appended to a plain-text log file.
//! - **Turn logs (`io/turn_log`)**: product artifacts under
//!   `<state_dir>/turns/`. Always written, unaffected by `RUST_LOG`.

use std::borrow::Cow;
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the global subscriber.
///
/// Reads `RUST_LOG`, falling back to `default_level`.
///
/// # Example
/// ```bash
/// RUST_LOG=conductor=debug conductor run
/// ```
pub fn init(default_level: &str, log_file: Option<&Path>) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create log directory {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("open log file {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .with(file_layer)
        .try_init()
        .map_err(|err| anyhow!("install tracing subscriber: {err}"))
}

/// Shorten `text` to `max_chars` characters for log fields.
pub fn preview(text: &str, max_chars: usize) -> Cow<'_, str> {
    match text.char_indices().nth(max_chars) {
        None => Cow::Borrowed(text),
        Some((cut, _)) => {
            let rest = text[cut..].chars().count();
            Cow::Owned(format!("{}... ({rest} more chars)", &text[..cut]))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_borrowed() {
        assert!(matches!(preview("abc", 3), Cow::Borrowed("abc")));
    }

    #[test]
    fn long_text_is_cut_on_char_boundary() {
        assert_eq!(preview("héllo wörld", 5), "héllo... (6 more chars)");
    }
}
