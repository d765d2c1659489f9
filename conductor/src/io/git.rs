//! Git adapter behind the completion signal.
//!
//! The commit is the only side effect the exit detector keys on, so it sits
//! behind [`CommitAction`]; tests substitute a recording double.

use std::path::PathBuf;
use std::process::Command;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument};

/// What a commit attempt did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed { sha: String },
    /// Nothing was staged after `add -A`.
    NothingToCommit,
}

impl CommitOutcome {
    /// Text reported back to the manager.
    pub fn describe(&self, message: &str) -> String {
        match self {
            CommitOutcome::Committed { sha } => format!("Committed {sha}: {message}"),
            CommitOutcome::NothingToCommit => {
                "Nothing to commit; the working tree is clean.".to_string()
            }
        }
    }
}

/// Stage everything and commit it.
pub trait CommitAction: Send + Sync {
    fn commit_all(&self, message: &str) -> Result<CommitOutcome>;
}

/// A working copy driven through the `git` binary.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    /// Paths with uncommitted changes, untracked files included.
    pub fn changed_paths(&self) -> Result<Vec<String>> {
        self.stdout(&["status", "--porcelain=v1", "-uall"])?
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(porcelain_path)
            .collect()
    }

    /// Run git and return stdout, failing on a non-zero exit.
    fn stdout(&self, args: &[&str]) -> Result<String> {
        debug!(args = %args.join(" "), "git");
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))?;
        if !output.status.success() {
            return Err(anyhow!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl CommitAction for Git {
    #[instrument(skip_all, fields(workdir = %self.workdir.display()))]
    fn commit_all(&self, message: &str) -> Result<CommitOutcome> {
        self.stdout(&["add", "-A"]).context("stage workspace changes")?;
        let staged = self.stdout(&["diff", "--cached", "--name-only"])?;
        let files = staged.lines().filter(|l| !l.trim().is_empty()).count();
        if files == 0 {
            info!("completion commit had nothing to record");
            return Ok(CommitOutcome::NothingToCommit);
        }
        self.stdout(&["commit", "-q", "-m", message])?;
        let sha = self.stdout(&["rev-parse", "--short=8", "HEAD"])?.trim().to_string();
        info!(%sha, files, "completion commit recorded");
        Ok(CommitOutcome::Committed { sha })
    }
}

/// Path of one `--porcelain=v1` line; renames report the new path.
fn porcelain_path(line: &str) -> Result<String> {
    let path = line
        .get(3..)
        .filter(|rest| !rest.trim().is_empty())
        .ok_or_else(|| anyhow!("unexpected porcelain line: '{line}'"))?;
    let path = match path.split_once(" -> ") {
        Some((_, renamed)) => renamed,
        None => path,
    };
    Ok(path.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestWorkspace;

    #[test]
    fn porcelain_paths_cover_untracked_modified_and_renamed() {
        assert_eq!(porcelain_path("?? foo.txt").expect("untracked"), "foo.txt");
        assert_eq!(porcelain_path(" M src/lib.rs").expect("modified"), "src/lib.rs");
        assert_eq!(porcelain_path("R  old.txt -> new.txt").expect("rename"), "new.txt");
        assert!(porcelain_path("M").is_err());
    }

    #[test]
    fn commit_all_stages_untracked_files_then_reports_clean_tree() {
        let ws = TestWorkspace::with_git().expect("workspace");
        ws.write("notes.md", "progress").expect("write");
        let git = Git::new(ws.path());
        assert_eq!(git.changed_paths().expect("status"), vec!["notes.md".to_string()]);

        let first = git.commit_all("checkpoint").expect("commit");
        assert!(matches!(first, CommitOutcome::Committed { ref sha } if !sha.is_empty()));
        assert!(git.changed_paths().expect("status").is_empty());

        let second = git.commit_all("again").expect("commit");
        assert_eq!(second, CommitOutcome::NothingToCommit);
        assert!(second.describe("again").contains("Nothing to commit"));
    }
}
