//! Test-only helpers: temp workspaces and scripted collaborators.

use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::process::Command;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, anyhow, bail};
use tempfile::TempDir;

use crate::core::types::AssistantTurn;
use crate::dispatcher::Dispatcher;
use crate::executors::ExecutorContext;
use crate::io::backend::{ReasoningBackend, ReasoningRequest};
use crate::io::config::ConductorConfig;
use crate::io::docs::DocsSource;
use crate::io::git::{CommitAction, CommitOutcome};
use crate::io::workspace::Workspace;

/// A temporary directory used as the workspace root.
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Result<Self> {
        Ok(Self {
            dir: tempfile::tempdir().context("create temp workspace")?,
        })
    }

    /// A workspace that is also a git repository with a local identity.
    pub fn with_git() -> Result<Self> {
        let ws = Self::new()?;
        ws.git(&["init", "-q"])?;
        ws.git(&["config", "user.email", "conductor@example.com"])?;
        ws.git(&["config", "user.name", "Conductor Tests"])?;
        ws.git(&["config", "commit.gpgsign", "false"])?;
        Ok(ws)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `contents` to `rel`, creating parent directories.
    pub fn write(&self, rel: &str, contents: &str) -> Result<()> {
        let path = self.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))
    }

    pub fn read(&self, rel: &str) -> Result<String> {
        let path = self.path().join(rel);
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
    }

    /// Default config rooted at this workspace.
    pub fn config(&self) -> ConductorConfig {
        ConductorConfig {
            workspace_root: self.path().to_path_buf(),
            ..ConductorConfig::default()
        }
    }

    fn git(&self, args: &[&str]) -> Result<()> {
        let status = Command::new("git")
            .args(args)
            .current_dir(self.path())
            .status()
            .context("spawn git")?;
        if !status.success() {
            bail!("git {args:?} failed with {status}");
        }
        Ok(())
    }
}

/// Replays a fixed list of turns, then fails every further call.
pub struct ScriptedBackend {
    turns: Mutex<VecDeque<AssistantTurn>>,
}

impl ReasoningBackend for ScriptedBackend {
    fn complete(&self, _request: &ReasoningRequest) -> Result<AssistantTurn> {
        let mut turns = self.turns.lock().map_err(|_| anyhow!("script lock poisoned"))?;
        turns.pop_front().ok_or_else(|| anyhow!("scripted backend exhausted"))
    }
}

pub fn scripted_backend(turns: Vec<AssistantTurn>) -> Arc<dyn ReasoningBackend> {
    Arc::new(ScriptedBackend {
        turns: Mutex::new(turns.into()),
    })
}

/// Backend answered by a closure, for routing on the request contents.
pub struct FnBackend<F> {
    respond: F,
}

impl<F> FnBackend<F>
where
    F: Fn(&ReasoningRequest) -> Result<AssistantTurn> + Send + Sync,
{
    pub fn new(respond: F) -> Self {
        Self { respond }
    }
}

impl<F> ReasoningBackend for FnBackend<F>
where
    F: Fn(&ReasoningRequest) -> Result<AssistantTurn> + Send + Sync,
{
    fn complete(&self, request: &ReasoningRequest) -> Result<AssistantTurn> {
        (self.respond)(request)
    }
}

/// Records commit messages instead of touching git.
#[derive(Default)]
pub struct RecordingCommit {
    messages: Mutex<Vec<String>>,
}

impl RecordingCommit {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

impl CommitAction for RecordingCommit {
    fn commit_all(&self, message: &str) -> Result<CommitOutcome> {
        let mut messages = self.messages.lock().map_err(|_| anyhow!("commit lock poisoned"))?;
        messages.push(message.to_string());
        Ok(CommitOutcome::Committed {
            sha: format!("{:07}", messages.len()),
        })
    }
}

/// Documentation source that echoes the request.
pub struct StaticDocs;

impl DocsSource for StaticDocs {
    fn lookup(&self, library: &str, query: &str) -> Result<String> {
        Ok(format!("# {library}\n\nNotes on {query}."))
    }
}

pub fn executor_context(ws: &TestWorkspace, backend: Arc<dyn ReasoningBackend>) -> ExecutorContext {
    let config = ws.config();
    let workspace = Workspace::open(ws.path(), &config.protected_paths).expect("open workspace");
    ExecutorContext::new(&config, workspace, backend, Arc::new(StaticDocs)).expect("executor context")
}

pub fn dispatcher_with(
    ws: &TestWorkspace,
    backend: Arc<dyn ReasoningBackend>,
    commit: Arc<RecordingCommit>,
) -> Dispatcher {
    let config = ws.config();
    let workspace = Workspace::open(ws.path(), &config.protected_paths).expect("open workspace");
    let executors = Arc::new(executor_context(ws, backend));
    Dispatcher::new(workspace, commit, executors).expect("dispatcher")
}
