//! Host loop: Manager → Dispatcher → Task Group → Reducer, until completion.
//!
//! A session ends when the latest assistant turn carries the completion intent
//! (the checkpoint is then removed so the next session starts clean) or when
//! the turn ceiling is hit (the checkpoint is kept for resumption). Budget
//! exhaustion auto-saves, removes the checkpoint, and fails the session.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::core::budget::estimate_tokens;
use crate::core::exit::completion_requested;
use crate::core::reduce;
use crate::core::state::SessionState;
use crate::core::types::{Message, Role};
use crate::dispatcher::Dispatcher;
use crate::error::BudgetExceeded;
use crate::executors::ExecutorContext;
use crate::io::backend::ReasoningBackend;
use crate::io::checkpoint::{Checkpoint, clear_checkpoint, load_checkpoint, write_checkpoint};
use crate::io::config::{ConductorConfig, prepare_state_dir};
use crate::io::docs::DocsSource;
use crate::io::git::CommitAction;
use crate::io::turn_log::{TurnRecord, write_turn};
use crate::io::workspace::Workspace;
use crate::manager::{Manager, ManagerStep};

/// Commit message used when the budget forces a save.
pub const AUTO_SAVE_MESSAGE: &str = "auto-save: token budget exhausted";

/// External collaborators the orchestrator is built from.
pub struct Collaborators {
    pub backend: Arc<dyn ReasoningBackend>,
    pub docs: Arc<dyn DocsSource>,
    pub commit: Arc<dyn CommitAction>,
}

/// One restart cycle: an id for its artifacts plus its state.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub state: SessionState,
    /// True when the state came from a checkpoint.
    pub resumed: bool,
}

impl Session {
    /// Resume from the checkpoint when allowed and present, otherwise start fresh.
    pub fn open(config: &ConductorConfig, fresh: bool) -> Result<Self> {
        let id = new_session_id();
        if config.persist_checkpoint && !fresh {
            if let Some(checkpoint) = load_checkpoint(&config.checkpoint_path())? {
                info!(session = %id, iteration = checkpoint.iteration, "resuming from checkpoint");
                return Ok(Self {
                    id,
                    state: checkpoint.into_state(config.manager.grace_turns),
                    resumed: true,
                });
            }
        }
        let history = initial_history(config)?;
        info!(session = %id, entries = history.len(), "starting fresh session");
        Ok(Self {
            id,
            state: SessionState::new(history, config.manager.grace_turns),
            resumed: false,
        })
    }
}

/// System prompt, then the workspace's operational notes when non-empty.
pub fn initial_history(config: &ConductorConfig) -> Result<Vec<Message>> {
    let prompt_path = config.resolve_path(&config.prompt_path);
    let prompt = fs::read_to_string(&prompt_path)
        .with_context(|| format!("read system prompt {}", prompt_path.display()))?;
    let mut history = vec![Message::system(prompt)];

    let notes_path = config.resolve_path(&config.notes_file);
    match fs::read_to_string(&notes_path) {
        Ok(notes) if !notes.trim().is_empty() => {
            history.push(Message::user(format!(
                "Operational notes from {}:\n\n{}",
                config.notes_file.display(),
                notes.trim()
            )));
        }
        Ok(_) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err).with_context(|| format!("read notes {}", notes_path.display()));
        }
    }
    Ok(history)
}

fn new_session_id() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    format!("{millis}-{}", std::process::id())
}

/// What one turn did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The loop should run another turn.
    Continue { intents: usize },
    /// The completion intent was issued.
    Completed,
}

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStop {
    Completed { turns: u32 },
    TurnLimit { turns: u32 },
}

#[derive(Debug, Clone)]
struct SessionSettings {
    max_turns: u32,
    checkpoint_path: Option<PathBuf>,
    state_dir: PathBuf,
}

pub struct Orchestrator {
    manager: Manager,
    dispatcher: Dispatcher,
    settings: SessionSettings,
}

impl Orchestrator {
    pub fn build(config: &ConductorConfig, parts: Collaborators) -> Result<Self> {
        let state_dir = prepare_state_dir(config)?;
        let mut workspace = Workspace::open(&config.workspace_root, &config.protected_paths)?;
        let reserved = state_dir
            .canonicalize()
            .with_context(|| format!("resolve state directory {}", state_dir.display()))?;
        workspace.reserve(reserved);
        let executors = Arc::new(ExecutorContext::new(
            config,
            workspace.clone(),
            Arc::clone(&parts.backend),
            parts.docs,
        )?);
        let dispatcher = Dispatcher::new(workspace, parts.commit, executors)?;
        let manager = Manager::new(
            parts.backend,
            config.manager.model.clone(),
            config.manager.token_limit,
        );
        Ok(Self {
            manager,
            dispatcher,
            settings: SessionSettings {
                max_turns: config.max_turns,
                checkpoint_path: config.persist_checkpoint.then(|| config.checkpoint_path()),
                state_dir,
            },
        })
    }

    /// Run one full Manager → Dispatcher → Task Group → Reducer pass.
    #[instrument(skip_all, fields(session = %session.id, iteration = session.state.iteration + 1))]
    pub fn run_turn(&self, session: &mut Session) -> Result<TurnOutcome> {
        let started = Instant::now();
        let state = &mut session.state;
        state.iteration += 1;

        let (intents, estimated_tokens) = match self.manager.step(state)? {
            ManagerStep::Responded {
                intents,
                estimated_tokens,
                ..
            } => (intents, estimated_tokens),
            ManagerStep::BudgetExhausted { tokens, limit } => {
                self.auto_save();
                // The auto-save is the session's final commit; a restart begins fresh.
                if let Some(path) = &self.settings.checkpoint_path {
                    clear_checkpoint(path)?;
                }
                return Err(BudgetExceeded { tokens, limit }.into());
            }
        };

        let calls = state
            .history
            .last()
            .filter(|m| m.role == Role::Assistant)
            .map(|m| m.tool_calls.clone())
            .unwrap_or_default();

        if !intents.is_empty() {
            self.dispatcher.dispatch(state, &intents)?;
        }
        let appended = reduce::apply(state, &intents);
        let results_start = state.history.len() - appended;

        let record = TurnRecord {
            session_id: &session.id,
            iteration: state.iteration,
            estimated_tokens,
            grace_turns_remaining: state.grace.remaining(),
            intents: &calls,
            results: &state.history[results_start..],
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        };
        if let Err(err) = write_turn(&self.settings.state_dir, &record) {
            warn!(err = %format!("{err:#}"), "failed to write turn log");
        }

        let completed = completion_requested(&state.history);
        if let Some(path) = &self.settings.checkpoint_path {
            if completed {
                clear_checkpoint(path)?;
            } else {
                write_checkpoint(path, &Checkpoint::capture(state))?;
            }
        }

        if completed {
            info!(tokens = estimate_tokens(&state.history), "completion signal received");
            return Ok(TurnOutcome::Completed);
        }
        Ok(TurnOutcome::Continue {
            intents: intents.len(),
        })
    }

    /// Loop turns until completion or the turn ceiling.
    #[instrument(skip_all, fields(session = %session.id, max_turns = self.settings.max_turns))]
    pub fn run_session(&self, session: &mut Session) -> Result<SessionStop> {
        let mut turns = 0;
        while turns < self.settings.max_turns {
            turns += 1;
            if self.run_turn(session)? == TurnOutcome::Completed {
                return Ok(SessionStop::Completed { turns });
            }
        }
        warn!(turns, "turn ceiling reached");
        Ok(SessionStop::TurnLimit { turns })
    }

    /// Best-effort commit before a forced termination.
    fn auto_save(&self) {
        match self.dispatcher.force_commit(AUTO_SAVE_MESSAGE) {
            Ok(result) => info!(%result, "auto-save committed"),
            Err(err) => warn!(err = %format!("{err:#}"), "auto-save failed"),
        }
    }
}

/// Result of a supervised run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorReport {
    pub sessions: u32,
    pub last_stop: Option<SessionStop>,
}

/// Restart sessions after each completion, up to `max_sessions`.
///
/// Stops early when a session hits its turn ceiling; errors end supervision.
pub fn supervise(
    orchestrator: &Orchestrator,
    config: &ConductorConfig,
    max_sessions: u32,
) -> Result<SupervisorReport> {
    let mut report = SupervisorReport {
        sessions: 0,
        last_stop: None,
    };
    while report.sessions < max_sessions {
        let mut session = Session::open(config, false)?;
        report.sessions += 1;
        info!(session = %session.id, number = report.sessions, "supervised session starting");
        let stop = orchestrator.run_session(&mut session)?;
        report.last_stop = Some(stop);
        if matches!(stop, SessionStop::TurnLimit { .. }) {
            break;
        }
    }
    Ok(report)
}
