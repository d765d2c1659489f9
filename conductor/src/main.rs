//! Parallel agent orchestrator.
//!
//! A manager model decomposes work into intents; capability executors run them
//! concurrently against the workspace until the manager commits and stops.
//! Session state is checkpointed under `.conductor/` so runs are resumable.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use conductor::core::budget::estimate_tokens;
use conductor::error::{BudgetExceeded, ReasoningCallError};
use conductor::exit_codes;
use conductor::io::backend::CommandBackend;
use conductor::io::checkpoint::{clear_checkpoint, load_checkpoint};
use conductor::io::config::{ConductorConfig, DEFAULT_CONFIG_FILE, load_config};
use conductor::io::docs::Context7;
use conductor::io::git::Git;
use conductor::logging;
use conductor::session::{Collaborators, Orchestrator, Session, SessionStop, supervise};

#[derive(Parser)]
#[command(
    name = "conductor",
    version,
    about = "Parallel agent orchestrator with capability executors"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct ConfigArgs {
    /// Config file (missing file means defaults).
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Override `workspace_root`.
    #[arg(long)]
    workspace: Option<PathBuf>,

    /// Override `manager.model`.
    #[arg(long)]
    manager_model: Option<String>,

    /// Override `executor.model`.
    #[arg(long)]
    executor_model: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Run one session until completion or the turn ceiling.
    Run {
        #[command(flatten)]
        config: ConfigArgs,

        /// Ignore any checkpoint and start from the prompt file.
        #[arg(long)]
        fresh: bool,
    },
    /// Run sessions back to back, restarting after each completion.
    Supervise {
        #[command(flatten)]
        config: ConfigArgs,

        #[arg(long, default_value_t = 1)]
        max_sessions: u32,
    },
    /// Print a summary of the saved checkpoint.
    Status {
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Delete the saved checkpoint.
    Reset {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

fn main() {
    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{err:#}");
            exit_code_for(&err)
        }
    };
    std::process::exit(code);
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<BudgetExceeded>().is_some() {
        exit_codes::BUDGET_EXHAUSTED
    } else if err.downcast_ref::<ReasoningCallError>().is_some() {
        exit_codes::REASONING_FAILED
    } else {
        exit_codes::INVALID
    }
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Run { config, fresh } => cmd_run(&config, fresh),
        Command::Supervise {
            config,
            max_sessions,
        } => cmd_supervise(&config, max_sessions),
        Command::Status { config } => cmd_status(&config),
        Command::Reset { config } => cmd_reset(&config),
    }
}

fn load(args: &ConfigArgs) -> Result<ConductorConfig> {
    let mut config = load_config(&args.config)?;
    if let Some(workspace) = &args.workspace {
        config.workspace_root = workspace.clone();
    }
    if let Some(model) = &args.manager_model {
        config.manager.model = model.clone();
    }
    if let Some(model) = &args.executor_model {
        config.executor.model = model.clone();
    }
    config.validate()?;
    Ok(config)
}

/// Load config, start logging, and wire the real collaborators.
fn start(args: &ConfigArgs) -> Result<(ConductorConfig, Orchestrator)> {
    let config = load(args)?;
    logging::init("info", Some(&config.state_dir().join("conductor.log")))?;

    // The blocking HTTP client must be built outside the task group runtime.
    let docs = Context7::from_config(&config.docs).context("build docs client")?;
    let parts = Collaborators {
        backend: Arc::new(CommandBackend::from_config(
            &config.backend,
            config.workspace_root.clone(),
        )?),
        docs: Arc::new(docs),
        commit: Arc::new(Git::new(config.workspace_root.clone())),
    };
    let orchestrator = Orchestrator::build(&config, parts)?;
    Ok((config, orchestrator))
}

fn cmd_run(args: &ConfigArgs, fresh: bool) -> Result<i32> {
    let (config, orchestrator) = start(args)?;
    let mut session = Session::open(&config, fresh)?;
    match orchestrator.run_session(&mut session)? {
        SessionStop::Completed { turns } => {
            println!("completed after {turns} turns");
            Ok(exit_codes::OK)
        }
        SessionStop::TurnLimit { turns } => {
            println!("stopped at the turn ceiling after {turns} turns; checkpoint kept");
            Ok(exit_codes::TURN_LIMIT)
        }
    }
}

fn cmd_supervise(args: &ConfigArgs, max_sessions: u32) -> Result<i32> {
    let (config, orchestrator) = start(args)?;
    let report = supervise(&orchestrator, &config, max_sessions)?;
    println!("ran {} sessions", report.sessions);
    Ok(match report.last_stop {
        Some(SessionStop::TurnLimit { .. }) => exit_codes::TURN_LIMIT,
        _ => exit_codes::OK,
    })
}

fn cmd_status(args: &ConfigArgs) -> Result<i32> {
    let config = load(args)?;
    let path = config.checkpoint_path();
    match load_checkpoint(&path)? {
        Some(checkpoint) => {
            println!("checkpoint: {}", path.display());
            println!("iteration: {}", checkpoint.iteration);
            println!("history entries: {}", checkpoint.history.len());
            println!("estimated tokens: {}", estimate_tokens(&checkpoint.history));
            println!("grace turns remaining: {}", checkpoint.grace_turns_remaining);
        }
        None => println!("no checkpoint; the next run starts fresh"),
    }
    match Git::new(config.workspace_root.clone()).changed_paths() {
        Ok(paths) => println!("uncommitted changes: {}", paths.len()),
        Err(err) => println!("git status unavailable: {err:#}"),
    }
    Ok(exit_codes::OK)
}

fn cmd_reset(args: &ConfigArgs) -> Result<i32> {
    let config = load(args)?;
    let path = config.checkpoint_path();
    if clear_checkpoint(&path)? {
        println!("removed {}", path.display());
    } else {
        println!("no checkpoint at {}", path.display());
    }
    Ok(exit_codes::OK)
}
