use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};
use conductor::core::types::{AssistantTurn, Message, Role, ToolCall};
use conductor::error::BudgetExceeded;
use conductor::io::checkpoint::load_checkpoint;
use conductor::io::config::ConductorConfig;
use conductor::io::turn_log::turn_log_path;
use conductor::session::{AUTO_SAVE_MESSAGE, Collaborators, Orchestrator, Session, SessionStop};
use conductor::test_support::{FnBackend, RecordingCommit, StaticDocs, TestWorkspace};
use serde_json::json;

type ExecutorFn = dyn Fn(&str) -> Result<AssistantTurn> + Send + Sync;

struct Harness {
    ws: TestWorkspace,
    config: ConductorConfig,
    commit: Arc<RecordingCommit>,
    /// Every message list the manager was sent.
    manager_requests: Arc<Mutex<Vec<Vec<Message>>>>,
    executor_calls: Arc<AtomicUsize>,
}

impl Harness {
    fn new() -> Self {
        let ws = TestWorkspace::new().expect("ws");
        ws.write("prompts/build.md", "You are the manager.").expect("prompt");
        let config = ws.config();
        Self {
            ws,
            config,
            commit: Arc::new(RecordingCommit::default()),
            manager_requests: Arc::new(Mutex::new(Vec::new())),
            executor_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Manager turns are replayed in order; executor requests are answered
    /// by `executor` given the rendered system prompt.
    fn orchestrator(
        &self,
        manager_turns: Vec<AssistantTurn>,
        executor: Box<ExecutorFn>,
    ) -> Orchestrator {
        let script = Mutex::new(VecDeque::from(manager_turns));
        let manager_model = self.config.manager.model.clone();
        let requests = Arc::clone(&self.manager_requests);
        let calls = Arc::clone(&self.executor_calls);
        let backend = FnBackend::new(move |request| {
            if request.model == manager_model {
                requests.lock().expect("lock").push(request.messages.clone());
                return script
                    .lock()
                    .expect("lock")
                    .pop_front()
                    .ok_or_else(|| anyhow!("manager script exhausted"));
            }
            calls.fetch_add(1, Ordering::SeqCst);
            executor(request.system_prompt().unwrap_or_default())
        });
        Orchestrator::build(
            &self.config,
            Collaborators {
                backend: Arc::new(backend),
                docs: Arc::new(StaticDocs),
                commit: self.commit.clone(),
            },
        )
        .expect("orchestrator")
    }

    fn open(&self) -> Session {
        Session::open(&self.config, false).expect("session")
    }
}

fn turn(calls: Vec<ToolCall>) -> AssistantTurn {
    AssistantTurn::calls(calls)
}

fn commit_turn(id: &str) -> AssistantTurn {
    turn(vec![ToolCall::new(id, "git_commit", json!({"message": "done"}))])
}

fn tool_results(history: &[Message]) -> Vec<(&str, &str)> {
    history
        .iter()
        .filter(|m| m.role == Role::Tool)
        .map(|m| (m.tool_call_id.as_deref().unwrap_or_default(), m.content.as_str()))
        .collect()
}

fn answer_ok() -> Box<ExecutorFn> {
    Box::new(|_prompt: &str| Ok(AssistantTurn::text("ok")))
}

#[test]
fn plan_with_one_failing_task_reports_every_subtask_then_completes() {
    let h = Harness::new();
    let orchestrator = h.orchestrator(
        vec![
            turn(vec![ToolCall::new(
                "P",
                "plan_tasks",
                json!({"tasks": ["edit alpha", "edit beta", "edit gamma"]}),
            )]),
            commit_turn("C"),
        ],
        Box::new(|prompt: &str| {
            if prompt.contains("edit beta") {
                Err(anyhow!("model overloaded"))
            } else {
                Ok(AssistantTurn::text("edited"))
            }
        }),
    );
    let mut session = h.open();

    let stop = orchestrator.run_session(&mut session).expect("run");

    assert_eq!(stop, SessionStop::Completed { turns: 2 });
    let results = tool_results(&session.state.history);
    assert_eq!(results.len(), 2);
    let (id, plan) = results[0];
    assert_eq!(id, "P");
    let alpha = plan.find("Worker P_0 (edit alpha) Result: edited").expect("alpha");
    let beta = plan
        .find("Worker P_1 (edit beta) Failed: reasoning call failed: model overloaded")
        .expect("beta");
    let gamma = plan.find("Worker P_2 (edit gamma) Result: edited").expect("gamma");
    assert!(alpha < beta && beta < gamma);

    assert_eq!(h.commit.messages(), vec!["done".to_string()]);
    assert!(load_checkpoint(&h.config.checkpoint_path()).expect("load").is_none());
}

#[test]
fn call_reusing_a_subtask_id_is_renamed_instead_of_conflicting() {
    let h = Harness::new();
    h.ws.write("README.md", "hello").expect("write");
    let orchestrator = h.orchestrator(
        vec![
            turn(vec![
                ToolCall::new("X", "plan_tasks", json!({"tasks": ["edit alpha"]})),
                ToolCall::new("X_0", "read_file", json!({"path": "README.md"})),
            ]),
            commit_turn("C"),
        ],
        Box::new(|_prompt: &str| Ok(AssistantTurn::text("edited"))),
    );
    let mut session = h.open();

    let stop = orchestrator.run_session(&mut session).expect("run");

    assert_eq!(stop, SessionStop::Completed { turns: 2 });
    let results = tool_results(&session.state.history);
    assert_eq!(results[0].0, "X");
    assert!(results[0].1.contains("Worker X_0 (edit alpha) Result: edited"));
    assert_eq!(results[1], ("call_1_1", "hello"));
}

#[test]
fn shell_runs_while_unknown_intent_is_answered_with_error() {
    let h = Harness::new();
    let orchestrator = h.orchestrator(
        vec![
            turn(vec![
                ToolCall::new("S", "run_shell", json!({"instructions": "run the tests"})),
                ToolCall::new("U", "teleport", json!({})),
            ]),
            commit_turn("C"),
        ],
        answer_ok(),
    );
    let mut session = h.open();

    orchestrator.run_session(&mut session).expect("run");

    let results = tool_results(&session.state.history);
    assert_eq!(results[0], ("S", "Worker S (run the tests) Result: ok"));
    assert_eq!(results[1], ("U", "Error: unknown capability 'teleport'"));
    assert_eq!(h.executor_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn results_follow_intent_order_not_completion_order() {
    let h = Harness::new();
    let orchestrator = h.orchestrator(
        vec![
            turn(vec![
                ToolCall::new("slow", "admin_task", json!({"instructions": "tidy slowly"})),
                ToolCall::new("fast", "research", json!({"question": "tokio spawn"})),
            ]),
            commit_turn("C"),
        ],
        Box::new(|prompt: &str| {
            if prompt.contains("tidy slowly") {
                std::thread::sleep(Duration::from_millis(300));
            }
            Ok(AssistantTurn::text("finished"))
        }),
    );
    let mut session = h.open();

    orchestrator.run_session(&mut session).expect("run");

    let ids: Vec<&str> = tool_results(&session.state.history)
        .into_iter()
        .map(|(id, _)| id)
        .collect();
    assert_eq!(ids, vec!["slow", "fast", "C"]);
}

#[test]
fn second_shell_intent_in_a_turn_is_rejected() {
    let h = Harness::new();
    let orchestrator = h.orchestrator(
        vec![
            turn(vec![
                ToolCall::new("S1", "run_shell", json!({"instructions": "build"})),
                ToolCall::new("S2", "run_shell", json!({"instructions": "deploy"})),
            ]),
            commit_turn("C"),
        ],
        answer_ok(),
    );
    let mut session = h.open();

    orchestrator.run_session(&mut session).expect("run");

    let results = tool_results(&session.state.history);
    assert!(results[0].1.starts_with("Worker S1 (build) Result"));
    assert_eq!(results[1].0, "S2");
    assert!(results[1].1.starts_with("Error: only one run_shell intent"));
    assert_eq!(h.executor_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn plain_text_turn_is_followed_by_continuation_then_completion() {
    let h = Harness::new();
    let orchestrator = h.orchestrator(
        vec![AssistantTurn::text("Let me think."), commit_turn("C")],
        answer_ok(),
    );
    let mut session = h.open();

    let stop = orchestrator.run_session(&mut session).expect("run");

    assert_eq!(stop, SessionStop::Completed { turns: 2 });
    let second = &h.manager_requests.lock().expect("lock")[1];
    let last = second.last().expect("last");
    assert_eq!(last.role, Role::User);
    assert!(session.state.history.contains(last));
}

#[test]
fn budget_exhaustion_auto_saves_and_fails() {
    let mut h = Harness::new();
    h.config.manager.token_limit = 1;
    h.config.manager.grace_turns = 1;
    let orchestrator = h.orchestrator(
        vec![turn(vec![ToolCall::new("L", "list_dir", json!({}))])],
        answer_ok(),
    );
    let mut session = h.open();

    let err = orchestrator.run_session(&mut session).unwrap_err();

    let budget = err.downcast_ref::<BudgetExceeded>().expect("budget error");
    assert_eq!(budget.limit, 1);
    assert_eq!(h.commit.messages(), vec![AUTO_SAVE_MESSAGE.to_string()]);

    let requests = h.manager_requests.lock().expect("lock");
    assert_eq!(requests.len(), 1);
    assert!(requests[0].last().expect("last").content.starts_with("URGENT"));

    // The auto-save ends the session, so nothing is left to resume.
    assert!(load_checkpoint(&h.config.checkpoint_path()).expect("load").is_none());
}

#[test]
fn restart_after_budget_exhaustion_starts_fresh_and_reaches_the_manager() {
    let mut h = Harness::new();
    h.config.manager.token_limit = 1;
    h.config.manager.grace_turns = 1;
    let exhausted = h.orchestrator(
        vec![turn(vec![ToolCall::new("L", "list_dir", json!({}))])],
        answer_ok(),
    );
    let mut session = h.open();
    exhausted.run_session(&mut session).unwrap_err();

    h.config.manager.token_limit = 1_000_000;
    let restarted = h.orchestrator(vec![commit_turn("C")], answer_ok());
    let mut fresh = h.open();
    assert!(!fresh.resumed);
    assert_eq!(fresh.state.iteration, 0);

    let stop = restarted.run_session(&mut fresh).expect("run");

    assert_eq!(stop, SessionStop::Completed { turns: 1 });
    assert_eq!(h.manager_requests.lock().expect("lock").len(), 2);
    assert_eq!(
        h.commit.messages(),
        vec![AUTO_SAVE_MESSAGE.to_string(), "done".to_string()]
    );
}

#[test]
fn state_directory_is_ignored_and_closed_to_executors() {
    let h = Harness::new();
    let attempts = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&attempts);
    let orchestrator = h.orchestrator(
        vec![
            turn(vec![ToolCall::new("A", "admin_task", json!({"instructions": "tidy state"}))]),
            commit_turn("C"),
        ],
        Box::new(move |_prompt: &str| {
            if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                return Ok(turn(vec![ToolCall::new(
                    "w",
                    "write_file",
                    json!({"path": ".conductor/.gitignore", "content": "!*\n"}),
                )]));
            }
            Ok(AssistantTurn::text("tidied"))
        }),
    );
    let ignore = h.config.state_dir().join(".gitignore");
    assert_eq!(h.ws.read(".conductor/.gitignore").expect("read"), "*\n");

    let mut session = h.open();
    orchestrator.run_session(&mut session).expect("run");

    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    assert_eq!(std::fs::read_to_string(ignore).expect("read"), "*\n");
}

#[test]
fn turn_limit_keeps_checkpoint_and_next_session_resumes() {
    let mut h = Harness::new();
    h.config.max_turns = 1;
    h.ws.write("README.md", "hello").expect("write");

    let first = h.orchestrator(
        vec![turn(vec![ToolCall::new("R", "read_file", json!({"path": "README.md"}))])],
        answer_ok(),
    );
    let mut session = h.open();
    assert!(!session.resumed);
    let stop = first.run_session(&mut session).expect("run");
    assert_eq!(stop, SessionStop::TurnLimit { turns: 1 });
    assert!(turn_log_path(&h.config.state_dir(), &session.id, 1).exists());

    let saved = load_checkpoint(&h.config.checkpoint_path())
        .expect("load")
        .expect("checkpoint");
    assert_eq!(saved.iteration, 1);
    assert_eq!(tool_results(&saved.history), vec![("R", "hello")]);

    let second = h.orchestrator(vec![commit_turn("C")], answer_ok());
    let mut resumed = h.open();
    assert!(resumed.resumed);
    assert_eq!(resumed.state.history, saved.history);

    let stop = second.run_session(&mut resumed).expect("run");

    assert_eq!(stop, SessionStop::Completed { turns: 1 });
    assert_eq!(resumed.state.iteration, 2);
    assert!(load_checkpoint(&h.config.checkpoint_path()).expect("load").is_none());
}
