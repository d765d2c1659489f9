//! Order-preserving reassembly of a turn's results into history entries.

use crate::core::dispatch::subtask_id;
use crate::core::intent::{Intent, IntentKind};
use crate::core::results::ResultMap;
use crate::core::state::SessionState;
use crate::core::types::Message;

/// Result text for an intent that somehow produced nothing.
pub const MISSING_RESULT: &str = "Error: No result generated for this intent.";

/// Build one result entry per intent, in emission order.
///
/// Plan intents combine their sub-task results (blank-line separated, in
/// sub-description order); a missing sub-result becomes a placeholder.
pub fn reduce(intents: &[Intent], results: &ResultMap) -> Vec<Message> {
    intents
        .iter()
        .map(|intent| {
            let content = match &intent.kind {
                IntentKind::Plan { tasks } => combine_plan(&intent.id, tasks, results),
                _ => results
                    .get(&intent.id)
                    .map(str::to_string)
                    .unwrap_or_else(|| MISSING_RESULT.to_string()),
            };
            Message::tool_result(intent.id.clone(), content)
        })
        .collect()
}

fn combine_plan(parent: &str, tasks: &[String], results: &ResultMap) -> String {
    tasks
        .iter()
        .enumerate()
        .map(|(index, description)| {
            let id = subtask_id(parent, index);
            match results.get(&id) {
                Some(text) => text.to_string(),
                None => format!("Task {id} ({description}): No result found."),
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Append the turn's result entries to history and clear turn-scoped state.
///
/// Returns the number of entries appended.
pub fn apply(state: &mut SessionState, intents: &[Intent]) -> usize {
    let entries = reduce(intents, &state.results);
    let appended = entries.len();
    state.history.extend(entries);
    state.reset_turn();
    appended
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Capability, Role, Task};

    fn plan(id: &str, tasks: &[&str]) -> Intent {
        Intent {
            id: id.to_string(),
            kind: IntentKind::Plan {
                tasks: tasks.iter().map(|t| t.to_string()).collect(),
            },
        }
    }

    fn read(id: &str) -> Intent {
        Intent {
            id: id.to_string(),
            kind: IntentKind::ReadFile {
                path: "a.txt".to_string(),
            },
        }
    }

    #[test]
    fn entries_follow_emission_order_not_insertion_order() {
        let intents = vec![read("b"), read("a"), read("c")];
        let mut results = ResultMap::new();
        // Completion order differs from emission order.
        results.insert("c", "third").expect("insert");
        results.insert("a", "second").expect("insert");
        results.insert("b", "first").expect("insert");

        let entries = reduce(&intents, &results);
        let pairs: Vec<(&str, &str)> = entries
            .iter()
            .map(|m| (m.tool_call_id.as_deref().unwrap_or(""), m.content.as_str()))
            .collect();
        assert_eq!(pairs, vec![("b", "first"), ("a", "second"), ("c", "third")]);
        assert!(entries.iter().all(|m| m.role == Role::Tool));
    }

    #[test]
    fn plan_combines_sub_results_in_description_order() {
        let intents = vec![plan("X", &["one", "two", "three"])];
        let mut results = ResultMap::new();
        results.insert("X_2", "r2").expect("insert");
        results.insert("X_0", "r0").expect("insert");
        results.insert("X_1", "r1").expect("insert");

        let entries = reduce(&intents, &results);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].content, "r0\n\nr1\n\nr2");
        assert_eq!(entries[0].tool_call_id.as_deref(), Some("X"));
    }

    #[test]
    fn missing_results_become_placeholders() {
        let intents = vec![plan("X", &["one", "two"]), read("r")];
        let mut results = ResultMap::new();
        results.insert("X_0", "r0").expect("insert");

        let entries = reduce(&intents, &results);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].content, "r0\n\nTask X_1 (two): No result found.");
        assert_eq!(entries[1].content, MISSING_RESULT);
    }

    #[test]
    fn apply_appends_and_clears_turn_state() {
        let mut state = SessionState::new(Vec::new(), 3);
        state
            .pending
            .entry(Capability::FileEdit)
            .or_default()
            .push(Task::pending("X_0", Capability::FileEdit, "one"));
        state.results.insert("X_0", "r0").expect("insert");

        let appended = apply(&mut state, &[plan("X", &["one"])]);

        assert_eq!(appended, 1);
        assert_eq!(state.history.len(), 1);
        assert_eq!(state.pending_task_count(), 0);
        assert!(state.results.is_empty());
    }
}
