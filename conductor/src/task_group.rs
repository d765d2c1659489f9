//! Fan-out/fan-in over blocking work units.
//!
//! [`TaskGroupRunner::run`] spawns one blocking unit per `(id, input)` pair on
//! a multi-threaded runtime and returns only after every unit has finished or
//! panicked. A panicking unit is reported under its own id; siblings are
//! unaffected.

use std::any::Any;
use std::collections::BTreeSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use tokio::runtime::{Builder, Runtime};
use tokio::task::JoinSet;
use tracing::{debug, error, instrument};

/// Everything a group run produced, in completion order.
#[derive(Debug)]
pub struct GroupOutcome<R> {
    pub completed: Vec<(String, R)>,
    /// Units that panicked, with the panic message.
    pub panicked: Vec<(String, String)>,
}

impl<R> GroupOutcome<R> {
    pub fn len(&self) -> usize {
        self.completed.len() + self.panicked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct TaskGroupRunner {
    runtime: Runtime,
}

impl TaskGroupRunner {
    pub fn new() -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .thread_name("conductor-task")
            .enable_time()
            .build()
            .context("build task group runtime")?;
        Ok(Self { runtime })
    }

    /// Run every unit concurrently and wait for all of them.
    ///
    /// Ids must be unique; a duplicate is rejected before anything is spawned.
    /// Must not be called from inside an async context.
    #[instrument(skip_all, fields(units = units.len()))]
    pub fn run<I, R, F>(&self, units: Vec<(String, I)>, work: F) -> Result<GroupOutcome<R>>
    where
        I: Send + 'static,
        R: Send + 'static,
        F: Fn(I) -> R + Send + Sync + 'static,
    {
        let mut seen = BTreeSet::new();
        for (id, _) in &units {
            if !seen.insert(id.as_str()) {
                return Err(anyhow!("duplicate task id '{id}' in task group"));
            }
        }

        let work = Arc::new(work);
        self.runtime.block_on(async move {
            let mut set = JoinSet::new();
            for (id, input) in units {
                let work = Arc::clone(&work);
                set.spawn_blocking(move || {
                    let result = catch_unwind(AssertUnwindSafe(|| work(input)));
                    (id, result)
                });
            }

            let mut outcome = GroupOutcome {
                completed: Vec::new(),
                panicked: Vec::new(),
            };
            while let Some(joined) = set.join_next().await {
                let (id, result) = joined.context("join task group unit")?;
                match result {
                    Ok(value) => {
                        debug!(%id, "unit completed");
                        outcome.completed.push((id, value));
                    }
                    Err(payload) => {
                        let message = panic_message(payload.as_ref());
                        error!(%id, %message, "unit panicked");
                        outcome.panicked.push((id, message));
                    }
                }
            }
            Ok(outcome)
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    fn units(ids: &[&str]) -> Vec<(String, String)> {
        ids.iter().map(|id| (id.to_string(), id.to_string())).collect()
    }

    #[test]
    fn waits_for_every_unit() {
        let runner = TaskGroupRunner::new().expect("runner");
        let outcome = runner
            .run(units(&["a", "b", "c"]), |input: String| input.to_uppercase())
            .expect("run");
        let mut values: Vec<_> = outcome.completed.into_iter().map(|(_, v)| v).collect();
        values.sort();
        assert_eq!(values, vec!["A", "B", "C"]);
        assert!(outcome.panicked.is_empty());
    }

    #[test]
    fn units_run_concurrently() {
        let runner = TaskGroupRunner::new().expect("runner");
        let started = Instant::now();
        let outcome = runner
            .run(units(&["a", "b", "c", "d"]), |_input: String| {
                std::thread::sleep(Duration::from_millis(300));
            })
            .expect("run");
        assert_eq!(outcome.len(), 4);
        assert!(started.elapsed() < Duration::from_millis(1100));
    }

    #[test]
    fn panicking_unit_does_not_abort_siblings() {
        let runner = TaskGroupRunner::new().expect("runner");
        let finished = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&finished);
        let outcome = runner
            .run(units(&["ok1", "boom", "ok2"]), move |input: String| {
                if input == "boom" {
                    panic!("exploded");
                }
                counter.fetch_add(1, Ordering::SeqCst);
                input
            })
            .expect("run");

        assert_eq!(finished.load(Ordering::SeqCst), 2);
        assert_eq!(outcome.completed.len(), 2);
        assert_eq!(outcome.panicked, vec![("boom".to_string(), "exploded".to_string())]);
    }

    #[test]
    fn duplicate_ids_are_rejected_up_front() {
        let runner = TaskGroupRunner::new().expect("runner");
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ran);
        let err = runner
            .run(units(&["x", "x"]), move |_input: String| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap_err();
        assert!(err.to_string().contains("duplicate task id 'x'"));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn empty_group_returns_immediately() {
        let runner = TaskGroupRunner::new().expect("runner");
        let outcome = runner
            .run(Vec::<(String, ())>::new(), |_: ()| ())
            .expect("run");
        assert!(outcome.is_empty());
    }
}
