//! System prompts for the capability executors.

use std::path::Path;

use anyhow::{Context, Result};
use minijinja::{Environment, context};

use crate::core::types::{Capability, Task};
use crate::io::config::ShellConfig;

const FILE_EDIT_TEMPLATE: &str = include_str!("prompts/file_edit.md");
const ADMIN_TEMPLATE: &str = include_str!("prompts/admin.md");
const SHELL_TEMPLATE: &str = include_str!("prompts/shell.md");
const RESEARCH_TEMPLATE: &str = include_str!("prompts/research.md");

/// Template engine wrapper around minijinja.
#[derive(Debug)]
pub struct PromptEngine {
    env: Environment<'static>,
}

/// Values shared by every executor prompt.
#[derive(Debug, Clone, Copy)]
pub struct PromptInputs<'a> {
    pub workspace_root: &'a Path,
    pub protected_paths: &'a [String],
    pub shell: &'a ShellConfig,
}

impl PromptEngine {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        for capability in [
            Capability::FileEdit,
            Capability::Admin,
            Capability::Shell,
            Capability::Research,
        ] {
            env.add_template(capability.as_str(), template_source(capability))
                .with_context(|| format!("load {} prompt template", capability.as_str()))?;
        }
        Ok(Self { env })
    }

    pub fn render(&self, task: &Task, inputs: &PromptInputs<'_>) -> Result<String> {
        let template = self.env.get_template(task.capability.as_str())?;
        let rendered = template.render(context! {
            task_id => task.id.as_str(),
            description => task.description.trim(),
            workspace_root => inputs.workspace_root.display().to_string(),
            protected_paths => inputs.protected_paths,
            default_timeout_secs => inputs.shell.default_timeout_secs,
            max_timeout_secs => inputs.shell.max_timeout_secs,
        })?;
        Ok(rendered)
    }
}

fn template_source(capability: Capability) -> &'static str {
    match capability {
        Capability::FileEdit => FILE_EDIT_TEMPLATE,
        Capability::Admin => ADMIN_TEMPLATE,
        Capability::Shell => SHELL_TEMPLATE,
        Capability::Research => RESEARCH_TEMPLATE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(capability: Capability, description: &str) -> String {
        let engine = PromptEngine::new().expect("engine");
        let shell = ShellConfig::default();
        let protected = vec!["specs".to_string()];
        let inputs = PromptInputs {
            workspace_root: Path::new("/work"),
            protected_paths: &protected,
            shell: &shell,
        };
        engine
            .render(&Task::pending("X_0", capability, description), &inputs)
            .expect("render")
    }

    #[test]
    fn file_edit_prompt_names_goal_and_read_only_paths() {
        let prompt = render(Capability::FileEdit, "  add a README  ");
        assert!(prompt.contains("GOAL (task X_0): add a README"));
        assert!(prompt.contains("`specs/` are read-only"));
        assert!(prompt.contains("`/work`"));
    }

    #[test]
    fn shell_prompt_states_timeouts() {
        let prompt = render(Capability::Shell, "run the tests");
        assert!(prompt.contains("after 120 seconds"));
        assert!(prompt.contains("at most 1800"));
    }

    #[test]
    fn every_capability_has_a_template() {
        for capability in [Capability::Admin, Capability::Research] {
            assert!(render(capability, "do it").contains("do it"));
        }
    }
}
