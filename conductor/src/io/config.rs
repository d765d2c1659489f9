//! Conductor configuration stored in `conductor.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "conductor.toml";

/// Conductor configuration (TOML).
///
/// Missing fields take their defaults; relative paths are resolved against
/// `workspace_root` by [`ConductorConfig::resolve_path`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConductorConfig {
    pub workspace_root: PathBuf,

    /// System prompt for the manager.
    pub prompt_path: PathBuf,

    /// Operational notes seeded into a fresh session, if present.
    pub notes_file: PathBuf,

    /// Checkpoint, turn logs and the optional log file live here.
    pub state_dir: PathBuf,

    /// Turn ceiling for one session.
    pub max_turns: u32,

    pub persist_checkpoint: bool,

    /// Paths (relative to the root) only the admin executor may write.
    pub protected_paths: Vec<String>,

    pub manager: ManagerConfig,
    pub executor: ExecutorConfig,
    pub backend: BackendConfig,
    pub shell: ShellConfig,
    pub docs: DocsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ManagerConfig {
    pub model: String,
    /// Estimated-token threshold for the governor.
    pub token_limit: usize,
    pub grace_turns: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExecutorConfig {
    pub model: String,
    pub max_steps: u32,
    /// Wall-clock budget per executor run.
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BackendConfig {
    /// Command that answers one reasoning request (JSON on stdin/stdout).
    pub command: Vec<String>,
    pub timeout_secs: u64,
    pub output_limit_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ShellConfig {
    /// Program and arguments placed before `sh -c <command>`.
    pub prefix: Vec<String>,
    pub default_timeout_secs: u64,
    pub max_timeout_secs: u64,
    pub output_limit_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DocsConfig {
    pub base_url: String,
    /// Environment variable holding the optional bearer key.
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for ConductorConfig {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::from("."),
            prompt_path: PathBuf::from("prompts/build.md"),
            notes_file: PathBuf::from("AGENTS.md"),
            state_dir: PathBuf::from(".conductor"),
            max_turns: 200,
            persist_checkpoint: true,
            protected_paths: vec!["specs".to_string()],
            manager: ManagerConfig::default(),
            executor: ExecutorConfig::default(),
            backend: BackendConfig::default(),
            shell: ShellConfig::default(),
            docs: DocsConfig::default(),
        }
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            model: "manager".to_string(),
            token_limit: 100_000,
            grace_turns: 5,
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            model: "executor".to_string(),
            max_steps: 100,
            timeout_secs: 30 * 60,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            timeout_secs: 10 * 60,
            output_limit_bytes: 1_000_000,
        }
    }
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            prefix: Vec::new(),
            default_timeout_secs: 120,
            max_timeout_secs: 30 * 60,
            output_limit_bytes: 100_000,
        }
    }
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://context7.com/api/v2".to_string(),
            api_key_env: "CONTEXT7_API_KEY".to_string(),
            timeout_secs: 60,
        }
    }
}

impl ConductorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_turns == 0 {
            return Err(anyhow!("max_turns must be > 0"));
        }
        if self.manager.token_limit == 0 {
            return Err(anyhow!("manager.token_limit must be > 0"));
        }
        if self.manager.model.trim().is_empty() || self.executor.model.trim().is_empty() {
            return Err(anyhow!("manager.model and executor.model must be non-empty"));
        }
        if self.executor.max_steps == 0 {
            return Err(anyhow!("executor.max_steps must be > 0"));
        }
        if self.executor.timeout_secs == 0 {
            return Err(anyhow!("executor.timeout_secs must be > 0"));
        }
        if self.backend.timeout_secs == 0 || self.backend.output_limit_bytes == 0 {
            return Err(anyhow!(
                "backend.timeout_secs and backend.output_limit_bytes must be > 0"
            ));
        }
        if self.shell.default_timeout_secs == 0 {
            return Err(anyhow!("shell.default_timeout_secs must be > 0"));
        }
        if self.shell.max_timeout_secs < self.shell.default_timeout_secs {
            return Err(anyhow!(
                "shell.max_timeout_secs must be >= shell.default_timeout_secs"
            ));
        }
        if self.shell.output_limit_bytes == 0 {
            return Err(anyhow!("shell.output_limit_bytes must be > 0"));
        }
        if self.docs.timeout_secs == 0 {
            return Err(anyhow!("docs.timeout_secs must be > 0"));
        }
        if self
            .protected_paths
            .iter()
            .any(|p| p.trim().is_empty() || Path::new(p).is_absolute())
        {
            return Err(anyhow!(
                "protected_paths entries must be non-empty relative paths"
            ));
        }
        Ok(())
    }

    /// Resolve a configured path: absolute paths are kept, relative ones are
    /// joined onto `workspace_root`.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace_root.join(path)
        }
    }

    pub fn state_dir(&self) -> PathBuf {
        self.resolve_path(&self.state_dir)
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.state_dir().join("checkpoint.json")
    }
}

/// Keeps everything under the state directory out of commits.
const STATE_GITIGNORE: &str = "*\n";

/// Create the state directory and its `.gitignore`, returning the directory.
///
/// An existing `.gitignore` is left alone.
pub fn prepare_state_dir(config: &ConductorConfig) -> Result<PathBuf> {
    let dir = config.state_dir();
    fs::create_dir_all(&dir).with_context(|| format!("create directory {}", dir.display()))?;
    let ignore = dir.join(".gitignore");
    if !ignore.exists() {
        write_atomic(&ignore, STATE_GITIGNORE)?;
    }
    Ok(dir)
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `ConductorConfig::default()`.
pub fn load_config(path: &Path) -> Result<ConductorConfig> {
    if !path.exists() {
        let cfg = ConductorConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ConductorConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Write `contents` to `path` via a sibling temp file and rename.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let mut tmp_name = path
        .file_name()
        .with_context(|| format!("path missing file name {}", path.display()))?
        .to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = parent.join(tmp_name);
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp file {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}
