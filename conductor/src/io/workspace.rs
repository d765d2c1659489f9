//! The workspace root and the file tools bound to it.
//!
//! Every path argument goes through [`Workspace::resolve`]: lexical containment
//! first, then a walk that re-checks the target of every symlink on the path,
//! so a link inside the root cannot point outside it.

use std::collections::VecDeque;
use std::ffi::{OsStr, OsString};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::path::{contain, is_under_any};
use crate::error::{ExecutionError, ToolError, ValidationError};

/// How `write_file` treats existing content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    #[default]
    Overwrite,
    Append,
}

impl WriteMode {
    pub fn as_str(self) -> &'static str {
        match self {
            WriteMode::Overwrite => "overwrite",
            WriteMode::Append => "append",
        }
    }
}

/// Write privilege of the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// May not write under protected paths.
    Standard,
    /// May write anywhere inside the root.
    Privileged,
}

#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    protected: Vec<PathBuf>,
    /// Absolute directories owned by the orchestrator itself.
    reserved: Vec<PathBuf>,
}

/// Bound on symlinks followed while resolving one path.
const MAX_SYMLINK_HOPS: usize = 40;

fn relative_parts(path: &Path, root: &Path) -> Option<VecDeque<OsString>> {
    let relative = path.strip_prefix(root).ok()?;
    Some(relative.iter().map(OsStr::to_os_string).collect())
}

impl Workspace {
    /// Open an existing directory as the workspace root.
    ///
    /// `protected` entries are relative to the root.
    pub fn open(root: &Path, protected: &[String]) -> Result<Self> {
        let root = root
            .canonicalize()
            .with_context(|| format!("open workspace root {}", root.display()))?;
        if !root.is_dir() {
            anyhow::bail!("workspace root {} is not a directory", root.display());
        }
        Ok(Self {
            root,
            protected: protected.iter().map(PathBuf::from).collect(),
            reserved: Vec::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a user-supplied path to an absolute path inside the root.
    ///
    /// Components are walked one at a time from the canonical root. Every
    /// symlink met on the way, dangling or not, is read and its target must
    /// itself stay inside the root; the walk then continues from the target.
    pub fn resolve(&self, requested: &str) -> Result<PathBuf, ValidationError> {
        let denied = || {
            warn!(path = requested, "path escapes workspace root");
            ValidationError::PathEscapesRoot {
                path: requested.to_string(),
            }
        };

        let lexical = contain(&self.root, Path::new(requested)).ok_or_else(denied)?;
        let mut pending = relative_parts(&lexical, &self.root).ok_or_else(denied)?;
        let mut resolved = self.root.clone();
        let mut hops = 0;

        while let Some(part) = pending.pop_front() {
            let next = resolved.join(&part);
            let is_link =
                fs::symlink_metadata(&next).is_ok_and(|meta| meta.file_type().is_symlink());
            if !is_link {
                resolved = next;
                continue;
            }
            hops += 1;
            if hops > MAX_SYMLINK_HOPS {
                return Err(denied());
            }
            let target = fs::read_link(&next).map_err(|_| denied())?;
            // `resolved` holds no symlinks, so `..` in the target is lexical here.
            let target = contain(&self.root, &resolved.join(target)).ok_or_else(denied)?;
            let mut rest = relative_parts(&target, &self.root).ok_or_else(denied)?;
            rest.extend(pending);
            pending = rest;
            resolved = self.root.clone();
        }
        Ok(resolved)
    }

    /// Refuse every write under `dir` (an absolute path), whatever the access.
    pub fn reserve(&mut self, dir: PathBuf) {
        self.reserved.push(dir);
    }

    /// True when an absolute path inside the root falls under a protected prefix.
    pub fn is_protected(&self, absolute: &Path) -> bool {
        absolute
            .strip_prefix(&self.root)
            .is_ok_and(|relative| is_under_any(relative, &self.protected))
    }

    pub fn read_file(&self, path: &str) -> Result<String, ToolError> {
        let resolved = self.resolve(path)?;
        if resolved.is_dir() {
            return Err(ExecutionError::Failed(format!(
                "'{path}' is a directory. Use list_dir instead."
            ))
            .into());
        }
        let content = fs::read_to_string(&resolved)
            .map_err(|e| ExecutionError::io(format!("read '{path}'"), e))?;
        debug!(path, bytes = content.len(), "read file");
        Ok(content)
    }

    /// Write `content`, creating parent directories as needed.
    pub fn write_file(
        &self,
        path: &str,
        content: &str,
        mode: WriteMode,
        access: Access,
    ) -> Result<String, ToolError> {
        let resolved = self.resolve(path)?;
        if self.reserved.iter().any(|dir| resolved.starts_with(dir)) {
            warn!(path, "write to orchestrator state refused");
            return Err(ValidationError::ReservedPath {
                path: path.to_string(),
            }
            .into());
        }
        if access == Access::Standard && self.is_protected(&resolved) {
            warn!(path, "write to protected path refused");
            return Err(ValidationError::ProtectedPath {
                path: path.to_string(),
            }
            .into());
        }
        if let Some(parent) = resolved.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ExecutionError::io(format!("create parent of '{path}'"), e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(mode == WriteMode::Append)
            .truncate(mode == WriteMode::Overwrite)
            .open(&resolved)
            .map_err(|e| ExecutionError::io(format!("open '{path}'"), e))?;
        file.write_all(content.as_bytes())
            .map_err(|e| ExecutionError::io(format!("write '{path}'"), e))?;
        debug!(path, bytes = content.len(), mode = mode.as_str(), "wrote file");
        Ok(format!(
            "Successfully wrote {} bytes to {path} (mode={})",
            content.len(),
            mode.as_str()
        ))
    }

    /// Sorted entry names, directories suffixed with `/`.
    pub fn list_dir(&self, path: &str) -> Result<String, ToolError> {
        let resolved = self.resolve(path)?;
        let entries = fs::read_dir(&resolved)
            .map_err(|e| ExecutionError::io(format!("list '{path}'"), e))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ExecutionError::io(format!("list '{path}'"), e))?;
            let mut name = entry.file_name().to_string_lossy().into_owned();
            if entry.path().is_dir() {
                name.push('/');
            }
            names.push(name);
        }
        names.sort();
        if names.is_empty() {
            return Ok("(empty directory)".to_string());
        }
        Ok(names.join("\n"))
    }
}
