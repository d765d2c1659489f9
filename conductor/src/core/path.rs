//! Lexical path helpers for the workspace boundary.
//!
//! Nothing here touches the filesystem; symlink checks live in
//! `io::workspace`, which re-validates after canonicalization.

use std::path::{Component, Path, PathBuf};

/// Resolve `.` and `..` components without consulting the filesystem.
///
/// Returns `None` when `..` would climb above the first component of an
/// absolute path (for example `/..`).
pub fn normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    let mut depth = 0usize;
    for component in path.components() {
        match component {
            Component::Prefix(prefix) => out.push(prefix.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return None;
                }
                out.pop();
                depth -= 1;
            }
            Component::Normal(part) => {
                out.push(part);
                depth += 1;
            }
        }
    }
    Some(out)
}

/// Join `requested` onto `root` (absolute requests replace it) and normalize.
///
/// Returns `None` when the normalized result is not inside `root`.
pub fn contain(root: &Path, requested: &Path) -> Option<PathBuf> {
    let joined = root.join(requested);
    let normalized = normalize(&joined)?;
    normalized.starts_with(root).then_some(normalized)
}

/// True when `path` (relative to the root) lies under any of `protected`.
pub fn is_under_any(relative: &Path, protected: &[PathBuf]) -> bool {
    protected.iter().any(|prefix| relative.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_dots() {
        assert_eq!(
            normalize(Path::new("/w/a/./b/../c")),
            Some(PathBuf::from("/w/a/c"))
        );
        assert_eq!(normalize(Path::new("/..")), None);
    }

    #[test]
    fn contain_accepts_nested_relative_paths() {
        let root = Path::new("/work/space");
        assert_eq!(
            contain(root, Path::new("src/../src/lib.rs")),
            Some(PathBuf::from("/work/space/src/lib.rs"))
        );
        assert_eq!(contain(root, Path::new(".")), Some(root.to_path_buf()));
    }

    #[test]
    fn contain_rejects_every_escape_form() {
        let root = Path::new("/work/space");
        for escape in [
            "..",
            "../other",
            "a/../../b",
            "/etc/passwd",
            "/work/spaceship/file",
            "./../../..",
        ] {
            assert_eq!(contain(root, Path::new(escape)), None, "{escape}");
        }
    }

    #[test]
    fn contain_accepts_absolute_paths_inside_root() {
        let root = Path::new("/work/space");
        assert_eq!(
            contain(root, Path::new("/work/space/a.txt")),
            Some(PathBuf::from("/work/space/a.txt"))
        );
    }

    #[test]
    fn protected_prefix_matches_components_only() {
        let protected = vec![PathBuf::from("specs")];
        assert!(is_under_any(Path::new("specs/a.md"), &protected));
        assert!(is_under_any(Path::new("specs"), &protected));
        assert!(!is_under_any(Path::new("specsheet.md"), &protected));
    }
}
