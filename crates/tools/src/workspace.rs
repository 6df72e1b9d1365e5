//! Workspace scoping for tool paths.
//!
//! Every path the model hands a tool is resolved against the configured
//! workspace root. With restriction on, paths that climb out of the root
//! (`..` components, or absolute paths elsewhere) are refused.

use codewright_core::error::ToolError;
use std::path::{Component, Path, PathBuf};

/// Error returned when a tool path is refused.
#[derive(Debug, thiserror::Error)]
pub enum PathValidationError {
    #[error("Path '{path}' is outside the workspace root")]
    OutsideWorkspace { path: String },

    #[error("Path traversal detected in '{path}'")]
    PathTraversal { path: String },
}

/// The directory tools operate in.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
    restrict: bool,
}

impl Workspace {
    /// A relative root is anchored at the current directory.
    pub fn new(root: impl Into<PathBuf>, restrict: bool) -> Self {
        let root = root.into();
        let root = std::path::absolute(&root).unwrap_or(root);
        Self {
            root: normalize(&root),
            restrict,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a tool path to the location it names on disk.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, PathValidationError> {
        let input = Path::new(path);

        if self.restrict && input.components().any(|c| c == Component::ParentDir) {
            return Err(PathValidationError::PathTraversal { path: path.into() });
        }

        let joined = if input.is_absolute() {
            normalize(input)
        } else {
            normalize(&self.root.join(input))
        };

        if self.restrict && !joined.starts_with(&self.root) {
            return Err(PathValidationError::OutsideWorkspace { path: path.into() });
        }

        Ok(joined)
    }

    /// [`Workspace::resolve`], reported as a tool permission error.
    pub fn resolve_for(&self, tool: &str, path: &str) -> Result<PathBuf, ToolError> {
        self.resolve(path).map_err(|e| ToolError::PermissionDenied {
            tool_name: tool.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Lexically drop `.` components and fold `..` into its parent.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_join_root() {
        let ws = Workspace::new("/srv/ws", true);
        assert_eq!(ws.resolve("app/main.py").unwrap(), PathBuf::from("/srv/ws/app/main.py"));
        assert_eq!(ws.resolve(".").unwrap(), PathBuf::from("/srv/ws"));
        assert_eq!(ws.resolve("./a/./b").unwrap(), PathBuf::from("/srv/ws/a/b"));
    }

    #[test]
    fn traversal_blocked() {
        let ws = Workspace::new("/srv/ws", true);
        assert!(matches!(
            ws.resolve("../../etc/passwd"),
            Err(PathValidationError::PathTraversal { .. })
        ));
        assert!(matches!(
            ws.resolve("a/../../b"),
            Err(PathValidationError::PathTraversal { .. })
        ));
    }

    #[test]
    fn absolute_paths_must_stay_inside() {
        let ws = Workspace::new("/srv/ws", true);
        assert!(ws.resolve("/srv/ws/x.txt").is_ok());
        assert!(matches!(
            ws.resolve("/etc/passwd"),
            Err(PathValidationError::OutsideWorkspace { .. })
        ));
        assert!(ws.resolve("/srv/wsx/file").is_err());
    }

    #[test]
    fn unrestricted_allows_anything() {
        let ws = Workspace::new("/srv/ws", false);
        assert_eq!(ws.resolve("../other").unwrap(), PathBuf::from("/srv/other"));
        assert_eq!(ws.resolve("/etc/hosts").unwrap(), PathBuf::from("/etc/hosts"));
    }

    #[test]
    fn relative_root_is_anchored() {
        let ws = Workspace::new(".", true);
        assert!(ws.root().is_absolute());
        assert!(ws.resolve("a.txt").unwrap().starts_with(ws.root()));
    }

    #[test]
    fn permission_error_names_tool() {
        let ws = Workspace::new("/srv/ws", true);
        let err = ws.resolve_for("read_file", "../x").unwrap_err();
        assert!(matches!(err, ToolError::PermissionDenied { ref tool_name, .. } if tool_name == "read_file"));
    }
}
