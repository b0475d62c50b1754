//! Workspace filesystem policy.

use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

use crate::error::{SandboxError, SandboxResult};

/// Result of a contained read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRead {
    /// The path as supplied by the caller.
    pub path: String,
    /// File content, cut at the configured maximum.
    pub content: String,
    /// Whether the file was longer than the maximum.
    pub truncated: bool,
}

/// Result of a contained write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileWrite {
    /// The path as supplied by the caller.
    pub path: String,
    /// Number of bytes written.
    pub bytes_written: usize,
}

/// Confines file access to one directory tree.
#[derive(Debug, Clone)]
pub struct WorkspacePolicy {
    root: PathBuf,
    max_read_bytes: usize,
}

impl WorkspacePolicy {
    /// Create a policy rooted at `root`, creating the directory if needed.
    ///
    /// The root is canonicalized once here; every later check compares
    /// against this resolved form.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::RootUnavailable`] if the directory cannot be
    /// created or resolved.
    pub fn new(root: impl AsRef<Path>, max_read_bytes: usize) -> SandboxResult<Self> {
        let root = root.as_ref();
        std::fs::create_dir_all(root)
            .map_err(|e| SandboxError::RootUnavailable(format!("{}: {e}", root.display())))?;
        let root = root
            .canonicalize()
            .map_err(|e| SandboxError::RootUnavailable(format!("{}: {e}", root.display())))?;
        debug!(root = %root.display(), max_read_bytes, "workspace policy ready");
        Ok(Self {
            root,
            max_read_bytes,
        })
    }

    /// The resolved workspace root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maximum number of bytes returned by [`read`](Self::read).
    #[must_use]
    pub fn max_read_bytes(&self) -> usize {
        self.max_read_bytes
    }

    /// Resolve a caller-supplied path and require it to stay inside the root.
    ///
    /// Existing components are resolved through the filesystem (so symlinks
    /// are followed to their real target); components that do not exist yet
    /// are appended as-is.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::InvalidPath`] for empty or NUL-containing
    /// paths and [`SandboxError::OutsideWorkspace`] when the resolved path
    /// is not under the root.
    pub fn resolve(&self, path: &str) -> SandboxResult<PathBuf> {
        if path.trim().is_empty() {
            return Err(SandboxError::InvalidPath {
                path: path.to_string(),
                reason: "path is empty".into(),
            });
        }
        if path.contains('\0') {
            return Err(SandboxError::InvalidPath {
                path: path.to_string(),
                reason: "path contains a NUL byte".into(),
            });
        }

        let resolved = physical_resolve(&self.root.join(path)).map_err(|e| {
            warn!(path, error = %e, "path has an unresolvable symlink");
            SandboxError::InvalidPath {
                path: path.to_string(),
                reason: "symlink cannot be resolved".into(),
            }
        })?;
        if !resolved.starts_with(&self.root) {
            warn!(path, resolved = %resolved.display(), "path escapes workspace");
            return Err(SandboxError::OutsideWorkspace {
                path: path.to_string(),
            });
        }
        Ok(resolved)
    }

    /// Read a file inside the workspace, capped at the configured maximum.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::NotFound`] if the path is missing or not a
    /// regular file, or any containment error from [`resolve`](Self::resolve).
    pub async fn read(&self, path: &str) -> SandboxResult<FileRead> {
        let resolved = self.resolve(path)?;
        match tokio::fs::metadata(&resolved).await {
            Ok(meta) if meta.is_file() => {},
            _ => {
                return Err(SandboxError::NotFound {
                    path: path.to_string(),
                });
            },
        }

        let file = tokio::fs::File::open(&resolved).await?;
        let limit = u64::try_from(self.max_read_bytes).unwrap_or(u64::MAX);
        let mut buf = Vec::new();
        // One extra byte tells us whether anything was cut off.
        file.take(limit.saturating_add(1))
            .read_to_end(&mut buf)
            .await?;

        let truncated = buf.len() > self.max_read_bytes;
        buf.truncate(self.max_read_bytes);

        Ok(FileRead {
            path: path.to_string(),
            content: decode_prefix(buf),
            truncated,
        })
    }

    /// Write a file inside the workspace, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns a containment error from [`resolve`](Self::resolve),
    /// [`SandboxError::InvalidPath`] if the target is a directory, or an I/O
    /// error.
    pub async fn write(&self, path: &str, content: &str) -> SandboxResult<FileWrite> {
        let resolved = self.resolve(path)?;
        if tokio::fs::metadata(&resolved)
            .await
            .is_ok_and(|meta| meta.is_dir())
        {
            return Err(SandboxError::InvalidPath {
                path: path.to_string(),
                reason: "target is a directory".into(),
            });
        }
        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&resolved, content.as_bytes()).await?;
        debug!(path, bytes = content.len(), "workspace file written");

        Ok(FileWrite {
            path: path.to_string(),
            bytes_written: content.len(),
        })
    }
}

/// Resolve `path` the way the kernel would: follow symlinks for every
/// component that exists and apply `..` to the already-resolved prefix.
///
/// Fails on a link that exists but cannot be followed, such as a dangling
/// link or a loop.
fn physical_resolve(path: &Path) -> std::io::Result<PathBuf> {
    let mut resolved = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => resolved.push(component.as_os_str()),
            Component::CurDir => {},
            Component::ParentDir => {
                resolved.pop();
            },
            Component::Normal(part) => {
                resolved.push(part);
                if std::fs::symlink_metadata(&resolved).is_ok() {
                    resolved = resolved.canonicalize()?;
                }
            },
        }
    }
    Ok(resolved)
}

/// Decode bytes as UTF-8, dropping a multi-byte character cut in half at the
/// end and replacing any other invalid sequences.
fn decode_prefix(mut bytes: Vec<u8>) -> String {
    match std::str::from_utf8(&bytes) {
        Ok(_) => {},
        Err(e) if e.error_len().is_none() => bytes.truncate(e.valid_up_to()),
        Err(_) => return String::from_utf8_lossy(&bytes).into_owned(),
    }
    String::from_utf8(bytes).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max: usize) -> (WorkspacePolicy, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let policy = WorkspacePolicy::new(dir.path().join("ws"), max).unwrap();
        (policy, dir)
    }

    #[test]
    fn test_parent_escape_rejected() {
        let (ws, _dir) = policy(1024);
        assert!(matches!(
            ws.resolve("../outside.txt"),
            Err(SandboxError::OutsideWorkspace { .. })
        ));
        assert!(matches!(
            ws.resolve("sub/../../outside.txt"),
            Err(SandboxError::OutsideWorkspace { .. })
        ));
    }

    #[test]
    fn test_nested_path_resolves_under_root() {
        let (ws, _dir) = policy(1024);
        let resolved = ws.resolve("sub/dir/file.txt").unwrap();
        assert!(resolved.starts_with(ws.root()));
        assert_eq!(resolved, ws.root().join("sub/dir/file.txt"));
    }

    #[test]
    fn test_dot_segments_inside_root_allowed() {
        let (ws, _dir) = policy(1024);
        let resolved = ws.resolve("./a/../b.txt").unwrap();
        assert_eq!(resolved, ws.root().join("b.txt"));
    }

    #[test]
    fn test_absolute_path_outside_rejected() {
        let (ws, _dir) = policy(1024);
        assert!(matches!(
            ws.resolve("/etc/passwd"),
            Err(SandboxError::OutsideWorkspace { .. })
        ));
    }

    #[test]
    fn test_sibling_with_shared_prefix_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let ws = WorkspacePolicy::new(dir.path().join("ws"), 1024).unwrap();
        std::fs::create_dir_all(dir.path().join("ws-evil")).unwrap();
        // A string prefix check would accept ".../ws-evil/x".
        assert!(ws.resolve("../ws-evil/x").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_escape_rejected() {
        let (ws, dir) = policy(1024);
        let outside = dir.path().join("outside");
        std::fs::create_dir_all(&outside).unwrap();
        std::os::unix::fs::symlink(&outside, ws.root().join("link")).unwrap();

        assert!(matches!(
            ws.resolve("link/secret.txt"),
            Err(SandboxError::OutsideWorkspace { .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dangling_symlink_rejected() {
        let (ws, _dir) = policy(1024);
        std::os::unix::fs::symlink("/nonexistent/secret.txt", ws.root().join("dangling")).unwrap();
        std::os::unix::fs::symlink("loop", ws.root().join("loop")).unwrap();

        for path in ["dangling", "loop/x.txt"] {
            let err = ws.resolve(path).unwrap_err();
            assert!(matches!(err, SandboxError::InvalidPath { .. }), "{path}");
            assert!(err.is_policy_violation());
        }
        let err = ws.write("dangling", "x").await.unwrap_err();
        assert!(err.is_policy_violation());
        assert!(!Path::new("/nonexistent/secret.txt").exists());
    }

    #[test]
    fn test_empty_path_rejected() {
        let (ws, _dir) = policy(1024);
        assert!(matches!(
            ws.resolve(""),
            Err(SandboxError::InvalidPath { .. })
        ));
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let (ws, _dir) = policy(1024);
        let written = ws.write("notes/r.md", "hi").await.unwrap();
        assert_eq!(written.bytes_written, 2);
        assert_eq!(
            std::fs::read_to_string(ws.root().join("notes/r.md")).unwrap(),
            "hi"
        );

        let read = ws.read("notes/r.md").await.unwrap();
        assert_eq!(read.content, "hi");
        assert!(!read.truncated);
        assert_eq!(read.path, "notes/r.md");
    }

    #[tokio::test]
    async fn test_read_truncates() {
        let (ws, _dir) = policy(4);
        ws.write("long.txt", "abcdefgh").await.unwrap();
        let read = ws.read("long.txt").await.unwrap();
        assert_eq!(read.content, "abcd");
        assert!(read.truncated);

        ws.write("exact.txt", "abcd").await.unwrap();
        assert!(!ws.read("exact.txt").await.unwrap().truncated);
    }

    #[tokio::test]
    async fn test_read_truncation_respects_char_boundary() {
        let (ws, _dir) = policy(4);
        ws.write("u.txt", "abcé").await.unwrap();
        let read = ws.read("u.txt").await.unwrap();
        assert_eq!(read.content, "abc");
        assert!(read.truncated);
    }

    #[tokio::test]
    async fn test_read_missing_or_directory() {
        let (ws, _dir) = policy(1024);
        assert!(matches!(
            ws.read("missing.txt").await,
            Err(SandboxError::NotFound { .. })
        ));
        std::fs::create_dir_all(ws.root().join("subdir")).unwrap();
        let err = ws.read("subdir").await.unwrap_err();
        assert_eq!(err.to_string(), "File not found: subdir");
    }

    #[tokio::test]
    async fn test_write_outside_rejected_without_side_effects() {
        let (ws, dir) = policy(1024);
        assert!(ws.write("../escape.txt", "x").await.is_err());
        assert!(!dir.path().join("escape.txt").exists());
    }
}
