//! Warrant Workspace - containment policies for tool executors.
//!
//! Two policies limit what a privileged executor may touch:
//!
//! - [`WorkspacePolicy`] resolves caller-supplied paths against one
//!   pre-resolved root directory. Containment is decided on the fully
//!   resolved absolute path (symlinks and `..` followed), never on a string
//!   prefix.
//! - [`ShellPolicy`] accepts a command line only if it is free of shell
//!   metacharacters, its program is on a static allowlist, and (for `cat`)
//!   every file argument stays inside the workspace. Allowed commands run
//!   without a shell, inside the workspace root.
//!
//! # Example
//!
//! ```
//! use warrant_workspace::{ShellPolicy, WorkspacePolicy};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let workspace = WorkspacePolicy::new(dir.path(), 65_536).unwrap();
//!
//! assert!(workspace.resolve("../outside.txt").is_err());
//! assert!(workspace.resolve("sub/dir/file.txt").unwrap().starts_with(workspace.root()));
//!
//! let shell = ShellPolicy::new(workspace, ["ls", "pwd", "cat"]);
//! assert!(shell.check("ls | cat").is_err());
//! assert!(shell.check("rm -rf /").is_err());
//! assert!(shell.check("ls -la").is_ok());
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod error;
mod shell;
mod workspace;

pub use error::{SandboxError, SandboxResult};
pub use shell::{FORBIDDEN_TOKENS, ShellOutput, ShellPolicy};
pub use workspace::{FileRead, FileWrite, WorkspacePolicy};
