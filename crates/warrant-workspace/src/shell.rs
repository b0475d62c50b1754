//! Allowlisted shell command policy.

use std::collections::BTreeSet;
use std::process::Stdio;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{SandboxError, SandboxResult};
use crate::workspace::WorkspacePolicy;

/// Substrings that reject a command line before it is tokenized.
///
/// Covers pipes, redirects, sequencing and backgrounding, command
/// substitution and variable expansion, plus line breaks.
pub const FORBIDDEN_TOKENS: &[&str] = &["|", ">", "<", "&", ";", "$", "`", "\n", "\r"];

/// Programs whose non-flag arguments are file paths that must stay inside
/// the workspace.
const PATH_ARG_COMMANDS: &[&str] = &["cat"];

/// Captured result of an allowlisted command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShellOutput {
    /// The command line as supplied.
    pub command: String,
    /// Process exit code, or `-1` if it was terminated by a signal.
    pub exit_code: i32,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

/// Runs allowlisted programs inside the workspace, never through a shell.
#[derive(Debug, Clone)]
pub struct ShellPolicy {
    workspace: WorkspacePolicy,
    allowed: BTreeSet<String>,
}

impl ShellPolicy {
    /// Create a policy allowing exactly `allowed` program names.
    #[must_use]
    pub fn new<I, S>(workspace: WorkspacePolicy, allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            workspace,
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }

    /// The allowlisted program names, sorted.
    pub fn allowed_commands(&self) -> impl Iterator<Item = &str> {
        self.allowed.iter().map(String::as_str)
    }

    /// Validate a command line and return its tokens.
    ///
    /// # Errors
    ///
    /// - [`SandboxError::ForbiddenToken`] if the raw line holds a metacharacter
    /// - [`SandboxError::MalformedCommand`] if it is empty or has unbalanced quotes
    /// - [`SandboxError::CommandNotAllowed`] if the program is not allowlisted
    /// - a containment error if a `cat` argument leaves the workspace
    pub fn check(&self, command: &str) -> SandboxResult<Vec<String>> {
        if let Some(token) = FORBIDDEN_TOKENS.iter().find(|t| command.contains(**t)) {
            warn!(command, token, "command rejected: forbidden token");
            return Err(SandboxError::ForbiddenToken {
                token: (*token).to_string(),
            });
        }

        let tokens = shlex::split(command)
            .ok_or_else(|| SandboxError::MalformedCommand("unbalanced quotes".into()))?;
        let Some(program) = tokens.first() else {
            return Err(SandboxError::MalformedCommand("command is empty".into()));
        };

        if !self.allowed.contains(program) {
            warn!(command, program, "command rejected: not allowlisted");
            return Err(SandboxError::CommandNotAllowed {
                command: program.clone(),
            });
        }

        if PATH_ARG_COMMANDS.contains(&program.as_str()) {
            for arg in tokens.iter().skip(1).filter(|a| !a.starts_with('-')) {
                self.workspace.resolve(arg)?;
            }
        }

        Ok(tokens)
    }

    /// Validate and run a command in the workspace root.
    ///
    /// A nonzero exit status is a normal result, not an error.
    ///
    /// # Errors
    ///
    /// Returns any [`check`](Self::check) rejection, or [`SandboxError::Io`]
    /// if the process cannot be spawned.
    pub async fn run(&self, command: &str) -> SandboxResult<ShellOutput> {
        let tokens = self.check(command)?;
        let (program, args) = tokens
            .split_first()
            .ok_or_else(|| SandboxError::MalformedCommand("command is empty".into()))?;

        debug!(command, cwd = %self.workspace.root().display(), "running allowlisted command");
        let output = tokio::process::Command::new(program)
            .args(args)
            .current_dir(self.workspace.root())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        let exit_code = output.status.code().unwrap_or(-1);
        debug!(command, exit_code, "command finished");

        Ok(ShellOutput {
            command: command.to_string(),
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
