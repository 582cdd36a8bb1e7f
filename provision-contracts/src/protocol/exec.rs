// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};

/// Result of one remote command execution.
///
/// A non-zero exit status is data, not a transport error: callers decide
/// whether a failing probe (e.g., `test -f`) is an error or an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Shorthand for a clean run with the given stdout, used by fakes.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Shorthand for a failed run with the given exit code and stderr.
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// How `sync_tree` treats entries present at the destination only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// One-way additive copy; nothing at the destination is deleted.
    Additive,
    /// Exact mirror; destination-only entries are removed.
    Mirror,
}
