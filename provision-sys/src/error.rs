// SPDX-License-Identifier: GPL-3.0-only

use thiserror::Error;

/// Error types for system-level operations
#[derive(Error, Debug)]
pub enum SysError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("tool not found: {0}")]
    ToolMissing(String),

    #[error("command failed: {command}; stderr: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("unexpected output: {0}")]
    ParseFailed(String),
}

/// Result type alias for system operations
pub type Result<T> = std::result::Result<T, SysError>;
