// SPDX-License-Identifier: GPL-3.0-only

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionErrorKind {
    InvalidInput,
    NotFound,
    CommandFailed,
    Busy,
    Timeout,
    Unavailable,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind:?}: {message}")]
pub struct ProvisionError {
    pub kind: ProvisionErrorKind,
    pub message: String,
}

impl ProvisionError {
    pub fn new(kind: ProvisionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// A guest command exited non-zero; carries the command context and the
    /// captured stderr for manual diagnosis of destructive procedures.
    pub fn command_failed(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::new(
            ProvisionErrorKind::CommandFailed,
            format!("{}: {}", command.into(), stderr.into()),
        )
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == ProvisionErrorKind::Timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provision_error_roundtrips() {
        let error = ProvisionError::new(ProvisionErrorKind::Busy, "bootstrap lock held");
        let json = serde_json::to_string(&error).expect("serialize error");
        let parsed: ProvisionError = serde_json::from_str(&json).expect("deserialize error");
        assert_eq!(parsed, error);
    }

    #[test]
    fn command_failed_carries_context() {
        let error = ProvisionError::command_failed("vgcreate datavg", "device busy");
        assert_eq!(error.kind, ProvisionErrorKind::CommandFailed);
        assert!(error.message.contains("vgcreate datavg"));
        assert!(error.message.contains("device busy"));
    }
}
