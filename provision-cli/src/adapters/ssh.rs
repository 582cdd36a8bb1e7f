// SPDX-License-Identifier: GPL-3.0-only

//! Remote command channel over the system `ssh` binary

use std::process::Command;

use async_trait::async_trait;

use provision_contracts::{ExecOutput, GuestChannel, ProvisionError, ProvisionErrorKind};

/// ssh reserves 255 for its own failures; everything else is the remote
/// command's exit status.
const SSH_TRANSPORT_FAILURE: i32 = 255;

pub struct SshChannel {
    target: String,
}

impl SshChannel {
    pub fn new(user: &str, host: &str) -> Result<Self, ProvisionError> {
        which::which("ssh").map_err(|_| {
            ProvisionError::new(ProvisionErrorKind::Unavailable, "ssh binary not found")
        })?;

        Ok(Self {
            target: format!("{user}@{host}"),
        })
    }
}

#[async_trait]
impl GuestChannel for SshChannel {
    async fn exec(&self, command: &str) -> Result<ExecOutput, ProvisionError> {
        tracing::debug!(target = %self.target, %command, "remote exec");

        let output = Command::new("ssh")
            .args([
                "-o",
                "BatchMode=yes",
                "-o",
                "StrictHostKeyChecking=accept-new",
                "-o",
                "ConnectTimeout=10",
                self.target.as_str(),
                command,
            ])
            .output()
            .map_err(|error| {
                ProvisionError::new(ProvisionErrorKind::Unavailable, error.to_string())
            })?;

        let exit_code = output.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if exit_code == SSH_TRANSPORT_FAILURE {
            return Err(ProvisionError::new(
                ProvisionErrorKind::Unavailable,
                format!("ssh to {} failed: {}", self.target, stderr.trim()),
            ));
        }

        Ok(ExecOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr,
        })
    }
}
