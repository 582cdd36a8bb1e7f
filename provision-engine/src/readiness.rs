// SPDX-License-Identifier: GPL-3.0-only

//! Boot-readiness gate: poll the guest until the OS signals full readiness

use std::time::Duration;

use provision_contracts::{GuestChannel, ProvisionError};
use provision_sys::fsops;

/// Marker the guest exposes once activation has finished.
pub const READY_MARKER: &str = "/run/current-system";

/// Probe configuration. Fixed cadence, no backoff; the effective deadline
/// is `interval * attempts`, enforced here rather than by wall clock.
#[derive(Debug, Clone)]
pub struct ReadinessProbe {
    pub marker_path: String,
    pub interval: Duration,
    pub attempts: u32,
}

impl Default for ReadinessProbe {
    fn default() -> Self {
        Self {
            marker_path: READY_MARKER.to_string(),
            interval: Duration::from_secs(10),
            attempts: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    Timeout,
}

/// Repeatedly execute the readiness probe over the remote channel until it
/// succeeds or the attempt budget runs out. Probe failures (including an
/// unreachable host while sshd is still coming up) count as "not ready yet",
/// not as errors.
pub async fn wait_for_ready(
    channel: &dyn GuestChannel,
    probe: &ReadinessProbe,
) -> Result<Readiness, ProvisionError> {
    let command = fsops::test_exists(&probe.marker_path);

    for attempt in 1..=probe.attempts {
        match channel.exec(&command).await {
            Ok(output) if output.success() => {
                tracing::info!(attempt, "guest is ready");
                return Ok(Readiness::Ready);
            }
            Ok(_) => {
                tracing::debug!(attempt, attempts = probe.attempts, "guest not ready yet");
            }
            Err(error) => {
                tracing::debug!(attempt, attempts = probe.attempts, "probe failed: {error}");
            }
        }

        if attempt < probe.attempts {
            tokio::time::sleep(probe.interval).await;
        }
    }

    Ok(Readiness::Timeout)
}
