// SPDX-License-Identifier: GPL-3.0-only

//! Instance provisioning: launch and wait for the running state

use std::time::Duration;

use provision_contracts::{
    ComputeApi, LaunchRequest, ProvisionError, ProvisionErrorKind, VolumeAttachment,
};
use provision_types::{InstanceHandle, InstanceSpec, bytes_to_pretty};

/// Launches instances and waits for them to become schedulable targets for
/// the rest of the workflow.
pub struct InstanceProvisioner<'a> {
    api: &'a dyn ComputeApi,

    /// Delay between lifecycle polls
    pub poll_interval: Duration,

    /// Number of lifecycle polls before giving up
    pub poll_attempts: u32,
}

impl<'a> InstanceProvisioner<'a> {
    pub fn new(api: &'a dyn ComputeApi) -> Self {
        Self {
            api,
            poll_interval: Duration::from_secs(10),
            poll_attempts: 60,
        }
    }

    /// Launch an instance from the resolved image and poll until it reports
    /// `RUNNING`. A terminal lifecycle state fails immediately; exhausting
    /// the poll budget is a timeout.
    pub async fn launch(
        &self,
        spec: &InstanceSpec,
        image_id: &str,
        ssh_public_key: &str,
    ) -> Result<InstanceHandle, ProvisionError> {
        let request = LaunchRequest {
            spec: spec.clone(),
            image_id: image_id.to_string(),
            ssh_public_key: ssh_public_key.to_string(),
        };

        let launched = self.api.launch_instance(&request).await?;
        tracing::info!(instance_id = %launched.id, name = %spec.name, "instance launch requested");

        for attempt in 1..=self.poll_attempts {
            let (handle, lifecycle) = self.api.get_instance(&launched.id).await?;

            if lifecycle.is_running() {
                tracing::info!(
                    instance_id = %handle.id,
                    public_ip = handle.public_ip.as_deref().unwrap_or("<none>"),
                    "instance is running"
                );
                return Ok(handle);
            }
            if lifecycle.is_terminal() {
                return Err(ProvisionError::new(
                    ProvisionErrorKind::Unavailable,
                    format!("instance {} entered {:?} while provisioning", handle.id, lifecycle),
                ));
            }

            tracing::debug!(attempt, attempts = self.poll_attempts, ?lifecycle, "waiting for instance");
            if attempt < self.poll_attempts {
                tokio::time::sleep(self.poll_interval).await;
            }
        }

        Err(ProvisionError::new(
            ProvisionErrorKind::Timeout,
            format!("instance {} did not reach RUNNING", launched.id),
        ))
    }

    /// Create the data block volume for a spec and attach it.
    pub async fn attach_data_volume(
        &self,
        spec: &InstanceSpec,
        instance_id: &str,
    ) -> Result<VolumeAttachment, ProvisionError> {
        let display_name = format!("{}-data", spec.name);
        let attachment = self
            .api
            .attach_data_volume(instance_id, spec.block_volume_gbs, &display_name)
            .await?;
        let size_bytes = u64::from(spec.block_volume_gbs) * 1024 * 1024 * 1024;
        tracing::info!(
            volume_id = %attachment.volume_id,
            %instance_id,
            size = %bytes_to_pretty(&size_bytes, false),
            "data volume attached"
        );
        Ok(attachment)
    }
}
