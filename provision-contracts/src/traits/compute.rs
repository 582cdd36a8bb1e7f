// SPDX-License-Identifier: GPL-3.0-only

use async_trait::async_trait;

use provision_types::{Arch, ImageArtifact, InstanceHandle, InstanceLifecycle, InstanceSpec};

use crate::ProvisionError;

/// Parameters for launching one compute instance.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub spec: InstanceSpec,
    pub image_id: String,
    pub ssh_public_key: String,
}

/// An attached block volume, as reported by the provisioning API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeAttachment {
    pub volume_id: String,
    pub attachment_id: String,
}

/// The provisioning API surface the workflow consumes.
///
/// All operations are synchronous request/response from the caller's point
/// of view; retry policy lives with the caller, not here.
#[async_trait]
pub trait ComputeApi: Send + Sync {
    async fn launch_instance(
        &self,
        request: &LaunchRequest,
    ) -> Result<InstanceHandle, ProvisionError>;

    async fn get_instance(
        &self,
        instance_id: &str,
    ) -> Result<(InstanceHandle, InstanceLifecycle), ProvisionError>;

    /// Create a block volume of the given size and attach it to an instance.
    async fn attach_data_volume(
        &self,
        instance_id: &str,
        size_gbs: u32,
        display_name: &str,
    ) -> Result<VolumeAttachment, ProvisionError>;

    /// List registered images carrying the given `(content-hash, arch)` tag
    /// pair, newest first.
    async fn find_images(
        &self,
        content_hash: &str,
        arch: Arch,
    ) -> Result<Vec<ImageArtifact>, ProvisionError>;

    /// List every image this tool has registered, newest first.
    async fn list_managed_images(&self) -> Result<Vec<ImageArtifact>, ProvisionError>;

    /// Upload a local file into the staging bucket.
    async fn put_object(&self, object_name: &str, local_path: &str)
    -> Result<(), ProvisionError>;

    async fn delete_object(&self, object_name: &str) -> Result<(), ProvisionError>;

    /// Register a staged object as a bootable image and tag it with the
    /// `(content-hash, arch)` identity. Returns the new image id.
    async fn create_image_from_object(
        &self,
        object_name: &str,
        display_name: &str,
        content_hash: &str,
        arch: Arch,
    ) -> Result<String, ProvisionError>;

    async fn delete_image(&self, image_id: &str) -> Result<(), ProvisionError>;
}
