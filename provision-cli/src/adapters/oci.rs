// SPDX-License-Identifier: GPL-3.0-only

//! Provisioning API over the `oci` CLI
//!
//! Each operation shells out to the CLI with `--output json` and parses the
//! response envelope. Credentials travel through the `OCI_CLI_*` environment
//! the CLI already reads; they never pass through argv.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use provision_contracts::{
    ComputeApi, LaunchRequest, ProvisionError, ProvisionErrorKind, VolumeAttachment,
};
use provision_sys::cmd;
use provision_types::{Arch, ImageArtifact, InstanceHandle, InstanceLifecycle};

use crate::config::Credentials;

/// Freeform tag carrying the content hash of a managed image.
const TAG_CONTENT_HASH: &str = "provision-content-hash";

/// Freeform tag carrying the architecture of a managed image.
const TAG_ARCH: &str = "provision-arch";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct InstanceData {
    id: String,
    #[serde(rename = "lifecycle-state")]
    lifecycle_state: InstanceLifecycle,
}

#[derive(Debug, Deserialize)]
struct VnicData {
    #[serde(rename = "public-ip")]
    public_ip: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    id: String,
    #[serde(rename = "display-name")]
    display_name: String,
    #[serde(rename = "time-created")]
    time_created: Option<DateTime<Utc>>,
    #[serde(rename = "freeform-tags", default)]
    freeform_tags: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct VolumeData {
    id: String,
}

#[derive(Debug, Deserialize)]
struct AttachmentData {
    id: String,
    #[serde(rename = "volume-id")]
    volume_id: String,
}

#[derive(Debug, Deserialize)]
struct AvailabilityDomain {
    name: String,
}

pub struct OciCli {
    credentials: Credentials,
}

impl OciCli {
    pub fn new(credentials: Credentials) -> Result<Self, ProvisionError> {
        which::which("oci").map_err(|_| {
            ProvisionError::new(ProvisionErrorKind::Unavailable, "oci binary not found")
        })?;
        Ok(Self { credentials })
    }

    fn run(&self, args: &[&str]) -> Result<String, ProvisionError> {
        let args: Vec<String> = args
            .iter()
            .map(ToString::to_string)
            .chain(["--output".to_string(), "json".to_string()])
            .collect();
        cmd::run("oci", &args).map_err(|error| {
            ProvisionError::new(ProvisionErrorKind::Unavailable, error.to_string())
        })
    }

    fn parse<T: serde::de::DeserializeOwned>(&self, output: &str) -> Result<T, ProvisionError> {
        serde_json::from_str::<Envelope<T>>(output)
            .map(|envelope| envelope.data)
            .map_err(|error| {
                ProvisionError::new(
                    ProvisionErrorKind::Internal,
                    format!("unexpected oci response: {error}"),
                )
            })
    }

    fn availability_domain(&self) -> Result<String, ProvisionError> {
        let output = self.run(&[
            "iam",
            "availability-domain",
            "list",
            "--compartment-id",
            &self.credentials.tenancy,
        ])?;
        let domains: Vec<AvailabilityDomain> = self.parse(&output)?;
        domains
            .into_iter()
            .next()
            .map(|domain| domain.name)
            .ok_or_else(|| {
                ProvisionError::new(ProvisionErrorKind::NotFound, "no availability domains")
            })
    }

    fn namespace(&self) -> Result<String, ProvisionError> {
        let output = self.run(&["os", "ns", "get"])?;
        self.parse(&output)
    }

    fn public_ip(&self, instance_id: &str) -> Option<String> {
        let output = self
            .run(&[
                "compute",
                "instance",
                "list-vnics",
                "--instance-id",
                instance_id,
            ])
            .ok()?;
        let vnics: Vec<VnicData> = self.parse(&output).ok()?;
        vnics.into_iter().next().and_then(|vnic| vnic.public_ip)
    }

    fn artifact_from(&self, image: ImageData) -> Option<ImageArtifact> {
        let content_hash = image.freeform_tags.get(TAG_CONTENT_HASH)?.clone();
        let arch: Arch = image.freeform_tags.get(TAG_ARCH)?.parse().ok()?;
        Some(ImageArtifact {
            arch,
            content_hash,
            image_id: Some(image.id),
            display_name: image.display_name,
            time_created: image.time_created,
        })
    }

    fn list_images(&self) -> Result<Vec<ImageArtifact>, ProvisionError> {
        let output = self.run(&[
            "compute",
            "image",
            "list",
            "--compartment-id",
            &self.credentials.compartment,
            "--all",
        ])?;
        let images: Vec<ImageData> = self.parse(&output)?;

        let mut artifacts: Vec<ImageArtifact> = images
            .into_iter()
            .filter_map(|image| self.artifact_from(image))
            .collect();
        artifacts.sort_by(|left, right| right.time_created.cmp(&left.time_created));
        Ok(artifacts)
    }
}

#[async_trait]
impl ComputeApi for OciCli {
    async fn launch_instance(
        &self,
        request: &LaunchRequest,
    ) -> Result<InstanceHandle, ProvisionError> {
        let availability_domain = self.availability_domain()?;
        let shape_config = json!({
            "ocpus": request.spec.ocpus,
            "memoryInGBs": request.spec.memory_gbs,
        })
        .to_string();
        let metadata = json!({ "ssh_authorized_keys": request.ssh_public_key }).to_string();
        let boot_volume = request.spec.boot_volume_gbs.to_string();

        let output = self.run(&[
            "compute",
            "instance",
            "launch",
            "--compartment-id",
            &self.credentials.compartment,
            "--availability-domain",
            &availability_domain,
            "--display-name",
            &request.spec.name,
            "--shape",
            &request.spec.shape,
            "--shape-config",
            &shape_config,
            "--image-id",
            &request.image_id,
            "--subnet-id",
            &request.spec.subnet_id,
            "--assign-public-ip",
            "true",
            "--boot-volume-size-in-gbs",
            &boot_volume,
            "--metadata",
            &metadata,
        ])?;
        let instance: InstanceData = self.parse(&output)?;

        Ok(InstanceHandle {
            id: instance.id,
            public_ip: None,
        })
    }

    async fn get_instance(
        &self,
        instance_id: &str,
    ) -> Result<(InstanceHandle, InstanceLifecycle), ProvisionError> {
        let output = self.run(&[
            "compute",
            "instance",
            "get",
            "--instance-id",
            instance_id,
        ])?;
        let instance: InstanceData = self.parse(&output)?;

        let public_ip = if instance.lifecycle_state.is_running() {
            self.public_ip(instance_id)
        } else {
            None
        };

        Ok((
            InstanceHandle {
                id: instance.id,
                public_ip,
            },
            instance.lifecycle_state,
        ))
    }

    async fn attach_data_volume(
        &self,
        instance_id: &str,
        size_gbs: u32,
        display_name: &str,
    ) -> Result<VolumeAttachment, ProvisionError> {
        let availability_domain = self.availability_domain()?;
        let size = size_gbs.to_string();

        let output = self.run(&[
            "bv",
            "volume",
            "create",
            "--compartment-id",
            &self.credentials.compartment,
            "--availability-domain",
            &availability_domain,
            "--display-name",
            display_name,
            "--size-in-gbs",
            &size,
            "--wait-for-state",
            "AVAILABLE",
        ])?;
        let volume: VolumeData = self.parse(&output)?;

        let output = self.run(&[
            "compute",
            "volume-attachment",
            "attach",
            "--type",
            "paravirtualized",
            "--instance-id",
            instance_id,
            "--volume-id",
            &volume.id,
        ])?;
        let attachment: AttachmentData = self.parse(&output)?;

        Ok(VolumeAttachment {
            volume_id: attachment.volume_id,
            attachment_id: attachment.id,
        })
    }

    async fn find_images(
        &self,
        content_hash: &str,
        arch: Arch,
    ) -> Result<Vec<ImageArtifact>, ProvisionError> {
        Ok(self
            .list_images()?
            .into_iter()
            .filter(|artifact| artifact.content_hash == content_hash && artifact.arch == arch)
            .collect())
    }

    async fn list_managed_images(&self) -> Result<Vec<ImageArtifact>, ProvisionError> {
        self.list_images()
    }

    async fn put_object(
        &self,
        object_name: &str,
        local_path: &str,
    ) -> Result<(), ProvisionError> {
        self.run(&[
            "os",
            "object",
            "put",
            "--bucket-name",
            &self.credentials.bucket,
            "--name",
            object_name,
            "--file",
            local_path,
            "--force",
        ])
        .map(drop)
    }

    async fn delete_object(&self, object_name: &str) -> Result<(), ProvisionError> {
        self.run(&[
            "os",
            "object",
            "delete",
            "--bucket-name",
            &self.credentials.bucket,
            "--object-name",
            object_name,
            "--force",
        ])
        .map(drop)
    }

    async fn create_image_from_object(
        &self,
        object_name: &str,
        display_name: &str,
        content_hash: &str,
        arch: Arch,
    ) -> Result<String, ProvisionError> {
        let namespace = self.namespace()?;
        let source_details = json!({
            "sourceType": "objectStorageTuple",
            "bucketName": self.credentials.bucket,
            "namespaceName": namespace,
            "objectName": object_name,
        })
        .to_string();
        let mut tags = serde_json::Map::new();
        tags.insert(TAG_CONTENT_HASH.to_string(), json!(content_hash));
        tags.insert(TAG_ARCH.to_string(), json!(arch.tag()));
        let tags = serde_json::Value::Object(tags).to_string();

        let output = self.run(&[
            "compute",
            "image",
            "create",
            "--compartment-id",
            &self.credentials.compartment,
            "--display-name",
            display_name,
            "--image-source-details",
            &source_details,
            "--freeform-tags",
            &tags,
            "--wait-for-state",
            "AVAILABLE",
        ])?;
        let image: ImageData = self.parse(&output)?;
        Ok(image.id)
    }

    async fn delete_image(&self, image_id: &str) -> Result<(), ProvisionError> {
        self.run(&[
            "compute",
            "image",
            "delete",
            "--image-id",
            image_id,
            "--force",
        ])
        .map(drop)
    }
}
