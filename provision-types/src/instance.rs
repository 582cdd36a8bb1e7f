//! Compute instance specifications and runtime handles

use serde::{Deserialize, Serialize};

use crate::image::Arch;

/// Declarative description of one compute instance, loaded from the
/// operator's TOML spec file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceSpec {
    /// Instance display name
    pub name: String,

    /// Guest architecture; selects the image to resolve
    pub arch: Arch,

    /// Provider shape name (e.g., "VM.Standard.A1.Flex")
    pub shape: String,

    /// CPU count for flexible shapes
    pub ocpus: u32,

    /// Memory in gigabytes for flexible shapes
    pub memory_gbs: u32,

    /// Boot volume size in gigabytes
    pub boot_volume_gbs: u32,

    /// Size of the attached data block volume in gigabytes
    pub block_volume_gbs: u32,

    /// Subnet the primary VNIC attaches to
    pub subnet_id: String,

    /// User the remote command channel logs in as
    #[serde(default = "default_ssh_user")]
    pub ssh_user: String,
}

fn default_ssh_user() -> String {
    "root".to_string()
}

/// Lifecycle state reported by the provisioning API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceLifecycle {
    Provisioning,
    Starting,
    Running,
    Stopping,
    Stopped,
    Terminating,
    Terminated,
}

impl InstanceLifecycle {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminating | Self::Terminated)
    }
}

/// Handle to a launched instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceHandle {
    /// Provider instance id
    pub id: String,

    /// Public address of the primary VNIC, once assigned
    pub public_ip: Option<String>,
}
