// SPDX-License-Identifier: GPL-3.0-only

use async_trait::async_trait;

use provision_types::DeviceInventory;

use crate::{ExecOutput, ProvisionError, SyncMode};

/// The remote command channel: executes a shell command on the guest and
/// returns its exit status and output. Transport failure is the only error;
/// a non-zero exit status comes back inside the `ExecOutput`.
#[async_trait]
pub trait GuestChannel: Send + Sync {
    async fn exec(&self, command: &str) -> Result<ExecOutput, ProvisionError>;
}

/// Block-device capability the bootstrap orchestrator is handed.
///
/// Implementations translate each operation into guest commands (or, in
/// tests, into transitions of an in-memory device model), keeping the state
/// machine itself free of device I/O.
#[async_trait]
pub trait BlockDeviceOps: Send + Sync {
    /// Scan the guest and return a fresh inventory snapshot.
    async fn list_devices(&self) -> Result<DeviceInventory, ProvisionError>;

    async fn volume_group_exists(&self, vg_name: &str) -> Result<bool, ProvisionError>;

    /// Grow a partition to the end of its disk. Already-at-max is success.
    async fn grow_partition(&self, disk: &str, number: u32) -> Result<(), ProvisionError>;

    /// Initialize a device as an LVM physical volume, wiping prior LVM
    /// metadata. Destructive; callers must have ruled out a live VG first.
    async fn init_physical_volume(&self, device: &str) -> Result<(), ProvisionError>;

    async fn create_volume_group(
        &self,
        vg_name: &str,
        devices: &[String],
    ) -> Result<(), ProvisionError>;

    /// Create a logical volume consuming all free space in the group.
    async fn create_logical_volume(&self, vg_name: &str, lv_name: &str)
    -> Result<(), ProvisionError>;

    async fn format_btrfs(&self, device: &str, label: &str) -> Result<(), ProvisionError>;

    async fn mount(
        &self,
        device: &str,
        target: &str,
        options: &[String],
    ) -> Result<(), ProvisionError>;

    async fn unmount(&self, target: &str) -> Result<(), ProvisionError>;

    async fn create_subvolume(&self, path: &str) -> Result<(), ProvisionError>;
}

/// Guest filesystem operations outside the block layer.
#[async_trait]
pub trait GuestFiles: Send + Sync {
    async fn path_exists(&self, path: &str) -> Result<bool, ProvisionError>;

    /// Whether a directory exists and contains at least one entry.
    async fn dir_has_entries(&self, path: &str) -> Result<bool, ProvisionError>;

    async fn read_file(&self, path: &str) -> Result<String, ProvisionError>;

    async fn write_file(&self, path: &str, contents: &str) -> Result<(), ProvisionError>;

    async fn make_dir(&self, path: &str) -> Result<(), ProvisionError>;

    async fn remove_dir(&self, path: &str) -> Result<(), ProvisionError>;

    /// Recursively copy `source` into `dest`, preserving attributes, ACLs
    /// and extended attributes. `Mirror` additionally deletes entries that
    /// exist only at the destination.
    async fn sync_tree(
        &self,
        source: &str,
        dest: &str,
        mode: SyncMode,
    ) -> Result<(), ProvisionError>;
}

/// System configuration operations used by the apply variant.
#[async_trait]
pub trait SystemOps: Send + Sync {
    /// Build and stage the new system configuration without switching to it.
    async fn rebuild_boot(&self) -> Result<(), ProvisionError>;

    async fn reboot(&self) -> Result<(), ProvisionError>;
}

/// Exclusive claim over the bootstrap execution window.
///
/// Marker-file existence alone cannot arbitrate two concurrent invocations;
/// implementations provide an atomic acquire (compare-and-swap or an atomic
/// directory create) that exactly one caller wins.
#[async_trait]
pub trait BootstrapLock: Send + Sync {
    /// Returns `true` when this caller now holds the lock.
    async fn try_acquire(&self) -> Result<bool, ProvisionError>;

    async fn release(&self) -> Result<(), ProvisionError>;
}
