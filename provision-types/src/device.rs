//! Guest block-device inventory and role classification
//!
//! An inventory is a snapshot of what `lsblk` reported at one point in time.
//! Detection always rebuilds a fresh inventory and re-derives the roles from
//! it; nothing in here caches or mutates across scans.

use serde::{Deserialize, Serialize};

/// Filesystem label that marks the EFI System Partition on the boot disk.
pub const ESP_LABEL: &str = "ESP";

/// A partition as observed on the guest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    /// Device path (e.g., "/dev/sda1")
    pub path: String,

    /// Filesystem label, if any
    pub label: Option<String>,
}

/// A whole disk as observed on the guest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDevice {
    /// Device path (e.g., "/dev/sda")
    pub path: String,

    /// Child partitions in on-disk order
    pub partitions: Vec<Partition>,
}

impl BlockDevice {
    /// Number of partition-equivalent entries this device reports: the
    /// device itself plus each child partition.
    pub fn entry_count(&self) -> usize {
        1 + self.partitions.len()
    }

    /// Whether the first child partition carries the ESP filesystem label.
    pub fn has_esp_first_partition(&self) -> bool {
        self.partitions
            .first()
            .and_then(|partition| partition.label.as_deref())
            .is_some_and(|label| label == ESP_LABEL)
    }
}

/// Snapshot of all whole disks visible on the guest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInventory {
    pub devices: Vec<BlockDevice>,
}

/// Role a device plays in the storage layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceRole {
    BootDisk,
    BlockVolume,
    Unclassified,
}

/// Result of classifying one inventory snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceClassification {
    /// The disk carrying the ESP-labeled first partition, if unambiguous
    pub boot_disk: Option<BlockDevice>,

    /// The bare attached data volume, if unambiguous
    pub block_volume: Option<BlockDevice>,
}

impl DeviceClassification {
    /// The boot disk's third partition, which the image reserves for LVM.
    /// `None` when the boot disk is unknown or the partition is not listed.
    pub fn boot_lvm_partition(&self) -> Option<&Partition> {
        self.boot_disk
            .as_ref()
            .and_then(|disk| disk.partitions.get(2))
    }
}

/// Classify a fresh inventory snapshot into boot disk and block volume.
///
/// A device is the block volume iff it reports exactly one
/// partition-equivalent entry (itself, no children). A device is the boot
/// disk iff its first child partition carries the ESP filesystem label.
/// Devices matching neither rule are ignored, and an ambiguous inventory
/// (zero or multiple candidates for a role) leaves that role empty.
pub fn classify_devices(inventory: &DeviceInventory) -> DeviceClassification {
    let mut boot_candidates = inventory
        .devices
        .iter()
        .filter(|device| device.has_esp_first_partition());
    let boot_disk = match (boot_candidates.next(), boot_candidates.next()) {
        (Some(only), None) => Some(only.clone()),
        _ => None,
    };

    let mut volume_candidates = inventory
        .devices
        .iter()
        .filter(|device| device.entry_count() == 1);
    let block_volume = match (volume_candidates.next(), volume_candidates.next()) {
        (Some(only), None) => Some(only.clone()),
        _ => None,
    };

    DeviceClassification {
        boot_disk,
        block_volume,
    }
}

/// Role of a single device within an inventory, for logging and display.
pub fn role_of(device: &BlockDevice, classification: &DeviceClassification) -> DeviceRole {
    if classification
        .boot_disk
        .as_ref()
        .is_some_and(|boot| boot.path == device.path)
    {
        DeviceRole::BootDisk
    } else if classification
        .block_volume
        .as_ref()
        .is_some_and(|volume| volume.path == device.path)
    {
        DeviceRole::BlockVolume
    } else {
        DeviceRole::Unclassified
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn disk(path: &str, labels: &[Option<&str>]) -> BlockDevice {
        BlockDevice {
            path: path.to_string(),
            partitions: labels
                .iter()
                .enumerate()
                .map(|(index, label)| Partition {
                    path: format!("{}{}", path, index + 1),
                    label: label.map(ToString::to_string),
                })
                .collect(),
        }
    }

    #[test]
    fn classifies_boot_disk_and_block_volume() {
        let inventory = DeviceInventory {
            devices: vec![
                disk("/dev/sda", &[Some("ESP"), None, None]),
                disk("/dev/sdb", &[]),
            ],
        };

        let classified = classify_devices(&inventory);
        assert_eq!(
            classified.boot_disk.as_ref().map(|disk| disk.path.as_str()),
            Some("/dev/sda")
        );
        assert_eq!(
            classified
                .block_volume
                .as_ref()
                .map(|disk| disk.path.as_str()),
            Some("/dev/sdb")
        );
        assert_eq!(
            classified
                .boot_lvm_partition()
                .map(|partition| partition.path.as_str()),
            Some("/dev/sda3")
        );
    }

    #[test]
    fn esp_must_be_first_partition() {
        let inventory = DeviceInventory {
            devices: vec![disk("/dev/sda", &[None, Some("ESP"), None])],
        };

        assert!(classify_devices(&inventory).boot_disk.is_none());
    }

    #[test]
    fn two_esp_disks_leave_boot_disk_empty() {
        let inventory = DeviceInventory {
            devices: vec![
                disk("/dev/sda", &[Some("ESP")]),
                disk("/dev/sdb", &[Some("ESP")]),
            ],
        };

        assert!(classify_devices(&inventory).boot_disk.is_none());
    }

    #[test]
    fn two_bare_disks_leave_block_volume_empty() {
        let inventory = DeviceInventory {
            devices: vec![disk("/dev/sdb", &[]), disk("/dev/sdc", &[])],
        };

        assert!(classify_devices(&inventory).block_volume.is_none());
    }

    #[test]
    fn empty_inventory_classifies_nothing() {
        let classified = classify_devices(&DeviceInventory::default());
        assert_eq!(classified, DeviceClassification::default());
    }

    #[test]
    fn partitioned_disk_without_esp_is_ignored() {
        let inventory = DeviceInventory {
            devices: vec![disk("/dev/sda", &[None, None])],
        };

        let classified = classify_devices(&inventory);
        assert!(classified.boot_disk.is_none());
        assert!(classified.block_volume.is_none());
        assert_eq!(
            role_of(&inventory.devices[0], &classified),
            DeviceRole::Unclassified
        );
    }

    #[test]
    fn boot_lvm_partition_requires_third_partition() {
        let inventory = DeviceInventory {
            devices: vec![disk("/dev/sda", &[Some("ESP"), None])],
        };

        let classified = classify_devices(&inventory);
        assert!(classified.boot_disk.is_some());
        assert!(classified.boot_lvm_partition().is_none());
    }
}
