use serde::Deserialize;

use provision_types::{BlockDevice, DeviceInventory, Partition};

use crate::error::{Result, SysError};

/// The probe command the bootstrap sends to rebuild the device inventory.
pub const PROBE_COMMAND: &str = "lsblk --json -o NAME,TYPE,LABEL,PATH";

#[derive(Debug, Deserialize)]
struct LsblkResponse {
    #[serde(default)]
    blockdevices: Vec<LsblkNode>,
}

#[derive(Debug, Deserialize)]
struct LsblkNode {
    #[serde(rename = "type")]
    node_type: String,
    label: Option<String>,
    path: Option<String>,
    #[serde(default)]
    children: Vec<LsblkNode>,
}

/// Parse `lsblk --json` output into an inventory snapshot.
///
/// Only whole disks survive; loop and optical devices are not inventory
/// material. Partition order is preserved as reported.
pub fn parse_lsblk(json: &str) -> Result<DeviceInventory> {
    let response: LsblkResponse = serde_json::from_str(json)
        .map_err(|error| SysError::ParseFailed(format!("lsblk json: {error}")))?;

    let devices = response
        .blockdevices
        .into_iter()
        .filter(|node| node.node_type == "disk")
        .filter_map(|node| {
            let path = node.path?;
            let partitions = node
                .children
                .into_iter()
                .filter(|child| child.node_type == "part")
                .filter_map(|child| {
                    Some(Partition {
                        path: child.path?,
                        label: child.label,
                    })
                })
                .collect();
            Some(BlockDevice { path, partitions })
        })
        .collect();

    Ok(DeviceInventory { devices })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_disks_and_partitions() {
        let inventory = parse_lsblk(
            r#"{
                "blockdevices": [
                    {"name": "sda", "type": "disk", "label": null, "path": "/dev/sda",
                     "children": [
                        {"name": "sda1", "type": "part", "label": "ESP", "path": "/dev/sda1"},
                        {"name": "sda2", "type": "part", "label": null, "path": "/dev/sda2"},
                        {"name": "sda3", "type": "part", "label": null, "path": "/dev/sda3"}
                     ]},
                    {"name": "sdb", "type": "disk", "label": null, "path": "/dev/sdb"},
                    {"name": "loop0", "type": "loop", "label": null, "path": "/dev/loop0"}
                ]
            }"#,
        )
        .expect("valid lsblk output");

        assert_eq!(inventory.devices.len(), 2);
        assert_eq!(inventory.devices[0].path, "/dev/sda");
        assert_eq!(inventory.devices[0].partitions.len(), 3);
        assert_eq!(
            inventory.devices[0].partitions[0].label.as_deref(),
            Some("ESP")
        );
        assert!(inventory.devices[1].partitions.is_empty());
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(parse_lsblk("not json").is_err());
    }

    #[test]
    fn empty_report_is_an_empty_inventory() {
        let inventory = parse_lsblk(r#"{"blockdevices": []}"#).expect("valid");
        assert!(inventory.devices.is_empty());
    }
}
