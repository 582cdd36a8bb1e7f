//! Target storage layout the bootstrap drives the guest toward

use serde::{Deserialize, Serialize};

/// One btrfs subvolume in the target layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subvolume {
    /// Subvolume name (e.g., "@nix")
    pub name: String,

    /// Where the subvolume is mounted on the running system (e.g., "/nix")
    pub mount_point: String,

    /// Existing directory whose contents seed the subvolume
    pub source_path: String,
}

/// Immutable description of the target state: volume group, logical volume,
/// filesystem label and the subvolumes carved out of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageLayoutPlan {
    /// Volume group name
    pub vg_name: String,

    /// Logical volume name
    pub lv_name: String,

    /// btrfs filesystem label
    pub fs_label: String,

    /// Subvolumes in creation order
    pub subvolumes: Vec<Subvolume>,
}

impl StorageLayoutPlan {
    /// The production layout: `datavg`/`datalv` holding `@nix` and `@home`.
    pub fn data_volume() -> Self {
        Self {
            vg_name: "datavg".to_string(),
            lv_name: "datalv".to_string(),
            fs_label: "data".to_string(),
            subvolumes: vec![
                Subvolume {
                    name: "@nix".to_string(),
                    mount_point: "/nix".to_string(),
                    source_path: "/nix".to_string(),
                },
                Subvolume {
                    name: "@home".to_string(),
                    mount_point: "/home".to_string(),
                    source_path: "/home".to_string(),
                },
            ],
        }
    }

    /// Device path of the logical volume (e.g., "/dev/datavg/datalv")
    pub fn lv_device_path(&self) -> String {
        format!("/dev/{}/{}", self.vg_name, self.lv_name)
    }

    /// The subvolume the Nix store migrates into, if the plan has one.
    pub fn store_subvolume(&self) -> Option<&Subvolume> {
        self.subvolumes
            .iter()
            .find(|subvolume| subvolume.mount_point == "/nix")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_volume_layout_is_fixed() {
        let plan = StorageLayoutPlan::data_volume();
        assert_eq!(plan.vg_name, "datavg");
        assert_eq!(plan.lv_name, "datalv");
        assert_eq!(plan.lv_device_path(), "/dev/datavg/datalv");

        let names: Vec<&str> = plan
            .subvolumes
            .iter()
            .map(|subvolume| subvolume.name.as_str())
            .collect();
        assert_eq!(names, ["@nix", "@home"]);
        assert_eq!(
            plan.store_subvolume().map(|subvolume| subvolume.name.as_str()),
            Some("@nix")
        );
    }
}
