//! LVM command lines and output parsing

use crate::shell::quote;

/// Probe listing existing volume group names, one per line.
pub const LIST_VGS_COMMAND: &str = "vgs --noheadings -o vg_name";

/// Parse `vgs --noheadings -o vg_name` output into names.
pub fn parse_vg_names(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Initialize a device as a physical volume, wiping prior LVM metadata.
/// The double force flag is intentional: precondition checks have already
/// ruled out a live volume group on this device.
pub fn pvcreate(device: &str) -> String {
    format!("pvcreate -ff -y {}", quote(device))
}

pub fn vgcreate(vg_name: &str, devices: &[String]) -> String {
    let mut command = format!("vgcreate {}", quote(vg_name));
    for device in devices {
        command.push(' ');
        command.push_str(&quote(device));
    }
    command
}

/// Create a logical volume spanning all free extents of the group.
pub fn lvcreate_all_free(vg_name: &str, lv_name: &str) -> String {
    format!("lvcreate -y -l 100%FREE -n {} {}", quote(lv_name), quote(vg_name))
}
