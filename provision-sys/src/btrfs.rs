//! btrfs command lines

use crate::shell::quote;

pub fn mkfs(device: &str, label: &str) -> String {
    format!("mkfs.btrfs -f -L {} {}", quote(label), quote(device))
}

pub fn subvolume_create(path: &str) -> String {
    format!("btrfs subvolume create {}", quote(path))
}
