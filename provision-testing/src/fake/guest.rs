use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use async_trait::async_trait;

use provision_contracts::{
    BlockDeviceOps, BootstrapLock, GuestFiles, ProvisionError, ProvisionErrorKind, SyncMode,
    SystemOps,
};
use provision_types::{BlockDevice, DeviceInventory};

/// Operation names destructive to the guest's storage, for the "skip paths
/// touch nothing" assertions.
const DESTRUCTIVE_PREFIXES: [&str; 8] = [
    "growpart", "pvcreate", "vgcreate", "lvcreate", "mkfs.btrfs", "mount", "subvolume", "rsync",
];

#[derive(Default)]
struct GuestState {
    devices: Vec<BlockDevice>,
    pending_device: Option<(u32, BlockDevice)>,
    scans: u32,
    volume_groups: BTreeSet<String>,
    files: BTreeMap<String, String>,
    populated_dirs: BTreeSet<String>,
    created_dirs: BTreeSet<String>,
    mounts: BTreeMap<String, (String, Vec<String>)>,
    lock_held: bool,
    rebuilds: u32,
    reboots: u32,
    fail_ops: BTreeSet<String>,
    log: Vec<String>,
}

/// One simulated guest: block devices, volume groups, files and the
/// bootstrap lock word, all behind a single state lock.
#[derive(Default)]
pub struct FakeGuest {
    state: Mutex<GuestState>,
}

impl FakeGuest {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, GuestState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // --- setup ---

    pub fn add_device(&self, device: BlockDevice) {
        self.lock().devices.push(device);
    }

    /// Make a device appear once `list_devices` has run `scans` times.
    pub fn add_device_after_scans(&self, scans: u32, device: BlockDevice) {
        self.lock().pending_device = Some((scans, device));
    }

    pub fn add_volume_group(&self, name: &str) {
        self.lock().volume_groups.insert(name.to_string());
    }

    pub fn add_file(&self, path: &str, contents: &str) {
        self.lock().files.insert(path.to_string(), contents.to_string());
    }

    /// Register a directory that exists and contains data.
    pub fn add_populated_dir(&self, path: &str) {
        self.lock().populated_dirs.insert(path.to_string());
    }

    pub fn hold_lock(&self) {
        self.lock().lock_held = true;
    }

    /// Make the named operation fail when the orchestrator reaches it.
    pub fn fail_on(&self, operation: &str) {
        self.lock().fail_ops.insert(operation.to_string());
    }

    // --- inspection ---

    pub fn log(&self) -> Vec<String> {
        self.lock().log.clone()
    }

    pub fn scans(&self) -> u32 {
        self.lock().scans
    }

    pub fn destructive_op_count(&self) -> usize {
        self.lock()
            .log
            .iter()
            .filter(|entry| {
                DESTRUCTIVE_PREFIXES
                    .iter()
                    .any(|prefix| entry.starts_with(prefix))
            })
            .count()
    }

    pub fn has_file(&self, path: &str) -> bool {
        self.lock().files.contains_key(path)
    }

    pub fn file_contents(&self, path: &str) -> Option<String> {
        self.lock().files.get(path).cloned()
    }

    pub fn has_volume_group(&self, name: &str) -> bool {
        self.lock().volume_groups.contains(name)
    }

    pub fn active_mounts(&self) -> Vec<String> {
        self.lock().mounts.keys().cloned().collect()
    }

    pub fn rebuilds(&self) -> u32 {
        self.lock().rebuilds
    }

    pub fn reboots(&self) -> u32 {
        self.lock().reboots
    }

    pub fn lock_held(&self) -> bool {
        self.lock().lock_held
    }

    // --- internals ---

    fn maybe_fail(state: &GuestState, operation: &str) -> Result<(), ProvisionError> {
        if state.fail_ops.contains(operation) {
            Err(ProvisionError::new(
                ProvisionErrorKind::CommandFailed,
                format!("injected failure: {operation}"),
            ))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BlockDeviceOps for FakeGuest {
    async fn list_devices(&self) -> Result<DeviceInventory, ProvisionError> {
        let mut state = self.lock();
        state.scans += 1;
        let due = state
            .pending_device
            .as_ref()
            .is_some_and(|(after, _)| state.scans >= *after);
        if due && let Some((_, device)) = state.pending_device.take() {
            state.devices.push(device);
        }
        Ok(DeviceInventory {
            devices: state.devices.clone(),
        })
    }

    async fn volume_group_exists(&self, vg_name: &str) -> Result<bool, ProvisionError> {
        Ok(self.lock().volume_groups.contains(vg_name))
    }

    async fn grow_partition(&self, disk: &str, number: u32) -> Result<(), ProvisionError> {
        let mut state = self.lock();
        Self::maybe_fail(&state, "grow_partition")?;
        state.log.push(format!("growpart {disk} {number}"));
        Ok(())
    }

    async fn init_physical_volume(&self, device: &str) -> Result<(), ProvisionError> {
        let mut state = self.lock();
        Self::maybe_fail(&state, "init_physical_volume")?;
        state.log.push(format!("pvcreate {device}"));
        Ok(())
    }

    async fn create_volume_group(
        &self,
        vg_name: &str,
        devices: &[String],
    ) -> Result<(), ProvisionError> {
        let mut state = self.lock();
        Self::maybe_fail(&state, "create_volume_group")?;
        state.log.push(format!("vgcreate {} {}", vg_name, devices.join(" ")));
        state.volume_groups.insert(vg_name.to_string());
        Ok(())
    }

    async fn create_logical_volume(
        &self,
        vg_name: &str,
        lv_name: &str,
    ) -> Result<(), ProvisionError> {
        let mut state = self.lock();
        Self::maybe_fail(&state, "create_logical_volume")?;
        if !state.volume_groups.contains(vg_name) {
            return Err(ProvisionError::new(
                ProvisionErrorKind::NotFound,
                format!("volume group {vg_name} does not exist"),
            ));
        }
        state.log.push(format!("lvcreate {vg_name}/{lv_name}"));
        Ok(())
    }

    async fn format_btrfs(&self, device: &str, label: &str) -> Result<(), ProvisionError> {
        let mut state = self.lock();
        Self::maybe_fail(&state, "format_btrfs")?;
        state.log.push(format!("mkfs.btrfs {device} {label}"));
        Ok(())
    }

    async fn mount(
        &self,
        device: &str,
        target: &str,
        options: &[String],
    ) -> Result<(), ProvisionError> {
        let mut state = self.lock();
        Self::maybe_fail(&state, "mount")?;
        state.log.push(if options.is_empty() {
            format!("mount {device} {target}")
        } else {
            format!("mount -o {} {device} {target}", options.join(","))
        });
        state
            .mounts
            .insert(target.to_string(), (device.to_string(), options.to_vec()));
        Ok(())
    }

    async fn unmount(&self, target: &str) -> Result<(), ProvisionError> {
        let mut state = self.lock();
        Self::maybe_fail(&state, "unmount")?;
        if state.mounts.remove(target).is_none() {
            return Err(ProvisionError::new(
                ProvisionErrorKind::NotFound,
                format!("{target} is not mounted"),
            ));
        }
        state.log.push(format!("umount {target}"));
        Ok(())
    }

    async fn create_subvolume(&self, path: &str) -> Result<(), ProvisionError> {
        let mut state = self.lock();
        Self::maybe_fail(&state, "create_subvolume")?;
        state.log.push(format!("subvolume {path}"));
        Ok(())
    }
}

#[async_trait]
impl GuestFiles for FakeGuest {
    async fn path_exists(&self, path: &str) -> Result<bool, ProvisionError> {
        let state = self.lock();
        Ok(state.files.contains_key(path)
            || state.created_dirs.contains(path)
            || state.populated_dirs.contains(path))
    }

    async fn dir_has_entries(&self, path: &str) -> Result<bool, ProvisionError> {
        Ok(self.lock().populated_dirs.contains(path))
    }

    async fn read_file(&self, path: &str) -> Result<String, ProvisionError> {
        self.lock().files.get(path).cloned().ok_or_else(|| {
            ProvisionError::new(ProvisionErrorKind::NotFound, format!("no such file: {path}"))
        })
    }

    async fn write_file(&self, path: &str, contents: &str) -> Result<(), ProvisionError> {
        let mut state = self.lock();
        Self::maybe_fail(&state, "write_file")?;
        state.log.push(format!("write {path}"));
        state.files.insert(path.to_string(), contents.to_string());
        Ok(())
    }

    async fn make_dir(&self, path: &str) -> Result<(), ProvisionError> {
        let mut state = self.lock();
        state.log.push(format!("mkdir {path}"));
        state.created_dirs.insert(path.to_string());
        Ok(())
    }

    async fn remove_dir(&self, path: &str) -> Result<(), ProvisionError> {
        let mut state = self.lock();
        state.log.push(format!("rmdir {path}"));
        state.created_dirs.remove(path);
        Ok(())
    }

    async fn sync_tree(
        &self,
        source: &str,
        dest: &str,
        mode: SyncMode,
    ) -> Result<(), ProvisionError> {
        let mut state = self.lock();
        Self::maybe_fail(&state, "sync_tree")?;
        state.log.push(match mode {
            SyncMode::Additive => format!("rsync {source} {dest}"),
            SyncMode::Mirror => format!("rsync --delete {source} {dest}"),
        });
        Ok(())
    }
}

#[async_trait]
impl SystemOps for FakeGuest {
    async fn rebuild_boot(&self) -> Result<(), ProvisionError> {
        let mut state = self.lock();
        Self::maybe_fail(&state, "rebuild_boot")?;
        state.rebuilds += 1;
        state.log.push("nixos-rebuild boot".to_string());
        Ok(())
    }

    async fn reboot(&self) -> Result<(), ProvisionError> {
        let mut state = self.lock();
        state.reboots += 1;
        state.log.push("reboot".to_string());
        Ok(())
    }
}

#[async_trait]
impl BootstrapLock for FakeGuest {
    async fn try_acquire(&self) -> Result<bool, ProvisionError> {
        let mut state = self.lock();
        if state.lock_held {
            Ok(false)
        } else {
            state.lock_held = true;
            Ok(true)
        }
    }

    async fn release(&self) -> Result<(), ProvisionError> {
        self.lock().lock_held = false;
        Ok(())
    }
}
