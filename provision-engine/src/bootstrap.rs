// SPDX-License-Identifier: GPL-3.0-only

//! First-boot storage bootstrap: assemble the LVM/btrfs data volume and
//! migrate live data onto it
//!
//! The procedure is re-invocable: a completed run is recorded by a marker
//! file on the guest, and every precondition miss is a skip, not a failure,
//! so the orchestrator tolerates environments where the feature does not
//! apply (no boot disk in the expected shape, no attached volume). Once the
//! destructive steps start, a failure aborts the run with no rollback;
//! the marker stays absent and a later invocation starts over from the
//! precondition checks.

use std::time::Duration;

use provision_contracts::{
    BlockDeviceOps, BootstrapLock, GuestFiles, ProvisionError, ProvisionErrorKind, SyncMode,
    SystemOps,
};
use provision_types::{StorageLayoutPlan, classify_devices};

use crate::nixcfg;

/// Marker whose existence records a completed bootstrap.
pub const MARKER_PATH: &str = "/var/lib/provision/storage-bootstrap-done";

/// Tuning and variant selection for one bootstrap run.
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    /// Marker file path on the guest
    pub marker_path: String,

    /// Temporary mount point for subvolume creation and migration
    pub mount_point: String,

    /// Temporary mount point for the store mirror before reboot
    pub stage_mount_point: String,

    /// Delay between block-volume detection attempts
    pub volume_wait_interval: Duration,

    /// Number of block-volume detection attempts after the initial scan
    pub volume_wait_attempts: u32,

    /// When set, generate the system configuration, stage a rebuild and
    /// reboot into it; otherwise finish with an instructions block.
    pub apply_system_config: bool,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            marker_path: MARKER_PATH.to_string(),
            mount_point: "/mnt/storage-bootstrap".to_string(),
            stage_mount_point: "/mnt/nix-stage".to_string(),
            volume_wait_interval: Duration::from_secs(5),
            volume_wait_attempts: 12,
            apply_system_config: false,
        }
    }
}

/// Why a run ended without touching any device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyCompleted,
    VolumeGroupExists,
    NoBootDisk,
    NoLvmPartition,
    NoBlockVolume,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            Self::AlreadyCompleted => "already done",
            Self::VolumeGroupExists => "vg pre-exists",
            Self::NoBootDisk => "no boot disk",
            Self::NoLvmPartition => "no lvm partition",
            Self::NoBlockVolume => "no block volume",
        };
        formatter.write_str(reason)
    }
}

/// Result of one bootstrap invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// All execution steps ran. The manual variant carries the mount
    /// configuration the operator still has to apply.
    Completed { instructions: Option<String> },

    /// A precondition ended the run before any destructive step.
    Skipped(SkipReason),
}

/// The storage bootstrap orchestrator.
pub struct StorageBootstrap<'a> {
    devices: &'a dyn BlockDeviceOps,
    files: &'a dyn GuestFiles,
    system: &'a dyn SystemOps,
    lock: &'a dyn BootstrapLock,
    config: BootstrapConfig,
}

impl<'a> StorageBootstrap<'a> {
    pub fn new(
        devices: &'a dyn BlockDeviceOps,
        files: &'a dyn GuestFiles,
        system: &'a dyn SystemOps,
        lock: &'a dyn BootstrapLock,
        config: BootstrapConfig,
    ) -> Self {
        Self {
            devices,
            files,
            system,
            lock,
            config,
        }
    }

    /// Run the bootstrap against the guest. Safe to re-invoke after a
    /// reboot or a transient failure.
    pub async fn run(&self, plan: &StorageLayoutPlan) -> Result<BootstrapOutcome, ProvisionError> {
        if self.files.path_exists(&self.config.marker_path).await? {
            tracing::info!("storage bootstrap skipped: already done");
            return Ok(BootstrapOutcome::Skipped(SkipReason::AlreadyCompleted));
        }

        if self.devices.volume_group_exists(&plan.vg_name).await? {
            // A pre-existing group is treated as a finished bootstrap and
            // recorded as such, even though migration may never have run.
            // Known gap, preserved deliberately.
            tracing::info!(vg = %plan.vg_name, "storage bootstrap skipped: vg pre-exists");
            self.files.write_file(&self.config.marker_path, "").await?;
            return Ok(BootstrapOutcome::Skipped(SkipReason::VolumeGroupExists));
        }

        let inventory = self.devices.list_devices().await?;
        let mut classified = classify_devices(&inventory);

        let Some(boot_disk) = classified.boot_disk.clone() else {
            tracing::info!("storage bootstrap skipped: no boot disk");
            return Ok(BootstrapOutcome::Skipped(SkipReason::NoBootDisk));
        };

        let Some(lvm_partition) = classified.boot_lvm_partition().cloned() else {
            tracing::info!(disk = %boot_disk.path, "storage bootstrap skipped: no lvm partition");
            return Ok(BootstrapOutcome::Skipped(SkipReason::NoLvmPartition));
        };

        if classified.block_volume.is_none() {
            classified.block_volume = self.wait_for_block_volume().await?;
        }
        let Some(block_volume) = classified.block_volume else {
            tracing::info!("storage bootstrap skipped: no block volume");
            return Ok(BootstrapOutcome::Skipped(SkipReason::NoBlockVolume));
        };

        if !self.lock.try_acquire().await? {
            return Err(ProvisionError::new(
                ProvisionErrorKind::Busy,
                "another bootstrap invocation holds the lock",
            ));
        }

        let result = self
            .execute(plan, &boot_disk.path, &lvm_partition.path, &block_volume.path)
            .await;

        if let Err(error) = self.lock.release().await {
            tracing::warn!("failed to release bootstrap lock: {error}");
        }

        result
    }

    /// Fixed-cadence wait for the data volume to appear: re-scan the guest
    /// every interval, up to the configured attempt count. No backoff, no
    /// jitter; boot-time expectations elsewhere rely on this exact cadence.
    async fn wait_for_block_volume(
        &self,
    ) -> Result<Option<provision_types::BlockDevice>, ProvisionError> {
        for attempt in 1..=self.config.volume_wait_attempts {
            tokio::time::sleep(self.config.volume_wait_interval).await;

            let inventory = self.devices.list_devices().await?;
            if let Some(volume) = classify_devices(&inventory).block_volume {
                tracing::info!(device = %volume.path, attempt, "block volume appeared");
                return Ok(Some(volume));
            }
            tracing::debug!(
                attempt,
                attempts = self.config.volume_wait_attempts,
                "block volume not visible yet"
            );
        }

        Ok(None)
    }

    /// The destructive steps. Any failure aborts immediately; already
    /// completed steps are not rolled back and the marker is not written.
    async fn execute(
        &self,
        plan: &StorageLayoutPlan,
        boot_disk: &str,
        lvm_partition: &str,
        block_volume: &str,
    ) -> Result<BootstrapOutcome, ProvisionError> {
        tracing::info!(
            vg = %plan.vg_name,
            %boot_disk,
            %lvm_partition,
            %block_volume,
            "assembling data volume"
        );

        self.devices.grow_partition(boot_disk, 3).await?;
        self.devices.init_physical_volume(lvm_partition).await?;
        self.devices.init_physical_volume(block_volume).await?;
        self.devices
            .create_volume_group(
                &plan.vg_name,
                &[lvm_partition.to_string(), block_volume.to_string()],
            )
            .await?;
        self.devices
            .create_logical_volume(&plan.vg_name, &plan.lv_name)
            .await?;

        let lv_device = plan.lv_device_path();
        self.devices.format_btrfs(&lv_device, &plan.fs_label).await?;

        self.with_mounted(&lv_device, &self.config.mount_point, &[], |mount_point| {
            self.populate_subvolumes(plan, mount_point)
        })
        .await?;

        self.files.write_file(&self.config.marker_path, "").await?;
        tracing::info!(marker = %self.config.marker_path, "storage bootstrap complete");

        if self.config.apply_system_config {
            self.apply_system_config(plan, &lv_device).await?;
            Ok(BootstrapOutcome::Completed { instructions: None })
        } else {
            Ok(BootstrapOutcome::Completed {
                instructions: Some(nixcfg::render_manual_instructions(plan)),
            })
        }
    }

    /// Create each subvolume and seed it from its source path when that
    /// path exists and is non-empty. One-way additive copy; sources are
    /// left untouched.
    async fn populate_subvolumes(
        &self,
        plan: &StorageLayoutPlan,
        mount_point: &str,
    ) -> Result<(), ProvisionError> {
        for subvolume in &plan.subvolumes {
            let subvolume_path = format!("{}/{}", mount_point, subvolume.name);
            self.devices.create_subvolume(&subvolume_path).await?;

            if self.files.dir_has_entries(&subvolume.source_path).await? {
                tracing::info!(
                    source = %subvolume.source_path,
                    dest = %subvolume_path,
                    "migrating data"
                );
                self.files
                    .sync_tree(&subvolume.source_path, &subvolume_path, SyncMode::Additive)
                    .await?;
            }
        }
        Ok(())
    }

    /// Steps 12-16: persist the mount configuration, stage the rebuilt
    /// system, mirror the store onto the new volume and reboot into it.
    /// The rebuild is build-only; hot-swapping the store while it is being
    /// relocated is unsafe.
    async fn apply_system_config(
        &self,
        plan: &StorageLayoutPlan,
        lv_device: &str,
    ) -> Result<(), ProvisionError> {
        self.files
            .write_file(nixcfg::FRAGMENT_PATH, &nixcfg::render_mount_fragment(plan))
            .await?;

        let existing = self.files.read_file(nixcfg::ROOT_CONFIG_PATH).await?;
        let rewritten = nixcfg::rewrite_configuration(&existing)?;
        self.files
            .write_file(nixcfg::ROOT_CONFIG_PATH, &rewritten)
            .await?;

        self.system.rebuild_boot().await?;

        if let Some(store) = plan.store_subvolume() {
            let options = vec![format!("subvol={}", store.name)];
            let source = store.source_path.clone();
            self.with_mounted(
                lv_device,
                &self.config.stage_mount_point,
                &options,
                |mount_point| async move {
                    self.files
                        .sync_tree(&source, mount_point, SyncMode::Mirror)
                        .await
                },
            )
            .await?;
        }

        tracing::info!("rebooting into the migrated layout");
        self.system.reboot().await
    }

    /// Mount a device, run the body, and unmount on every exit path. A
    /// body failure wins over an unmount failure, which is only logged.
    async fn with_mounted<'b, F, Fut>(
        &'b self,
        device: &str,
        mount_point: &'b str,
        options: &[String],
        body: F,
    ) -> Result<(), ProvisionError>
    where
        F: FnOnce(&'b str) -> Fut,
        Fut: Future<Output = Result<(), ProvisionError>>,
    {
        self.files.make_dir(mount_point).await?;
        self.devices.mount(device, mount_point, options).await?;

        let result = body(mount_point).await;

        match self.devices.unmount(mount_point).await {
            Ok(()) => {
                if result.is_ok() {
                    self.files.remove_dir(mount_point).await?;
                }
            }
            Err(unmount_error) => {
                if result.is_ok() {
                    return Err(unmount_error);
                }
                tracing::warn!(%mount_point, "unmount failed after aborted step: {unmount_error}");
            }
        }

        result
    }
}
