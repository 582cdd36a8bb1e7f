// SPDX-License-Identifier: GPL-3.0-only

//! Production implementation of the guest-side traits: every operation
//! becomes a shell command sent over the remote channel.

use async_trait::async_trait;

use provision_contracts::{
    BlockDeviceOps, BootstrapLock, ExecOutput, GuestChannel, GuestFiles, ProvisionError, SyncMode,
    SystemOps,
};
use provision_sys::{blockdev, btrfs, fsops, lsblk, lvm, shell};
use provision_types::DeviceInventory;

/// Directory whose atomic creation claims the bootstrap execution window.
const LOCK_DIR: &str = "/run/provision-bootstrap.lock";

/// Guest operations over a remote command channel.
pub struct ShellGuest<C: GuestChannel> {
    channel: C,
}

impl<C: GuestChannel> ShellGuest<C> {
    pub fn new(channel: C) -> Self {
        Self { channel }
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Run a command and require a zero exit status.
    async fn run_ok(&self, command: &str) -> Result<ExecOutput, ProvisionError> {
        let output = self.channel.exec(command).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(ProvisionError::command_failed(command, output.stderr.trim()))
        }
    }
}

#[async_trait]
impl<C: GuestChannel> BlockDeviceOps for ShellGuest<C> {
    async fn list_devices(&self) -> Result<DeviceInventory, ProvisionError> {
        let output = self.run_ok(lsblk::PROBE_COMMAND).await?;
        lsblk::parse_lsblk(&output.stdout).map_err(|error| {
            ProvisionError::new(
                provision_contracts::ProvisionErrorKind::Internal,
                error.to_string(),
            )
        })
    }

    async fn volume_group_exists(&self, vg_name: &str) -> Result<bool, ProvisionError> {
        let output = self.run_ok(lvm::LIST_VGS_COMMAND).await?;
        Ok(lvm::parse_vg_names(&output.stdout)
            .iter()
            .any(|name| name == vg_name))
    }

    async fn grow_partition(&self, disk: &str, number: u32) -> Result<(), ProvisionError> {
        let command = blockdev::growpart(disk, number);
        let output = self.channel.exec(&command).await?;
        if blockdev::growpart_succeeded(output.exit_code, &output.stdout) {
            Ok(())
        } else {
            Err(ProvisionError::command_failed(&command, output.stderr.trim()))
        }
    }

    async fn init_physical_volume(&self, device: &str) -> Result<(), ProvisionError> {
        self.run_ok(&lvm::pvcreate(device)).await.map(drop)
    }

    async fn create_volume_group(
        &self,
        vg_name: &str,
        devices: &[String],
    ) -> Result<(), ProvisionError> {
        self.run_ok(&lvm::vgcreate(vg_name, devices)).await.map(drop)
    }

    async fn create_logical_volume(
        &self,
        vg_name: &str,
        lv_name: &str,
    ) -> Result<(), ProvisionError> {
        self.run_ok(&lvm::lvcreate_all_free(vg_name, lv_name))
            .await
            .map(drop)
    }

    async fn format_btrfs(&self, device: &str, label: &str) -> Result<(), ProvisionError> {
        self.run_ok(&btrfs::mkfs(device, label)).await.map(drop)
    }

    async fn mount(
        &self,
        device: &str,
        target: &str,
        options: &[String],
    ) -> Result<(), ProvisionError> {
        self.run_ok(&fsops::mount(device, target, options))
            .await
            .map(drop)
    }

    async fn unmount(&self, target: &str) -> Result<(), ProvisionError> {
        self.run_ok(&fsops::umount(target)).await.map(drop)
    }

    async fn create_subvolume(&self, path: &str) -> Result<(), ProvisionError> {
        self.run_ok(&btrfs::subvolume_create(path)).await.map(drop)
    }
}

#[async_trait]
impl<C: GuestChannel> GuestFiles for ShellGuest<C> {
    async fn path_exists(&self, path: &str) -> Result<bool, ProvisionError> {
        let output = self.channel.exec(&fsops::test_exists(path)).await?;
        Ok(output.success())
    }

    async fn dir_has_entries(&self, path: &str) -> Result<bool, ProvisionError> {
        // A missing directory is simply "nothing to migrate".
        let output = self.channel.exec(&fsops::list_entries(path)).await?;
        Ok(output.success() && !output.stdout.trim().is_empty())
    }

    async fn read_file(&self, path: &str) -> Result<String, ProvisionError> {
        Ok(self.run_ok(&fsops::read_file(path)).await?.stdout)
    }

    async fn write_file(&self, path: &str, contents: &str) -> Result<(), ProvisionError> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if let Some(parent) = parent.to_str().filter(|parent| !parent.is_empty() && *parent != "/") {
                self.run_ok(&fsops::mkdir_p(parent)).await?;
            }
        }
        self.run_ok(&fsops::write_file(path, contents)).await.map(drop)
    }

    async fn make_dir(&self, path: &str) -> Result<(), ProvisionError> {
        self.run_ok(&fsops::mkdir_p(path)).await.map(drop)
    }

    async fn remove_dir(&self, path: &str) -> Result<(), ProvisionError> {
        self.run_ok(&fsops::rmdir(path)).await.map(drop)
    }

    async fn sync_tree(
        &self,
        source: &str,
        dest: &str,
        mode: SyncMode,
    ) -> Result<(), ProvisionError> {
        let command = fsops::rsync(source, dest, mode == SyncMode::Mirror);
        self.run_ok(&command).await.map(drop)
    }
}

#[async_trait]
impl<C: GuestChannel> SystemOps for ShellGuest<C> {
    async fn rebuild_boot(&self) -> Result<(), ProvisionError> {
        self.run_ok("nixos-rebuild boot").await.map(drop)
    }

    async fn reboot(&self) -> Result<(), ProvisionError> {
        // The channel usually dies with the guest; that is the expected
        // shape of a successful reboot, not a failure.
        match self.channel.exec("nohup reboot >/dev/null 2>&1 &").await {
            Ok(_) => Ok(()),
            Err(error) => {
                tracing::debug!("channel dropped during reboot: {error}");
                Ok(())
            }
        }
    }
}

#[async_trait]
impl<C: GuestChannel> BootstrapLock for ShellGuest<C> {
    async fn try_acquire(&self) -> Result<bool, ProvisionError> {
        // Plain mkdir is atomic: exactly one concurrent caller succeeds.
        let output = self
            .channel
            .exec(&format!("mkdir {}", shell::quote(LOCK_DIR)))
            .await?;
        Ok(output.success())
    }

    async fn release(&self) -> Result<(), ProvisionError> {
        self.run_ok(&fsops::rmdir(LOCK_DIR)).await.map(drop)
    }
}
