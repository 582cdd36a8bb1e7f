//! The happy path: assemble the volume, migrate data, record completion.

mod common;

use provision_contracts::ProvisionErrorKind;
use provision_engine::bootstrap::MARKER_PATH;
use provision_engine::{BootstrapConfig, BootstrapOutcome, nixcfg};
use provision_testing::FakeGuest;
use provision_types::StorageLayoutPlan;

fn populated_guest() -> FakeGuest {
    let guest = FakeGuest::new();
    guest.add_device(common::boot_disk("/dev/sda"));
    guest.add_device(common::bare_volume("/dev/sdb"));
    guest.add_populated_dir("/nix");
    guest.add_populated_dir("/home");
    guest
}

#[tokio::test]
async fn assembles_the_volume_and_migrates_data() {
    let guest = populated_guest();

    let outcome = common::run_bootstrap(&guest, common::fast_config())
        .await
        .expect("bootstrap succeeds");

    let BootstrapOutcome::Completed { instructions } = outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    let instructions = instructions.expect("manual variant prints instructions");
    assert!(instructions.contains("fileSystems.\"/nix\""));
    assert!(instructions.contains("subvol=@home"));

    assert!(guest.has_volume_group("datavg"));
    assert!(guest.has_file(MARKER_PATH));
    assert!(guest.active_mounts().is_empty());
    assert!(!guest.lock_held());

    let log = guest.log();
    let grow = common::log_index(&log, "growpart /dev/sda 3");
    let pv_boot = common::log_index(&log, "pvcreate /dev/sda3");
    let pv_volume = common::log_index(&log, "pvcreate /dev/sdb");
    let vg = common::log_index(&log, "vgcreate datavg /dev/sda3 /dev/sdb");
    let lv = common::log_index(&log, "lvcreate datavg/datalv");
    let format = common::log_index(&log, "mkfs.btrfs /dev/datavg/datalv data");
    let mount = common::log_index(&log, "mount /dev/datavg/datalv /mnt/storage-bootstrap");
    let nix_subvolume = common::log_index(&log, "subvolume /mnt/storage-bootstrap/@nix");
    let nix_copy = common::log_index(&log, "rsync /nix /mnt/storage-bootstrap/@nix");
    let home_copy = common::log_index(&log, "rsync /home /mnt/storage-bootstrap/@home");
    let unmount = common::log_index(&log, "umount /mnt/storage-bootstrap");

    assert!(grow < pv_boot && pv_boot < pv_volume && pv_volume < vg);
    assert!(vg < lv && lv < format && format < mount);
    assert!(mount < nix_subvolume && nix_subvolume < nix_copy);
    assert!(nix_copy < home_copy && home_copy < unmount);
}

#[tokio::test]
async fn empty_sources_are_not_copied() {
    let guest = FakeGuest::new();
    guest.add_device(common::boot_disk("/dev/sda"));
    guest.add_device(common::bare_volume("/dev/sdb"));
    guest.add_populated_dir("/nix");
    // /home exists but has nothing in it.

    common::run_bootstrap(&guest, common::fast_config())
        .await
        .expect("bootstrap succeeds");

    let log = guest.log();
    assert!(log.iter().any(|entry| entry.starts_with("rsync /nix")));
    assert!(!log.iter().any(|entry| entry.starts_with("rsync /home")));
    // Both subvolumes are still created.
    common::log_index(&log, "subvolume /mnt/storage-bootstrap/@home");
}

#[tokio::test]
async fn waits_for_a_late_block_volume() {
    let guest = FakeGuest::new();
    guest.add_device(common::boot_disk("/dev/sda"));
    guest.add_device_after_scans(4, common::bare_volume("/dev/sdb"));
    guest.add_populated_dir("/nix");

    let outcome = common::run_bootstrap(&guest, common::fast_config())
        .await
        .expect("bootstrap succeeds");

    assert!(matches!(outcome, BootstrapOutcome::Completed { .. }));
    assert_eq!(guest.scans(), 4);
}

#[tokio::test]
async fn apply_variant_stages_the_new_system_and_reboots() {
    let guest = populated_guest();
    guest.add_file(
        nixcfg::ROOT_CONFIG_PATH,
        concat!(
            "{ config, pkgs, ... }:\n",
            "{\n",
            "  imports = [\n",
            "    ./hardware-configuration.nix\n",
            "  ];\n",
            "}\n",
        ),
    );

    let config = BootstrapConfig {
        apply_system_config: true,
        ..common::fast_config()
    };
    let outcome = common::run_bootstrap(&guest, config)
        .await
        .expect("bootstrap succeeds");

    assert_eq!(outcome, BootstrapOutcome::Completed { instructions: None });

    let fragment = guest
        .file_contents(nixcfg::FRAGMENT_PATH)
        .expect("fragment written");
    assert_eq!(
        fragment,
        nixcfg::render_mount_fragment(&StorageLayoutPlan::data_volume())
    );

    let root = guest
        .file_contents(nixcfg::ROOT_CONFIG_PATH)
        .expect("root config rewritten");
    assert!(root.contains("./storage.nix"));
    assert!(root.contains("boot.initrd.services.lvm.enable = true;"));

    assert_eq!(guest.rebuilds(), 1);
    assert_eq!(guest.reboots(), 1);

    let log = guest.log();
    let marker = common::log_index(&log, &format!("write {MARKER_PATH}"));
    let rebuild = common::log_index(&log, "nixos-rebuild boot");
    let stage_mount = common::log_index(
        &log,
        "mount -o subvol=@nix /dev/datavg/datalv /mnt/nix-stage",
    );
    let mirror = common::log_index(&log, "rsync --delete /nix /mnt/nix-stage");
    let reboot = common::log_index(&log, "reboot");

    assert!(marker < rebuild && rebuild < stage_mount);
    assert!(stage_mount < mirror && mirror < reboot);
}

#[tokio::test]
async fn step_failure_aborts_and_releases_the_mount() {
    let guest = populated_guest();
    guest.fail_on("sync_tree");

    let error = common::run_bootstrap(&guest, common::fast_config())
        .await
        .expect_err("injected failure propagates");

    assert_eq!(error.kind, ProvisionErrorKind::CommandFailed);
    assert!(!guest.has_file(MARKER_PATH));
    assert!(guest.active_mounts().is_empty());
    assert!(!guest.lock_held());
}

#[tokio::test]
async fn concurrent_invocation_is_rejected_while_locked() {
    let guest = populated_guest();
    guest.hold_lock();

    let error = common::run_bootstrap(&guest, common::fast_config())
        .await
        .expect_err("lock contention is an error");

    assert_eq!(error.kind, ProvisionErrorKind::Busy);
    assert_eq!(guest.destructive_op_count(), 0);
    assert!(!guest.has_file(MARKER_PATH));
}
