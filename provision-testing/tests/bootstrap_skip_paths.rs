//! Every precondition miss ends the run without touching a device.

mod common;

use provision_engine::bootstrap::MARKER_PATH;
use provision_engine::{BootstrapOutcome, SkipReason};
use provision_testing::FakeGuest;

#[tokio::test]
async fn marker_present_skips_without_scanning() {
    let guest = FakeGuest::new();
    guest.add_file(MARKER_PATH, "");

    let outcome = common::run_bootstrap(&guest, common::fast_config())
        .await
        .expect("skip is not an error");

    assert_eq!(
        outcome,
        BootstrapOutcome::Skipped(SkipReason::AlreadyCompleted)
    );
    assert_eq!(guest.scans(), 0);
    assert_eq!(guest.destructive_op_count(), 0);
}

#[tokio::test]
async fn preexisting_volume_group_skips_and_writes_the_marker() {
    let guest = FakeGuest::new();
    guest.add_volume_group("datavg");

    let outcome = common::run_bootstrap(&guest, common::fast_config())
        .await
        .expect("skip is not an error");

    assert_eq!(
        outcome,
        BootstrapOutcome::Skipped(SkipReason::VolumeGroupExists)
    );
    assert!(guest.has_file(MARKER_PATH));
    assert_eq!(guest.scans(), 0);
    assert_eq!(guest.destructive_op_count(), 0);
}

#[tokio::test]
async fn missing_boot_disk_skips() {
    let guest = FakeGuest::new();
    guest.add_device(common::bare_volume("/dev/sdb"));

    let outcome = common::run_bootstrap(&guest, common::fast_config())
        .await
        .expect("skip is not an error");

    assert_eq!(outcome, BootstrapOutcome::Skipped(SkipReason::NoBootDisk));
    assert_eq!(guest.scans(), 1);
    assert!(!guest.has_file(MARKER_PATH));
    assert_eq!(guest.destructive_op_count(), 0);
}

#[tokio::test]
async fn ambiguous_boot_disks_skip() {
    let guest = FakeGuest::new();
    guest.add_device(common::boot_disk("/dev/sda"));
    guest.add_device(common::boot_disk("/dev/sdc"));
    guest.add_device(common::bare_volume("/dev/sdb"));

    let outcome = common::run_bootstrap(&guest, common::fast_config())
        .await
        .expect("skip is not an error");

    assert_eq!(outcome, BootstrapOutcome::Skipped(SkipReason::NoBootDisk));
}

#[tokio::test]
async fn boot_disk_without_third_partition_skips() {
    let guest = FakeGuest::new();
    let mut disk = common::boot_disk("/dev/sda");
    disk.partitions.truncate(2);
    guest.add_device(disk);
    guest.add_device(common::bare_volume("/dev/sdb"));

    let outcome = common::run_bootstrap(&guest, common::fast_config())
        .await
        .expect("skip is not an error");

    assert_eq!(
        outcome,
        BootstrapOutcome::Skipped(SkipReason::NoLvmPartition)
    );
    assert_eq!(guest.destructive_op_count(), 0);
}

#[tokio::test]
async fn absent_block_volume_is_polled_exactly_then_skipped() {
    let guest = FakeGuest::new();
    guest.add_device(common::boot_disk("/dev/sda"));

    let outcome = common::run_bootstrap(&guest, common::fast_config())
        .await
        .expect("skip is not an error");

    assert_eq!(outcome, BootstrapOutcome::Skipped(SkipReason::NoBlockVolume));
    // One initial detection plus the twelve bounded wait attempts.
    assert_eq!(guest.scans(), 13);
    assert_eq!(guest.destructive_op_count(), 0);
    assert!(!guest.has_file(MARKER_PATH));
}
