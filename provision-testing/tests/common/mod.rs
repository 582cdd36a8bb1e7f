#![allow(dead_code)]

use std::time::Duration;

use provision_contracts::ProvisionError;
use provision_engine::{BootstrapConfig, BootstrapOutcome, StorageBootstrap};
use provision_testing::FakeGuest;
use provision_types::{BlockDevice, Partition, StorageLayoutPlan};

/// A boot disk in the shape the image produces: ESP first, root second,
/// the LVM partition third.
pub fn boot_disk(path: &str) -> BlockDevice {
    BlockDevice {
        path: path.to_string(),
        partitions: vec![
            Partition {
                path: format!("{path}1"),
                label: Some("ESP".to_string()),
            },
            Partition {
                path: format!("{path}2"),
                label: None,
            },
            Partition {
                path: format!("{path}3"),
                label: None,
            },
        ],
    }
}

/// An attached data volume: no partitions at all.
pub fn bare_volume(path: &str) -> BlockDevice {
    BlockDevice {
        path: path.to_string(),
        partitions: Vec::new(),
    }
}

/// Default tuning with the wait cadence compressed for tests.
pub fn fast_config() -> BootstrapConfig {
    BootstrapConfig {
        volume_wait_interval: Duration::from_millis(1),
        ..BootstrapConfig::default()
    }
}

pub async fn run_bootstrap(
    guest: &FakeGuest,
    config: BootstrapConfig,
) -> Result<BootstrapOutcome, ProvisionError> {
    let orchestrator = StorageBootstrap::new(guest, guest, guest, guest, config);
    orchestrator.run(&StorageLayoutPlan::data_volume()).await
}

/// Index of the first log entry starting with `prefix`.
pub fn log_index(log: &[String], prefix: &str) -> usize {
    log.iter()
        .position(|entry| entry.starts_with(prefix))
        .unwrap_or_else(|| panic!("no log entry starting with '{prefix}' in {log:?}"))
}
