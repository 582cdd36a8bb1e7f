// SPDX-License-Identifier: GPL-3.0-only

pub mod protocol;
pub mod traits;

pub use protocol::{ExecOutput, ProvisionError, ProvisionErrorKind, SyncMode};
pub use traits::{
    BlockDeviceOps, BootstrapLock, ComputeApi, GuestChannel, GuestFiles, ImageBuild,
    LaunchRequest, SystemOps, VolumeAttachment,
};
