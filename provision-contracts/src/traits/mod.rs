// SPDX-License-Identifier: GPL-3.0-only

mod build;
mod compute;
mod guest;

pub use build::ImageBuild;
pub use compute::{ComputeApi, LaunchRequest, VolumeAttachment};
pub use guest::{BlockDeviceOps, BootstrapLock, GuestChannel, GuestFiles, SystemOps};
