// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use crate::ProvisionError;

/// The local build system producing the base disk image.
///
/// `identity` must be cheap: it derives the content hash without forcing a
/// build, so resolution can check the remote cache first. `realize` is the
/// expensive path, only taken on a cache miss.
pub trait ImageBuild: Send + Sync {
    /// Content hash identifying the image for one architecture.
    fn identity(&self, arch: provision_types::Arch) -> Result<String, ProvisionError>;

    /// Ensure the image is built locally and return the image file path.
    fn realize(&self, arch: provision_types::Arch) -> Result<PathBuf, ProvisionError>;
}
