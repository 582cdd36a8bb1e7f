// SPDX-License-Identifier: GPL-3.0-only

//! Image resolution: content-addressed reuse of uploaded disk images
//!
//! The image identity is the `(content hash, architecture)` pair derived
//! from the build system's output path. Resolution is lazy about work:
//! the identity comes from evaluation alone, the build only runs when the
//! store path is absent locally, and the upload only happens when no
//! remote image carries the same identity.

use std::path::PathBuf;

use provision_contracts::{ComputeApi, ImageBuild, ProvisionError, ProvisionErrorKind};
use provision_sys::{SysError, nix};
use provision_types::{Arch, ImageArtifact};

fn build_error(error: SysError) -> ProvisionError {
    ProvisionError::new(ProvisionErrorKind::Unavailable, error.to_string())
}

/// `ImageBuild` backed by the local Nix installation.
pub struct NixImageBuild {
    flake_ref: String,
}

impl NixImageBuild {
    pub fn new(flake_ref: impl Into<String>) -> Self {
        Self {
            flake_ref: flake_ref.into(),
        }
    }
}

impl ImageBuild for NixImageBuild {
    fn identity(&self, arch: Arch) -> Result<String, ProvisionError> {
        let store_path = nix::eval_image_path(&self.flake_ref, arch).map_err(build_error)?;
        nix::store_path_hash(&store_path).map_err(build_error)
    }

    fn realize(&self, arch: Arch) -> Result<PathBuf, ProvisionError> {
        let store_path = nix::eval_image_path(&self.flake_ref, arch).map_err(build_error)?;
        let store_path = if store_path.exists() {
            store_path
        } else {
            tracing::info!(%arch, "building disk image");
            nix::build_image(&self.flake_ref, arch).map_err(build_error)?
        };
        Ok(nix::image_file(&store_path))
    }
}

/// Resolves an architecture to a registered remote image.
pub struct ImageResolver<'a> {
    api: &'a dyn ComputeApi,
    builder: &'a dyn ImageBuild,

    /// Delete the staged object after image registration. Best-effort.
    delete_staged_object: bool,
}

impl<'a> ImageResolver<'a> {
    pub fn new(api: &'a dyn ComputeApi, builder: &'a dyn ImageBuild) -> Self {
        Self {
            api,
            builder,
            delete_staged_object: true,
        }
    }

    pub fn keep_staged_object(mut self) -> Self {
        self.delete_staged_object = false;
        self
    }

    /// Resolve the image for one architecture, reusing a remote artifact
    /// when its identity matches and uploading a fresh build otherwise.
    pub async fn resolve(&self, arch: Arch) -> Result<ImageArtifact, ProvisionError> {
        let content_hash = self.builder.identity(arch)?;

        let existing = self.api.find_images(&content_hash, arch).await?;
        if let Some(artifact) = existing.into_iter().next() {
            tracing::info!(
                image_id = artifact.image_id.as_deref().unwrap_or("<unknown>"),
                %arch,
                "reusing registered image"
            );
            return Ok(artifact);
        }

        let image_file = self.builder.realize(arch)?;
        let image_file = image_file.to_str().ok_or_else(|| {
            ProvisionError::new(
                ProvisionErrorKind::Internal,
                format!("non-utf8 image path: {}", image_file.display()),
            )
        })?;

        let display_name = ImageArtifact::display_name_for(arch, &content_hash);
        let object_name = format!("{display_name}.qcow2");

        tracing::info!(%arch, object = %object_name, "uploading disk image");
        self.api.put_object(&object_name, image_file).await?;
        let image_id = self
            .api
            .create_image_from_object(&object_name, &display_name, &content_hash, arch)
            .await?;

        if self.delete_staged_object {
            if let Err(error) = self.api.delete_object(&object_name).await {
                tracing::warn!(object = %object_name, "failed to delete staged object: {error}");
            }
        }

        Ok(ImageArtifact {
            arch,
            content_hash,
            image_id: Some(image_id),
            display_name,
            time_created: None,
        })
    }
}
