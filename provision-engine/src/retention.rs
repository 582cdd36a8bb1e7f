// SPDX-License-Identifier: GPL-3.0-only

//! Image retention: keep the N newest managed images, delete the rest

use provision_contracts::{ComputeApi, ProvisionError};
use provision_types::ImageArtifact;

/// Apply the keep-N-newest policy to the managed images.
///
/// Candidates are everything past index `keep_count` after sorting by
/// creation time, newest first. `confirm` is consulted with the candidate
/// list unless `force` is set; declining deletes nothing. Individual
/// deletion failures are logged and skipped; the batch is best-effort.
/// Returns the ids actually deleted.
pub async fn prune(
    api: &dyn ComputeApi,
    keep_count: usize,
    force: bool,
    confirm: impl FnOnce(&[ImageArtifact]) -> bool,
) -> Result<Vec<String>, ProvisionError> {
    let mut images = api.list_managed_images().await?;
    images.sort_by(|left, right| right.time_created.cmp(&left.time_created));

    if images.len() <= keep_count {
        tracing::info!(
            total = images.len(),
            keep = keep_count,
            "nothing to prune"
        );
        return Ok(Vec::new());
    }

    let candidates = images.split_off(keep_count);
    tracing::info!(
        keep = keep_count,
        deleting = candidates.len(),
        "pruning old images"
    );

    if !force && !confirm(&candidates) {
        tracing::info!("prune aborted by operator");
        return Ok(Vec::new());
    }

    let mut deleted = Vec::new();
    for artifact in &candidates {
        let Some(image_id) = artifact.image_id.as_deref() else {
            tracing::warn!(name = %artifact.display_name, "skipping unregistered artifact");
            continue;
        };

        match api.delete_image(image_id).await {
            Ok(()) => {
                tracing::info!(%image_id, name = %artifact.display_name, "deleted image");
                deleted.push(image_id.to_string());
            }
            Err(error) => {
                tracing::warn!(%image_id, "failed to delete image: {error}");
            }
        }
    }

    Ok(deleted)
}
