//! Local interface to the Nix build system
//!
//! The image is content-addressed by its store path: evaluating the flake
//! output is enough to learn the identity without building, and the build
//! itself only runs when the evaluated path is absent from the local store.

use std::path::{Path, PathBuf};

use provision_types::Arch;

use crate::cmd;
use crate::error::{Result, SysError};

/// File the image derivation places inside its output directory.
const IMAGE_FILE_NAME: &str = "nixos.qcow2";

/// Flake attribute holding the disk image for one architecture.
pub fn image_attribute(flake_ref: &str, arch: Arch) -> String {
    format!("{}#packages.{}.oci-image", flake_ref, arch.nix_system())
}

/// Evaluate the image's output path without building it.
pub fn eval_image_path(flake_ref: &str, arch: Arch) -> Result<PathBuf> {
    cmd::require_tool("nix")?;
    let attribute = format!("{}.outPath", image_attribute(flake_ref, arch));
    let output = cmd::run(
        "nix",
        &["eval".to_string(), "--raw".to_string(), attribute],
    )?;
    Ok(PathBuf::from(output.trim()))
}

/// Build the image and return its store path.
pub fn build_image(flake_ref: &str, arch: Arch) -> Result<PathBuf> {
    cmd::require_tool("nix")?;
    let output = cmd::run(
        "nix",
        &[
            "build".to_string(),
            "--no-link".to_string(),
            "--print-out-paths".to_string(),
            image_attribute(flake_ref, arch),
        ],
    )?;

    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .next_back()
        .map(PathBuf::from)
        .ok_or_else(|| SysError::ParseFailed("nix build printed no out paths".to_string()))
}

/// Extract the content hash from a store path like
/// `/nix/store/<hash>-nixos-image`.
pub fn store_path_hash(store_path: &Path) -> Result<String> {
    let base = store_path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            SysError::ParseFailed(format!("not a store path: {}", store_path.display()))
        })?;

    let hash: String = base.chars().take_while(|character| *character != '-').collect();
    if hash.len() == 32
        && hash
            .chars()
            .all(|character| character.is_ascii_lowercase() || character.is_ascii_digit())
    {
        Ok(hash)
    } else {
        Err(SysError::ParseFailed(format!(
            "no content hash in store path: {}",
            store_path.display()
        )))
    }
}

/// The image file inside a built store path.
pub fn image_file(store_path: &Path) -> PathBuf {
    store_path.join(IMAGE_FILE_NAME)
}
