//! Content-addressed image artifacts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Guest CPU architecture an image is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Arch {
    X86_64,
    Aarch64,
}

impl Arch {
    /// Tag value used to mark remote images with their architecture
    pub fn tag(&self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64",
            Self::Aarch64 => "aarch64",
        }
    }

    /// Nix system double for this architecture
    pub fn nix_system(&self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64-linux",
            Self::Aarch64 => "aarch64-linux",
        }
    }
}

impl std::str::FromStr for Arch {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "x86_64" | "x86-64" | "amd64" => Ok(Self::X86_64),
            "aarch64" | "arm64" => Ok(Self::Aarch64),
            other => Err(format!("unknown architecture '{other}'")),
        }
    }
}

impl std::fmt::Display for Arch {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.tag())
    }
}

/// A build artifact identified by the content hash of its inputs.
///
/// The `(content_hash, arch)` pair is the identity used for remote
/// dedup: resolving the same pair again reuses the registered image
/// instead of uploading a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageArtifact {
    /// Architecture tag
    pub arch: Arch,

    /// Content hash derived from the build system's output path
    pub content_hash: String,

    /// Remote image id; `None` until uploaded and registered
    pub image_id: Option<String>,

    /// Display name the image was registered under
    pub display_name: String,

    /// Creation timestamp reported by the provisioning API
    pub time_created: Option<DateTime<Utc>>,
}

impl ImageArtifact {
    /// Whether this artifact is already registered remotely
    pub fn is_registered(&self) -> bool {
        self.image_id.is_some()
    }

    /// Display name for a freshly built artifact
    pub fn display_name_for(arch: Arch, content_hash: &str) -> String {
        let short = &content_hash[..content_hash.len().min(12)];
        format!("nixos-{}-{}", arch.tag(), short)
    }
}
