// SPDX-License-Identifier: GPL-3.0-only

//! Operator configuration: credentials from the environment, instance
//! specs from a TOML file

use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use provision_types::InstanceSpec;

/// Environment variables the `oci` CLI needs. All five are required; the
/// tool fails fast before any remote call when one is missing.
const REQUIRED_ENV: [&str; 5] = [
    "OCI_CLI_USER",
    "OCI_CLI_TENANCY",
    "OCI_CLI_FINGERPRINT",
    "OCI_CLI_KEY_FILE",
    "OCI_CLI_REGION",
];

/// Optional compartment override; the tenancy is the compartment otherwise.
const COMPARTMENT_ENV: &str = "OCI_COMPARTMENT_ID";

/// Optional staging bucket override.
const BUCKET_ENV: &str = "OCI_IMAGE_BUCKET";

#[derive(Debug, Clone)]
pub struct Credentials {
    pub tenancy: String,
    pub compartment: String,
    pub bucket: String,
}

impl Credentials {
    /// Validate the environment and derive the working configuration.
    pub fn from_env() -> Result<Self> {
        let missing: Vec<&str> = REQUIRED_ENV
            .iter()
            .copied()
            .filter(|name| std::env::var(name).map(|value| value.trim().is_empty()).unwrap_or(true))
            .collect();

        if !missing.is_empty() {
            bail!("missing required environment variables: {}", missing.join(", "));
        }

        let tenancy = std::env::var("OCI_CLI_TENANCY").context("OCI_CLI_TENANCY")?;
        let compartment = std::env::var(COMPARTMENT_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| tenancy.clone());
        let bucket = std::env::var(BUCKET_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| "nixos-images".to_string());

        Ok(Self {
            tenancy,
            compartment,
            bucket,
        })
    }
}

/// The operator's provisioning spec file.
#[derive(Debug, Clone, Deserialize)]
pub struct SpecFile {
    /// Flake reference the image derivations live in
    #[serde(default = "default_flake")]
    pub flake: String,

    /// SSH public key installed on launched instances
    pub ssh_public_key: String,

    /// Instances to provision
    #[serde(default)]
    pub instances: Vec<InstanceSpec>,
}

fn default_flake() -> String {
    ".".to_string()
}

impl SpecFile {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading spec file {}", path.display()))?;
        let spec: Self = toml::from_str(&contents)
            .with_context(|| format!("parsing spec file {}", path.display()))?;

        if spec.instances.is_empty() {
            bail!("spec file {} declares no instances", path.display());
        }
        Ok(spec)
    }

    pub fn select(&self, name: Option<&str>) -> Result<Vec<&InstanceSpec>> {
        match name {
            None => Ok(self.instances.iter().collect()),
            Some(name) => {
                let selected: Vec<&InstanceSpec> = self
                    .instances
                    .iter()
                    .filter(|instance| instance.name == name)
                    .collect();
                if selected.is_empty() {
                    bail!("no instance named '{name}' in the spec file");
                }
                Ok(selected)
            }
        }
    }
}
