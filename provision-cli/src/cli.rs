// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use provision_types::Arch;

#[derive(Debug, Parser)]
#[command(name = "provision")]
#[command(about = "Provision NixOS instances on OCI and bootstrap their storage")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Resolve the image, launch instances and bootstrap their storage
    Provision {
        /// TOML file holding the instance specs
        #[arg(long)]
        spec: PathBuf,
        /// Only provision the instance with this name
        #[arg(long)]
        name: Option<String>,
        /// Apply the generated system configuration and reboot, instead of
        /// printing instructions
        #[arg(long)]
        apply: bool,
        /// Stop after the instance is reachable; leave storage untouched
        #[arg(long)]
        skip_bootstrap: bool,
    },
    /// Run only the storage bootstrap against an existing host
    Bootstrap {
        /// Host to connect to
        #[arg(long)]
        host: String,
        /// Login user for the remote channel
        #[arg(long, default_value = "root")]
        user: String,
        /// Apply the generated system configuration and reboot
        #[arg(long)]
        apply: bool,
    },
    /// Image operations
    #[command(subcommand)]
    Image(ImageCommand),
}

#[derive(Debug, Subcommand)]
pub enum ImageCommand {
    /// Resolve (build, upload and register as needed) the image for an
    /// architecture
    Resolve {
        #[arg(long)]
        arch: Arch,
        /// Flake reference the image derivation lives in
        #[arg(long, default_value = ".")]
        flake: String,
        /// Keep the staged object after registration
        #[arg(long)]
        keep_staged: bool,
    },
    /// Delete all but the newest images
    Prune {
        /// How many images to keep
        #[arg(default_value_t = 3)]
        keep: usize,
        /// Skip the interactive confirmation
        #[arg(long)]
        force: bool,
    },
}
