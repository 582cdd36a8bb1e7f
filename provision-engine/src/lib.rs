// SPDX-License-Identifier: GPL-3.0-only

//! Orchestration engine for the NixOS-on-OCI provisioning workflow
//!
//! The engine drives external collaborators (a provisioning API, a remote
//! command channel, the local Nix build) through trait seams defined in
//! `provision-contracts`. Nothing in here talks to a device or a network
//! directly; the `adapters` module supplies the production implementation
//! of the guest-side traits on top of any remote command channel.

pub mod adapters;
pub mod bootstrap;
pub mod image;
pub mod instance;
pub mod nixcfg;
pub mod readiness;
pub mod retention;

pub use bootstrap::{BootstrapConfig, BootstrapOutcome, SkipReason, StorageBootstrap};
pub use image::{ImageResolver, NixImageBuild};
pub use instance::InstanceProvisioner;
pub use readiness::{Readiness, ReadinessProbe};
pub use retention::prune;
