// SPDX-License-Identifier: GPL-3.0-only

//! Canonical domain models for the NixOS-on-OCI provisioning workflow
//!
//! This crate defines the single source of truth for the domain types used
//! throughout the stack:
//!
//! - **provision-sys**: produces these types from command output parsers
//! - **provision-engine**: drives the orchestration state machine over them
//! - **provision-cli**: loads instance specs into them and prints them
//!
//! Everything here is plain data plus pure derivations; no I/O happens in
//! this crate. Device inventories in particular are snapshots: they are
//! rebuilt by re-scanning the guest and never mutated in place.

pub mod common;
pub mod device;
pub mod image;
pub mod instance;
pub mod layout;

pub use common::bytes_to_pretty;
pub use device::{
    BlockDevice, DeviceClassification, DeviceInventory, DeviceRole, Partition, classify_devices,
};
pub use image::{Arch, ImageArtifact};
pub use instance::{InstanceHandle, InstanceLifecycle, InstanceSpec};
pub use layout::{StorageLayoutPlan, Subvolume};
