// SPDX-License-Identifier: GPL-3.0-only

//! Low-level command construction and output parsing for the provisioning
//! workflow
//!
//! This crate is the toolbox the higher layers assemble guest and local
//! commands from:
//! - builders for the LVM/btrfs/rsync/mount command lines the bootstrap
//!   sends over the remote channel
//! - parsers turning `lsblk`/`vgs` output into domain types
//! - a local process runner used for the Nix image build
//!
//! Builders and parsers are pure; the only process execution in here is
//! `cmd::run` for local tools.

pub mod blockdev;
pub mod btrfs;
pub mod cmd;
pub mod error;
pub mod fsops;
pub mod lsblk;
pub mod lvm;
pub mod nix;
pub mod shell;

pub use error::{Result, SysError};
