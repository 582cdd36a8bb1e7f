// SPDX-License-Identifier: GPL-3.0-only

mod oci;
mod ssh;

pub use oci::OciCli;
pub use ssh::SshChannel;
