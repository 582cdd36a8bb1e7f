// SPDX-License-Identifier: GPL-3.0-only

mod error;
mod exec;

pub use error::{ProvisionError, ProvisionErrorKind};
pub use exec::{ExecOutput, SyncMode};
