//! Partition growth

use crate::shell::quote;

pub fn growpart(disk: &str, partition_number: u32) -> String {
    format!("growpart {} {}", quote(disk), partition_number)
}

/// Interpret a `growpart` run. The tool exits 1 with a `NOCHANGE` report
/// when the partition already reaches the end of the disk; that counts as
/// success for the bootstrap.
pub fn growpart_succeeded(exit_code: i32, stdout: &str) -> bool {
    exit_code == 0 || (exit_code == 1 && stdout.contains("NOCHANGE"))
}
