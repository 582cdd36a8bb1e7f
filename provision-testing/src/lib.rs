//! In-memory fakes for the provisioning contracts
//!
//! The fakes keep the whole guest and provider state in process so the
//! orchestration state machines can be exercised end to end without a
//! device, a network or a build system. Every fake records the operations
//! applied to it; tests assert on those logs as much as on outcomes.

pub mod fake;

pub use fake::{FakeCompute, FakeGuest, FakeImageBuild, ScriptedChannel};
