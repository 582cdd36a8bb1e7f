mod channel;
mod compute;
mod guest;

pub use channel::ScriptedChannel;
pub use compute::{FakeCompute, FakeImageBuild};
pub use guest::FakeGuest;
