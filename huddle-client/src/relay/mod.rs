mod memory_relay;
mod relay_channel;

pub use memory_relay::*;
pub use relay_channel::*;
