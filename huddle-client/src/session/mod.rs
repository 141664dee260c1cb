mod membership;
mod session_command;
mod session_coordinator;
mod session_observer;

pub use membership::*;
pub use session_command::*;
pub use session_coordinator::*;
pub use session_observer::*;
