mod negotiation_machine;
mod negotiation_phase;

pub use negotiation_machine::*;
pub use negotiation_phase::*;
