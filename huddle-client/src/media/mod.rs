mod media_source;
mod synthetic_source;

pub use media_source::*;
pub use synthetic_source::*;
