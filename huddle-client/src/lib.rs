pub mod clock;
pub mod config;
pub mod error;
pub mod identity;
pub mod manual;
pub mod media;
pub mod negotiation;
pub mod registry;
pub mod relay;
pub mod session;
pub mod transport;

pub use clock::*;
pub use config::*;
pub use error::*;
pub use identity::*;
pub use manual::*;
pub use media::*;
pub use negotiation::*;
pub use registry::*;
pub use relay::*;
pub use session::*;
pub use transport::*;
