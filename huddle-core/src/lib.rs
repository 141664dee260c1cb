//! Wire and data model shared by every huddle crate.
//!
//! Everything here is plain data: identifiers, relay addresses and the
//! JSON messages exchanged through the relay. No I/O.

pub mod model;

pub use model::*;
