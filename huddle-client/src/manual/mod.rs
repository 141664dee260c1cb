mod manual_session;

pub use manual_session::*;
