//! Session snapshots, refresh rotation and the request-time checks built on
//! them.

pub mod service;
pub mod store;

pub use service::{IssuedTokens, SessionService};
pub use store::{REFRESH_PREFIX, SESSION_PREFIX, SessionStore};
