//! `warden-core` — identifier primitives shared by every other crate.
//!
//! This crate has no IO and no knowledge of tokens, stores or HTTP.

pub mod error;
pub mod id;

pub use error::DomainError;
pub use id::{IdentityId, SessionRef};
