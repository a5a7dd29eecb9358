//! HTTP API: routing, the authentication/authorization gate and rate limiting.

pub mod app;
pub mod context;
pub mod middleware;
