//! Socket and connection management.
//!
//! - [`route`]: `(scheme, host, port)` connection groups
//! - [`provider`]: how a transport stream is opened (direct, closure, SOCKS5)
//! - [`factory`]: plain and TLS factories over a provider
//! - [`pool`]: route-aware pool with total and per-route limits

pub mod client;
pub mod factory;
pub mod options;
pub mod pool;
pub mod provider;
pub mod route;
pub mod socks;
