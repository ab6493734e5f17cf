//! # connmgr
//!
//! Connection managers for an HTTP client: the layer that opens, pools,
//! secures and tears down the connections requests are sent over.
//!
//! One configuration surface drives four managers:
//!
//! - **Basic**: a single connection, replaced when the route changes
//! - **Pooling**: bounded by `threads` in total and `default-per-route`
//! - **Pooling (async)**: the same pool wired to a background IO reactor
//! - **SOCKS**: every scheme tunnelled through a fixed SOCKS5 proxy
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use connmgr::config::ConnectionManagerConfig;
//! use connmgr::manager::{build_pooling_manager, shutdown};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), connmgr::NetError> {
//!     let config = ConnectionManagerConfig::new().threads(8).default_per_route(4);
//!     let manager = build_pooling_manager(&config)?;
//!
//!     let url = url::Url::parse("https://example.com/").unwrap();
//!     let conn = manager.pool().lease_url(&url).await?;
//!     // ... write a request, read the response ...
//!     conn.release();
//!
//!     shutdown(Some(&manager))
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Error definitions and context helpers
//! - [`config`] - Manager options, readable from JSON
//! - [`dns`] - Pluggable host resolution
//! - [`manager`] - Manager constructors, shutdown and scope holders
//! - [`reactor`] - Background IO reactor for the async manager
//! - [`registry`] - Scheme to socket factory registry
//! - [`socket`] - Routes, pool, socket providers and SOCKS5
//! - [`tls`] - TLS context resolution from stores and managers

pub mod base;
pub mod config;
pub mod dns;
pub mod manager;
pub mod reactor;
pub mod registry;
pub mod socket;
pub mod tls;

pub use base::neterror::NetError;
pub use config::ConnectionManagerConfig;
pub use manager::{
    build_async_pooling_manager, build_basic_manager, build_pooling_manager, build_socks_manager,
    is_reusable, shutdown, ActiveManagers, ConnectionManager, ManagerKind,
};
pub use registry::{Registry, RegistryBuilder, RegistrySource};
pub use socket::pool::{ConnPool, PooledConnection};
pub use socket::route::Route;
