//! DNS Resolution Module
//!
//! The `Resolve` trait backs the `dns-resolver` configuration option. Managers
//! fall back to [`GaiResolver`] (system `getaddrinfo`) when none is given.
//!
//! ```rust,ignore
//! use connmgr::dns::{GaiResolver, Name, Resolve};
//!
//! let addrs = GaiResolver::new().resolve(Name::new("example.com")).await?;
//! ```

mod gai;
mod resolve;

pub use gai::{resolve_target, GaiResolver};
pub use resolve::{Addrs, Name, Resolve, Resolving, StaticHostResolver};
