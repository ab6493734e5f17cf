//! Base types and error handling.
//!
//! - [`NetError`](neterror::NetError): network and configuration error codes
//! - [`context`]: `Result` extensions that attach host, domain or store context

pub mod context;
pub mod neterror;
