//! Ergonomic error context helpers.
//!
//! Extension traits for converting IO and BoringSSL failures into
//! context-rich `NetError` variants.

use crate::base::neterror::NetError;
use boring::error::ErrorStack;
use std::io;

/// Extension trait for adding context to IO Results.
pub trait IoResultExt<T> {
    /// Add connection context to an IO error.
    ///
    /// # Example
    /// ```ignore
    /// use connmgr::base::context::IoResultExt;
    ///
    /// let stream = TcpStream::connect(addr).await
    ///     .connection_context("example.com", 443)?;
    /// // Error: "Connection to example.com:443 failed: connection refused"
    /// ```
    fn connection_context(self, host: &str, port: u16) -> Result<T, NetError>;

    /// Add DNS resolution context to an IO error.
    fn dns_context(self, domain: &str) -> Result<T, NetError>;

    /// Treat an IO error as a failure to read TLS material from `source`.
    fn store_context(self, source: &str) -> Result<T, NetError>;
}

impl<T> IoResultExt<T> for Result<T, io::Error> {
    fn connection_context(self, host: &str, port: u16) -> Result<T, NetError> {
        self.map_err(|e| NetError::connection_failed_to(host, port, e))
    }

    fn dns_context(self, domain: &str) -> Result<T, NetError> {
        self.map_err(|e| NetError::dns_failed(domain, e))
    }

    fn store_context(self, source: &str) -> Result<T, NetError> {
        self.map_err(|e| NetError::tls_configuration(format!("cannot read {}: {}", source, e)))
    }
}

/// Extension trait for BoringSSL results.
pub trait TlsResultExt<T> {
    /// Map a BoringSSL error stack to [`NetError::TlsConfiguration`],
    /// prefixed with what was being attempted.
    fn tls_context(self, what: &str) -> Result<T, NetError>;
}

impl<T> TlsResultExt<T> for Result<T, ErrorStack> {
    fn tls_context(self, what: &str) -> Result<T, NetError> {
        self.map_err(|e| NetError::tls_configuration(format!("{}: {}", what, e)))
    }
}
