//! TLS context resolution: store loading, key and trust managers, and the
//! BoringSSL connector every secure connection handshakes through.

pub mod context;
pub mod keystore;
pub mod managers;
pub mod options;
pub mod resolve;

pub use context::{HostnameVerifier, TlsContext, TlsSource, TrustStrategy};
pub use keystore::{KeyStore, StoreSource, StoreType};
pub use managers::{KeyManager, OneOrMany, TrustManager, VerifyFn};
pub use options::TlsConfig;
pub use resolve::{hostname_verifier, resolve};
