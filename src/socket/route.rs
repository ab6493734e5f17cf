use crate::base::neterror::NetError;
use std::fmt;
use url::Url;

/// Identifies a connection group: scheme, host and port.
///
/// The pool keys capacity and idle connections by route; the registry picks a
/// socket factory by the route's scheme.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
    scheme: String,
    host: String,
    port: u16,
}

impl Route {
    /// Create a route. The scheme is lowercased so it matches registry keys.
    pub fn new(scheme: &str, host: &str, port: u16) -> Self {
        Self { scheme: scheme.to_ascii_lowercase(), host: host.to_string(), port }
    }

    /// Derive a route from a URL, using the scheme's default port when the
    /// URL carries none.
    pub fn from_url(url: &Url) -> Result<Self, NetError> {
        let host = url.host_str().ok_or(NetError::InvalidUrl)?;
        let port = url.port_or_known_default().ok_or(NetError::InvalidUrl)?;
        Ok(Self::new(url.scheme(), host, port))
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_secure(&self) -> bool {
        self.scheme == "https"
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_from_url_default_port() {
        let route = Route::from_url(&Url::parse("https://example.com/path").unwrap()).unwrap();
        assert_eq!(route.scheme(), "https");
        assert_eq!(route.host(), "example.com");
        assert_eq!(route.port(), 443);
        assert!(route.is_secure());
    }

    #[test]
    fn test_route_from_url_explicit_port() {
        let route = Route::from_url(&Url::parse("http://127.0.0.1:8080/").unwrap()).unwrap();
        assert_eq!(route.port(), 8080);
        assert_eq!(route.to_string(), "http://127.0.0.1:8080");
    }

    #[test]
    fn test_route_without_host_is_invalid() {
        let err = Route::from_url(&Url::parse("data:text/plain,hello").unwrap()).unwrap_err();
        assert!(matches!(err, NetError::InvalidUrl));
    }

    #[test]
    fn test_scheme_is_lowercased() {
        assert_eq!(Route::new("HTTPS", "a", 1), Route::new("https", "a", 1));
    }
}
