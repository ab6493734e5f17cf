use crate::base::context::TlsResultExt;
use crate::base::neterror::NetError;
use boring::ssl::{SslConnectorBuilder, SslVersion};

/// Protocol settings shared by every TLS context, whatever trust strategy it
/// ends up with. Trust and verification are left to the resolver.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    pub min_version: Option<SslVersion>,
    pub max_version: Option<SslVersion>,
    pub cipher_list: String,
    pub alpn_protos: Vec<String>,
    pub curves: Vec<String>,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            min_version: Some(SslVersion::TLS1_2),
            max_version: Some(SslVersion::TLS1_3),
            cipher_list: "ECDHE-ECDSA-AES128-GCM-SHA256:ECDHE-RSA-AES128-GCM-SHA256:\
                ECDHE-ECDSA-AES256-GCM-SHA384:ECDHE-RSA-AES256-GCM-SHA384:\
                ECDHE-ECDSA-CHACHA20-POLY1305:ECDHE-RSA-CHACHA20-POLY1305:\
                AES128-GCM-SHA256:AES256-GCM-SHA384"
                .to_string(),
            alpn_protos: vec!["http/1.1".to_string()],
            curves: vec!["X25519".to_string(), "P-256".to_string(), "P-384".to_string()],
        }
    }
}

impl TlsConfig {
    /// Apply this configuration to an SSL connector builder.
    pub fn apply_to_builder(&self, builder: &mut SslConnectorBuilder) -> Result<(), NetError> {
        if let Some(min) = self.min_version {
            builder.set_min_proto_version(Some(min)).tls_context("setting minimum TLS version")?;
        }
        if let Some(max) = self.max_version {
            builder.set_max_proto_version(Some(max)).tls_context("setting maximum TLS version")?;
        }

        builder.set_cipher_list(&self.cipher_list).tls_context("setting cipher list")?;

        if !self.alpn_protos.is_empty() {
            let mut alpn_wire = Vec::new();
            for proto in &self.alpn_protos {
                if proto.len() > 255 {
                    return Err(NetError::tls_configuration(format!(
                        "ALPN protocol longer than 255 bytes: {}",
                        proto
                    )));
                }
                alpn_wire.push(proto.len() as u8);
                alpn_wire.extend_from_slice(proto.as_bytes());
            }
            builder.set_alpn_protos(&alpn_wire).tls_context("setting ALPN protocols")?;
        }

        if !self.curves.is_empty() {
            builder.set_curves_list(&self.curves.join(":")).tls_context("setting curves")?;
        }

        Ok(())
    }

    /// Check if SNI should be set for this host.
    /// Per RFC 6066, SNI MUST NOT be set for raw IP addresses.
    pub fn should_set_sni(host: &str) -> bool {
        host.trim_start_matches('[').trim_end_matches(']').parse::<std::net::IpAddr>().is_err()
    }
}
