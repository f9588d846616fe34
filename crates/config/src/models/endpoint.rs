use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::validation::{ConfigValidator, ValidationUtils};

/// Transport security used towards the collector. There is no implicit
/// fallback from one mode to the other.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportSecurity {
    #[default]
    Insecure,
    Tls,
}

impl TransportSecurity {
    pub fn scheme(&self) -> &'static str {
        match self {
            TransportSecurity::Insecure => "http",
            TransportSecurity::Tls => "https",
        }
    }

    pub fn from_insecure_flag(insecure: bool) -> Self {
        if insecure {
            TransportSecurity::Insecure
        } else {
            TransportSecurity::Tls
        }
    }
}

impl std::str::FromStr for TransportSecurity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "insecure" | "http" => Ok(TransportSecurity::Insecure),
            "tls" | "https" => Ok(TransportSecurity::Tls),
            _ => Err(format!(
                "Invalid transport security: {s}. Valid values: insecure, tls"
            )),
        }
    }
}

/// Collector endpoint for one signal kind (or shared by both)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EndpointConfig {
    /// `host:port` of the collector
    pub address: String,
    pub security: TransportSecurity,
    /// Per-export request timeout
    pub timeout_ms: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            address: "localhost:4317".to_string(),
            security: TransportSecurity::Insecure,
            timeout_ms: 10_000,
        }
    }
}

impl EndpointConfig {
    pub fn new(address: impl Into<String>, security: TransportSecurity) -> Self {
        Self {
            address: address.into(),
            security,
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Parsed collector URL, scheme chosen from the security mode.
    pub fn url(&self) -> crate::ConfigResult<Url> {
        ValidationUtils::validate_host_port(&self.address, "endpoint.address")?;

        let url = Url::parse(&format!("{}://{}", self.security.scheme(), self.address))?;

        if url.host_str().map_or(true, str::is_empty) {
            return Err(crate::ConfigError::Validation(format!(
                "endpoint.address has no host: {}",
                self.address
            )));
        }
        if url.path() != "/" || url.query().is_some() || !url.username().is_empty() {
            return Err(crate::ConfigError::Validation(format!(
                "endpoint.address must be plain host:port, got {}",
                self.address
            )));
        }

        Ok(url)
    }

    /// Collector URI as handed to the exporter. The port is always explicit.
    pub fn uri(&self) -> crate::ConfigResult<String> {
        let url = self.url()?;
        let host = url.host_str().unwrap_or_default();
        let port = url.port_or_known_default().unwrap_or_default();
        Ok(format!("{}://{host}:{port}", url.scheme()))
    }
}

impl ConfigValidator for EndpointConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        self.url()?;
        ValidationUtils::validate_positive_ms(self.timeout_ms, "endpoint.timeout_ms")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_uri_uses_security_scheme() {
        let insecure = EndpointConfig::new("collector:4317", TransportSecurity::Insecure);
        assert_eq!(insecure.uri().unwrap(), "http://collector:4317");

        let tls = EndpointConfig::new("collector:4317", TransportSecurity::Tls);
        assert_eq!(tls.uri().unwrap(), "https://collector:4317");
    }

    #[test]
    fn test_endpoint_keeps_well_known_port() {
        let endpoint = EndpointConfig::new("collector:80", TransportSecurity::Insecure);
        assert_eq!(endpoint.uri().unwrap(), "http://collector:80");

        let ipv6 = EndpointConfig::new("[::1]:4317", TransportSecurity::Insecure);
        assert_eq!(ipv6.uri().unwrap(), "http://[::1]:4317");
    }

    #[test]
    fn test_endpoint_rejects_malformed_addresses() {
        for address in [
            "",
            "collector",
            "collector:abc",
            "http://collector:4317",
            "collector:4317/v1/traces",
            "user@collector:4317",
        ] {
            let endpoint = EndpointConfig::new(address, TransportSecurity::Insecure);
            assert!(endpoint.validate().is_err(), "{address} should be rejected");
        }
    }

    #[test]
    fn test_endpoint_rejects_zero_timeout() {
        let mut endpoint = EndpointConfig::default();
        endpoint.timeout_ms = 0;
        assert!(endpoint.validate().is_err());
    }

    #[test]
    fn test_transport_security_from_str() {
        assert_eq!(
            "TLS".parse::<TransportSecurity>().unwrap(),
            TransportSecurity::Tls
        );
        assert_eq!(
            "insecure".parse::<TransportSecurity>().unwrap(),
            TransportSecurity::Insecure
        );
        assert!("plaintext".parse::<TransportSecurity>().is_err());
    }
}
