//! Endpoint validation and resolution

use std::net::{IpAddr, SocketAddr};

use tokio::net::lookup_host;

use crate::error::GatewayError;
use crate::relay::EndpointKey;

/// Parse a port from a request path segment. Zero is rejected.
pub fn parse_port(port: &str) -> Result<u16, GatewayError> {
    match port.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(GatewayError::InvalidPort(port.to_string())),
        Ok(port) => Ok(port),
    }
}

/// Resolve a host name to the canonical key for `host:port`
///
/// IP literals are used as-is. Names are looked up and the first IPv4
/// address wins, falling back to the first address of any family.
pub async fn resolve(host: &str, port: u16) -> Result<EndpointKey, GatewayError> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(EndpointKey::new(ip, port));
    }

    let addrs: Vec<SocketAddr> = lookup_host((host, port))
        .await
        .map_err(|source| GatewayError::Resolve {
            host: host.to_string(),
            source,
        })?
        .collect();

    addrs
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addrs.first())
        .map(|addr| EndpointKey::from(*addr))
        .ok_or_else(|| GatewayError::NoAddress(host.to_string()))
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    #[test]
    fn test_parse_port() {
        assert_eq!(parse_port("22124").unwrap(), 22124);
        assert_eq!(parse_port(" 80 ").unwrap(), 80);
        assert!(matches!(parse_port("0"), Err(GatewayError::InvalidPort(_))));
        assert!(matches!(parse_port("abc"), Err(GatewayError::InvalidPort(_))));
        assert!(matches!(parse_port("70000"), Err(GatewayError::InvalidPort(_))));
        assert!(matches!(parse_port(""), Err(GatewayError::InvalidPort(_))));
    }

    #[tokio::test]
    async fn test_resolve_ip_literal() {
        let key = resolve("10.1.2.3", 22124).await.unwrap();
        assert_eq!(key, EndpointKey::new(Ipv4Addr::new(10, 1, 2, 3), 22124));

        let key = resolve("::1", 22124).await.unwrap();
        assert_eq!(key.to_string(), "[::1]:22124");
    }

    #[tokio::test]
    async fn test_resolve_localhost() {
        let key = resolve("localhost", 22124).await.unwrap();
        assert!(key.address.is_loopback());
        assert_eq!(key.port, 22124);
    }

    #[tokio::test]
    async fn test_resolve_failure() {
        let result = resolve("no-such-host.invalid", 22124).await;
        assert!(result.is_err());
    }
}
