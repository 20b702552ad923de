//! Endpoint identity
//!
//! Channels are keyed by the resolved address of the upstream server, so
//! `localhost:9000` and `127.0.0.1:9000` share one channel.

use std::net::{IpAddr, SocketAddr};

/// Canonical identifier for an upstream endpoint (resolved address + port)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EndpointKey {
    /// Resolved address
    pub address: IpAddr,
    /// Port
    pub port: u16,
}

impl EndpointKey {
    /// Create a new endpoint key
    pub fn new(address: impl Into<IpAddr>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }

    /// The endpoint as a socket address
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }
}

impl From<SocketAddr> for EndpointKey {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip(), addr.port())
    }
}

impl std::fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.socket_addr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_display() {
        let key = EndpointKey::new(Ipv4Addr::new(10, 0, 0, 7), 22124);
        assert_eq!(key.to_string(), "10.0.0.7:22124");

        let key = EndpointKey::new(Ipv6Addr::LOCALHOST, 22124);
        assert_eq!(key.to_string(), "[::1]:22124");
    }

    #[test]
    fn test_same_address_same_key() {
        let a = EndpointKey::new(Ipv4Addr::LOCALHOST, 22124);
        let b: EndpointKey = "127.0.0.1:22124".parse::<SocketAddr>().unwrap().into();
        let c = EndpointKey::new(Ipv4Addr::LOCALHOST, 22125);

        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(a, b);
        assert_eq!(set.len(), 2);
    }
}
