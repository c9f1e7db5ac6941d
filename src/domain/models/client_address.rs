//! Client network identity used as the cache and session matching key.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

/// IP address of the client that originated a request.
///
/// IPv4-mapped IPv6 addresses are folded to plain IPv4 so that a dual-stack
/// listener and the backend's session list agree on the same textual form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientAddress(IpAddr);

impl ClientAddress {
    pub fn new(ip: IpAddr) -> Self {
        Self(ip.to_canonical())
    }

    pub const fn ip(&self) -> IpAddr {
        self.0
    }

    /// Parse a backend reported endpoint (`1.2.3.4`, `1.2.3.4:80`, `[::1]:80`, `::1`).
    pub fn parse_endpoint(endpoint: &str) -> Option<Self> {
        let endpoint = endpoint.trim();
        if let Ok(ip) = IpAddr::from_str(endpoint) {
            return Some(Self::new(ip));
        }
        SocketAddr::from_str(endpoint)
            .ok()
            .map(|addr| Self::new(addr.ip()))
    }

    /// Exact address equality with a backend reported endpoint.
    pub fn matches_endpoint(&self, endpoint: &str) -> bool {
        Self::parse_endpoint(endpoint).is_some_and(|other| other == *self)
    }
}

impl From<IpAddr> for ClientAddress {
    fn from(ip: IpAddr) -> Self {
        Self::new(ip)
    }
}

impl From<SocketAddr> for ClientAddress {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip())
    }
}

impl FromStr for ClientAddress {
    type Err = std::net::AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        IpAddr::from_str(s.trim()).map(Self::new)
    }
}

impl fmt::Display for ClientAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
