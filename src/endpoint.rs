//! Network endpoints of devices.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Host and port of a device, supplied by the device registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    /// TCP port MagicHome bulbs listen on.
    pub const BULB_PORT: u16 = 5577;
    /// Default SSH port of compute endpoints.
    pub const SSH_PORT: u16 = 22;

    pub fn new(host: &str, port: u16) -> Self {
        Endpoint {
            host: host.to_string(),
            port,
        }
    }

    /// # Examples
    ///
    /// ```
    /// use home_hub_rs::Endpoint;
    ///
    /// assert_eq!(Endpoint::bulb("10.0.0.7").address(), "10.0.0.7:5577");
    /// ```
    pub fn bulb(host: &str) -> Self {
        Self::new(host, Self::BULB_PORT)
    }

    pub fn ssh(host: &str) -> Self {
        Self::new(host, Self::SSH_PORT)
    }

    /// `host:port`, bracketing IPv6 literals.
    pub fn address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address())
    }
}

pub(crate) fn default_bulb_port() -> u16 {
    Endpoint::BULB_PORT
}

pub(crate) fn default_ssh_port() -> u16 {
    Endpoint::SSH_PORT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv6_address() {
        assert_eq!(Endpoint::ssh("::1").address(), "[::1]:22");
    }
}
