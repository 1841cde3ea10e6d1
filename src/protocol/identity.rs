//! Connection addressing.
//!
//! Capture delivers client and server traffic as two directional streams. Both
//! are keyed by the client endpoint, whose packed correlation key is the only
//! identity used to pair them and to order replay per session.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};

use serde::{Deserialize, Serialize};

/// Client endpoint of a captured session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionIdentity {
    pub address: u32,
    pub port: u16,
}

impl ConnectionIdentity {
    pub fn new(address: u32, port: u16) -> Self {
        Self { address, port }
    }

    /// Port in the high bits, address in the low 32 bits
    #[inline]
    pub fn correlation_key(&self) -> u64 {
        (u64::from(self.port) << 32) | u64::from(self.address)
    }

    /// Inverse of [`correlation_key`](Self::correlation_key)
    pub fn from_correlation_key(key: u64) -> Self {
        Self {
            address: (key & 0xFFFF_FFFF) as u32,
            port: ((key >> 32) & 0xFFFF) as u16,
        }
    }
}

impl From<SocketAddrV4> for ConnectionIdentity {
    fn from(addr: SocketAddrV4) -> Self {
        Self::new(u32::from(*addr.ip()), addr.port())
    }
}

impl From<ConnectionIdentity> for SocketAddrV4 {
    fn from(id: ConnectionIdentity) -> Self {
        SocketAddrV4::new(Ipv4Addr::from(id.address), id.port)
    }
}

impl fmt::Display for ConnectionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", SocketAddrV4::from(*self))
    }
}

/// Which side sent a packet, or whose turn it is to speak
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Origin {
    #[default]
    Undefined,
    Client,
    Server,
}

/// Direction of a captured byte stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    ClientToServer,
    ServerToClient,
}

impl Direction {
    /// Infer direction from a segment's ports and the captured server port
    pub fn from_ports(src_port: u16, dst_port: u16, server_port: u16) -> Option<Self> {
        if dst_port == server_port {
            Some(Direction::ClientToServer)
        } else if src_port == server_port {
            Some(Direction::ServerToClient)
        } else {
            None
        }
    }

    /// Side that produced bytes travelling in this direction
    pub fn origin(self) -> Origin {
        match self {
            Direction::ClientToServer => Origin::Client,
            Direction::ServerToClient => Origin::Server,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_key_packing() {
        let id = ConnectionIdentity::new(0xC0A8_0001, 0xABCD);
        assert_eq!(id.correlation_key(), 0x0000_ABCD_C0A8_0001);
        assert_eq!(ConnectionIdentity::from_correlation_key(id.correlation_key()), id);
    }

    #[test]
    fn test_distinct_ports_distinct_keys() {
        let a = ConnectionIdentity::new(0x7F00_0001, 50000);
        let b = ConnectionIdentity::new(0x7F00_0001, 50001);
        assert_ne!(a.correlation_key(), b.correlation_key());
    }

    #[test]
    fn test_socket_addr_conversion() {
        let addr = SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 7), 41234);
        let id = ConnectionIdentity::from(addr);
        assert_eq!(id.address, 0x0A00_0007);
        assert_eq!(id.to_string(), "10.0.0.7:41234");
    }

    #[test]
    fn test_direction_from_ports() {
        assert_eq!(
            Direction::from_ports(41234, 3306, 3306),
            Some(Direction::ClientToServer)
        );
        assert_eq!(
            Direction::from_ports(3306, 41234, 3306),
            Some(Direction::ServerToClient)
        );
        assert_eq!(Direction::from_ports(80, 443, 3306), None);
        assert_eq!(Direction::ServerToClient.origin(), Origin::Server);
    }
}
