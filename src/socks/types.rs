//! SOCKS5 type definitions
//!
//! Defines the core types used in SOCKS5 protocol handling.

use super::consts::*;
use crate::error::Socks5Error;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};

/// SOCKS5 command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocksCommand {
    /// TCP CONNECT - establish a TCP connection to target
    Connect,
    /// TCP BIND - wait for one incoming connection
    Bind,
    /// Tor RESOLVE - resolve a name and close
    Resolve,
}

impl SocksCommand {
    /// Parse a command byte into SocksCommand
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            SOCKS5_CMD_TCP_CONNECT => Some(SocksCommand::Connect),
            SOCKS5_CMD_TCP_BIND => Some(SocksCommand::Bind),
            SOCKS5_CMD_RESOLVE => Some(SocksCommand::Resolve),
            _ => None,
        }
    }

    /// Convert SocksCommand to byte
    pub fn to_byte(self) -> u8 {
        match self {
            SocksCommand::Connect => SOCKS5_CMD_TCP_CONNECT,
            SocksCommand::Bind => SOCKS5_CMD_TCP_BIND,
            SocksCommand::Resolve => SOCKS5_CMD_RESOLVE,
        }
    }
}

impl fmt::Display for SocksCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocksCommand::Connect => write!(f, "CONNECT"),
            SocksCommand::Bind => write!(f, "BIND"),
            SocksCommand::Resolve => write!(f, "RESOLVE"),
        }
    }
}

/// Destination of a SOCKS5 request
///
/// Only IPv4 literals and domain names are accepted on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressSpec {
    /// IPv4 address with port
    Ipv4(SocketAddrV4),
    /// Domain name with port
    Domain(String, u16),
}

impl AddressSpec {
    /// Create a new AddressSpec from an IPv4 address and port
    pub fn ipv4(ip: Ipv4Addr, port: u16) -> Self {
        AddressSpec::Ipv4(SocketAddrV4::new(ip, port))
    }

    /// Create a new AddressSpec from a domain name and port
    pub fn domain(domain: impl Into<String>, port: u16) -> Self {
        AddressSpec::Domain(domain.into(), port)
    }

    /// Get the port number
    pub fn port(&self) -> u16 {
        match self {
            AddressSpec::Ipv4(addr) => addr.port(),
            AddressSpec::Domain(_, port) => *port,
        }
    }

    /// Get the address type byte for SOCKS5 protocol
    pub fn addr_type(&self) -> u8 {
        match self {
            AddressSpec::Ipv4(_) => SOCKS5_ADDR_TYPE_IPV4,
            AddressSpec::Domain(_, _) => SOCKS5_ADDR_TYPE_DOMAIN,
        }
    }

    /// Serialize as `ATYP DST.ADDR DST.PORT`
    ///
    /// Fails for domain names that do not fit the one-byte length prefix.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Socks5Error> {
        let mut bytes = Vec::new();

        match self {
            AddressSpec::Ipv4(addr) => {
                bytes.push(SOCKS5_ADDR_TYPE_IPV4);
                bytes.extend_from_slice(&addr.ip().octets());
                bytes.extend_from_slice(&addr.port().to_be_bytes());
            }
            AddressSpec::Domain(domain, port) => {
                if domain.is_empty() || domain.len() > MAX_DOMAIN_LEN {
                    return Err(Socks5Error::InvalidDomain(domain.clone()));
                }
                bytes.push(SOCKS5_ADDR_TYPE_DOMAIN);
                bytes.push(domain.len() as u8);
                bytes.extend_from_slice(domain.as_bytes());
                bytes.extend_from_slice(&port.to_be_bytes());
            }
        }

        Ok(bytes)
    }
}

impl fmt::Display for AddressSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressSpec::Ipv4(addr) => write!(f, "{}", addr),
            AddressSpec::Domain(domain, port) => write!(f, "{}:{}", domain, port),
        }
    }
}

impl From<SocketAddrV4> for AddressSpec {
    fn from(addr: SocketAddrV4) -> Self {
        AddressSpec::Ipv4(addr)
    }
}
