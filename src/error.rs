//! Error types for Telesocks
//!
//! This module defines all custom error types used throughout the proxy.

use std::io;
use std::net::SocketAddrV4;
use thiserror::Error;

/// Session-level error for a single proxied connection
#[derive(Error, Debug)]
pub enum ProxyError {
    /// IO error on the client connection
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// SOCKS5 protocol error
    #[error("SOCKS5 error: {0}")]
    Protocol(#[from] Socks5Error),

    /// Hostname resolution failed
    #[error("Resolution failed: {0}")]
    Resolution(#[from] ResolveError),

    /// Outgoing connection could not be established
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        /// Target the connection was attempted to
        addr: SocketAddrV4,
        /// Underlying IO error
        source: io::Error,
    },

    /// Timeout error
    #[error("Timeout: {0}")]
    Timeout(String),
}

impl ProxyError {
    /// Whether this failure should be reported as a warning at the session boundary
    pub fn is_upstream_failure(&self) -> bool {
        matches!(
            self,
            ProxyError::Resolution(_) | ProxyError::Connect { .. } | ProxyError::Timeout(_)
        )
    }
}

/// SOCKS5 specific errors
#[derive(Error, Debug)]
pub enum Socks5Error {
    /// Unsupported SOCKS version
    #[error("Unsupported SOCKS version: {0}")]
    UnsupportedVersion(u8),

    /// Command not supported
    #[error("Command not supported: {0}")]
    CommandNotSupported(u8),

    /// Address type not supported
    #[error("Address type not supported: {0}")]
    AddressTypeNotSupported(u8),

    /// Invalid domain name
    #[error("Invalid domain name: {0}")]
    InvalidDomain(String),

    /// Not enough bytes for the declared address length
    #[error("Malformed address: need {needed} bytes, have {available}")]
    MalformedAddress {
        /// Bytes required by the declared address type
        needed: usize,
        /// Bytes currently buffered
        available: usize,
    },
}

/// Hostname resolution errors
#[derive(Error, Debug)]
pub enum ResolveError {
    /// Name has no record
    #[error("couldn't find {0}")]
    NotFound(String),

    /// Name resolved, but only to non-IPv4 addresses
    #[error("no IPv4 address for {0}")]
    NoIpv4(String),

    /// Lookup did not finish in time
    #[error("lookup of {0} timed out")]
    Timeout(String),

    /// System resolver failure
    #[error("lookup of {host} failed: {source}")]
    Io {
        /// Name being resolved
        host: String,
        /// Underlying IO error
        source: io::Error,
    },
}

/// Reply codes for SOCKS5 protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Socks5ReplyCode {
    /// Command succeeded
    Succeeded = 0x00,
    /// General SOCKS server failure
    GeneralFailure = 0x01,
    /// Connection not allowed by ruleset
    ConnectionNotAllowed = 0x02,
    /// Network unreachable
    NetworkUnreachable = 0x03,
    /// Host unreachable
    HostUnreachable = 0x04,
    /// Connection refused
    ConnectionRefused = 0x05,
    /// TTL expired
    TtlExpired = 0x06,
    /// Command not supported
    CommandNotSupported = 0x07,
    /// Address type not supported
    AddressTypeNotSupported = 0x08,
}

impl From<Socks5ReplyCode> for u8 {
    fn from(code: Socks5ReplyCode) -> Self {
        code as u8
    }
}

impl From<&io::Error> for Socks5ReplyCode {
    fn from(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => Socks5ReplyCode::ConnectionRefused,
            io::ErrorKind::TimedOut => Socks5ReplyCode::HostUnreachable,
            io::ErrorKind::AddrNotAvailable => Socks5ReplyCode::HostUnreachable,
            io::ErrorKind::PermissionDenied => Socks5ReplyCode::ConnectionNotAllowed,
            _ => Socks5ReplyCode::GeneralFailure,
        }
    }
}

impl From<&Socks5Error> for Socks5ReplyCode {
    fn from(err: &Socks5Error) -> Self {
        match err {
            Socks5Error::CommandNotSupported(_) => Socks5ReplyCode::CommandNotSupported,
            Socks5Error::AddressTypeNotSupported(_) => Socks5ReplyCode::AddressTypeNotSupported,
            _ => Socks5ReplyCode::GeneralFailure,
        }
    }
}
