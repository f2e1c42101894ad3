//! Transport module for Telesocks
//!
//! This module provides the capabilities a session uses to reach the network:
//! opening outgoing connections and listening for a BIND peer. Both are
//! traits so tests can substitute in-memory streams.

mod bind;
mod tcp;

pub use bind::TcpBindListener;
pub use tcp::TcpConnector;

use crate::config::TcpConfig;
use async_trait::async_trait;
use std::fmt::Debug;
use std::io;
use std::net::{SocketAddr, SocketAddrV4};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// Socket options for configuring connections
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketOpts {
    /// Enable TCP_NODELAY
    pub nodelay: bool,
    /// TCP keepalive timeout
    pub keepalive_secs: Option<u64>,
    /// TCP keepalive interval
    pub keepalive_interval: Option<u64>,
}

impl Default for SocketOpts {
    fn default() -> Self {
        SocketOpts {
            nodelay: true,
            keepalive_secs: Some(20),
            keepalive_interval: Some(8),
        }
    }
}

impl SocketOpts {
    /// Create socket options from TCP config
    pub fn from_tcp_config(config: &TcpConfig) -> Self {
        SocketOpts {
            nodelay: config.nodelay,
            keepalive_secs: Some(config.keepalive_secs),
            keepalive_interval: Some(config.keepalive_interval),
        }
    }

    /// Apply socket options to a TCP stream
    pub fn apply(&self, stream: &TcpStream) -> io::Result<()> {
        stream.set_nodelay(self.nodelay)?;

        if let (Some(timeout), Some(interval)) = (self.keepalive_secs, self.keepalive_interval) {
            let socket = socket2::SockRef::from(stream);
            let keepalive = socket2::TcpKeepalive::new()
                .with_time(Duration::from_secs(timeout))
                .with_interval(Duration::from_secs(interval));
            socket.set_tcp_keepalive(&keepalive)?;
        }

        Ok(())
    }
}

/// Dynamic stream trait for boxed streams
pub trait StreamDyn: AsyncRead + AsyncWrite + Unpin + Send + Debug {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + Debug> StreamDyn for T {}

/// Opens the proxied connection to a resolved target
#[async_trait]
pub trait OutgoingConnector: Debug + Send + Sync {
    /// Connect to `addr`, failing with the transport's IO error
    async fn connect(&self, addr: SocketAddrV4) -> io::Result<Box<dyn StreamDyn>>;
}

/// Listens for the single inbound peer of a BIND request
#[async_trait]
pub trait BindListener: Debug + Send + Sync {
    /// Start listening on an ephemeral port of `ip`
    async fn listen(&self, ip: std::net::Ipv4Addr) -> io::Result<Box<dyn PendingBind>>;
}

/// A bound listener waiting for its one connection
#[async_trait]
pub trait PendingBind: Send {
    /// Address reported to the client in the first BIND reply
    fn local_addr(&self) -> io::Result<SocketAddrV4>;

    /// Accept the inbound peer, consuming the listener
    async fn accept(self: Box<Self>) -> io::Result<(Box<dyn StreamDyn>, SocketAddrV4)>;
}

/// Narrow a socket address to IPv4, unwrapping v4-mapped IPv6 addresses
///
/// Replies never carry IPv6, so anything else becomes `0.0.0.0` with the
/// original port.
pub fn to_ipv4_socket_addr(addr: SocketAddr) -> SocketAddrV4 {
    match addr {
        SocketAddr::V4(v4) => v4,
        SocketAddr::V6(v6) => SocketAddrV4::new(
            v6.ip()
                .to_ipv4_mapped()
                .unwrap_or(std::net::Ipv4Addr::UNSPECIFIED),
            v6.port(),
        ),
    }
}
