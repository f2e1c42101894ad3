//! TCP outgoing connector
//!
//! Opens plain TCP connections to the targets of CONNECT requests.

use super::{OutgoingConnector, SocketOpts, StreamDyn};
use crate::config::ServerConfig;
use async_trait::async_trait;
use std::io;
use std::net::SocketAddrV4;
use std::time::Duration;
use tokio::net::TcpStream;

/// Connector for plain TCP targets
#[derive(Debug, Clone)]
pub struct TcpConnector {
    /// Socket options to apply to connections
    socket_opts: SocketOpts,
    /// Connection timeout
    connect_timeout: Duration,
}

impl TcpConnector {
    /// Create a new TCP connector with default options
    pub fn with_defaults() -> Self {
        TcpConnector {
            socket_opts: SocketOpts::default(),
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Create a connector from the server configuration
    pub fn from_config(config: &ServerConfig) -> Self {
        TcpConnector {
            socket_opts: SocketOpts::from_tcp_config(&config.tcp),
            connect_timeout: config.connect_timeout(),
        }
    }

    /// Set socket options
    pub fn with_socket_opts(mut self, opts: SocketOpts) -> Self {
        self.socket_opts = opts;
        self
    }

    /// Set connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Connect and return the concrete stream
    pub async fn connect_tcp(&self, addr: SocketAddrV4) -> io::Result<TcpStream> {
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("Connection timeout to {}", addr),
                )
            })??;

        if let Err(e) = self.socket_opts.apply(&stream) {
            tracing::warn!("Failed to apply socket options: {}", e);
        }

        tracing::debug!("TCP connection established to {}", addr);

        Ok(stream)
    }
}

#[async_trait]
impl OutgoingConnector for TcpConnector {
    async fn connect(&self, addr: SocketAddrV4) -> io::Result<Box<dyn StreamDyn>> {
        let stream = self.connect_tcp(addr).await?;
        Ok(Box::new(stream))
    }
}
