//! TCP listener for the BIND command

use super::{to_ipv4_socket_addr, BindListener, PendingBind, StreamDyn};
use async_trait::async_trait;
use std::io;
use std::net::{Ipv4Addr, SocketAddrV4};
use tokio::net::TcpListener;
use tracing::debug;

/// Binds an ephemeral TCP port per BIND request
#[derive(Debug, Clone, Default)]
pub struct TcpBindListener;

#[async_trait]
impl BindListener for TcpBindListener {
    async fn listen(&self, ip: Ipv4Addr) -> io::Result<Box<dyn PendingBind>> {
        let listener = TcpListener::bind(SocketAddrV4::new(ip, 0)).await?;
        debug!("BIND listening on {}", listener.local_addr()?);
        Ok(Box::new(PendingTcpBind { listener }))
    }
}

struct PendingTcpBind {
    listener: TcpListener,
}

#[async_trait]
impl PendingBind for PendingTcpBind {
    fn local_addr(&self) -> io::Result<SocketAddrV4> {
        self.listener.local_addr().map(to_ipv4_socket_addr)
    }

    async fn accept(self: Box<Self>) -> io::Result<(Box<dyn StreamDyn>, SocketAddrV4)> {
        let (stream, peer) = self.listener.accept().await?;
        Ok((Box::new(stream), to_ipv4_socket_addr(peer)))
    }
}
