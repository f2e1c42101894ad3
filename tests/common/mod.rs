//! Test utilities for Telesocks integration tests
//!
//! Starts a real listener on loopback and provides helpers for speaking
//! SOCKS5 to it.

#![allow(dead_code)]

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use telesocks::config::Config;
use telesocks::resolver::StaticResolver;
use telesocks::server::Listener;
use telesocks::socks::SessionContext;
use telesocks::transport::TcpConnector;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Create a test TCP listener on an available port
pub async fn create_test_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Spawn a TCP server that echoes everything back
pub async fn spawn_echo_server() -> SocketAddr {
    let (listener, addr) = create_test_listener().await;

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut read, mut write) = stream.split();
                let _ = tokio::io::copy(&mut read, &mut write).await;
            });
        }
    });

    addr
}

/// A proxy running on loopback
pub struct TestProxy {
    /// Address SOCKS5 clients connect to
    pub addr: SocketAddr,
    shutdown_tx: broadcast::Sender<bool>,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl TestProxy {
    /// Start a proxy whose resolver only knows `hosts`
    pub async fn start(hosts: &[(&str, Ipv4Addr)]) -> Self {
        let resolver: StaticResolver = hosts.iter().map(|(name, ip)| (*name, *ip)).collect();
        let ctx = SessionContext::new(Arc::new(resolver), Arc::new(TcpConnector::with_defaults()));

        let mut config = Config::default();
        config.server.bind_addr = "127.0.0.1:0".to_string();

        let listener = Listener::bind(&config.server, Arc::new(ctx)).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(listener.run(shutdown_rx));

        TestProxy {
            addr,
            shutdown_tx,
            handle,
        }
    }

    /// Open a client connection and complete the method negotiation
    pub async fn connect(&self) -> TcpStream {
        let mut stream = TcpStream::connect(self.addr).await.unwrap();
        stream.write_all(&socks5_mock::handshake()).await.unwrap();

        let mut reply = [0u8; 2];
        stream.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply, [5, 0]);
        stream
    }

    /// Signal shutdown and wait for the listener to stop
    pub async fn stop(self) {
        self.shutdown_tx.send(true).unwrap();
        self.handle.await.unwrap().unwrap();
    }
}

/// Mock SOCKS5 client messages
pub mod socks5_mock {
    use telesocks::socks::*;

    /// Method selection offering only "no authentication"
    pub fn handshake() -> Vec<u8> {
        vec![SOCKS5_VERSION, 1, SOCKS5_AUTH_METHOD_NONE]
    }

    /// Create a connect command to IPv4 address
    pub fn create_connect_ipv4(ip: [u8; 4], port: u16) -> Vec<u8> {
        let mut cmd = vec![
            SOCKS5_VERSION,
            SOCKS5_CMD_TCP_CONNECT,
            SOCKS5_RESERVED,
            SOCKS5_ADDR_TYPE_IPV4,
        ];
        cmd.extend_from_slice(&ip);
        cmd.extend_from_slice(&port.to_be_bytes());
        cmd
    }

    /// Create a connect command to domain
    pub fn create_connect_domain(domain: &str, port: u16) -> Vec<u8> {
        with_domain(SOCKS5_CMD_TCP_CONNECT, domain, port)
    }

    /// Create a RESOLVE command for `domain`
    pub fn create_resolve(domain: &str) -> Vec<u8> {
        with_domain(SOCKS5_CMD_RESOLVE, domain, 0)
    }

    fn with_domain(command: u8, domain: &str, port: u16) -> Vec<u8> {
        let mut cmd = vec![
            SOCKS5_VERSION,
            command,
            SOCKS5_RESERVED,
            SOCKS5_ADDR_TYPE_DOMAIN,
            domain.len() as u8,
        ];
        cmd.extend_from_slice(domain.as_bytes());
        cmd.extend_from_slice(&port.to_be_bytes());
        cmd
    }
}
