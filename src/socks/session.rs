//! Per-connection SOCKS5 state machine
//!
//! A [`ClientSession`] owns one client connection from the first handshake
//! byte until teardown. Parsing is incremental over a single buffer, so the
//! client may deliver its messages in any fragmentation. While a resolve or
//! connect is outstanding the session keeps watching the client: extra bytes
//! are buffered for the relay and an EOF drops the pending operation, so a
//! late result is never written to a closed connection.

use super::codec::{encode_reply, BoundAddr, Handshake, Request};
use super::consts::*;
use super::relay::{relay, RelayEnd};
use super::types::{AddressSpec, SocksCommand};
use crate::error::{ProxyError, Socks5Error, Socks5ReplyCode};
use crate::resolver::Resolver;
use crate::transport::{BindListener, OutgoingConnector, StreamDyn};
use bytes::BytesMut;
use std::fmt;
use std::future::Future;
use std::io;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

/// Capabilities shared by every session of a listener
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Hostname resolution
    pub resolver: Arc<dyn Resolver>,
    /// Outgoing TCP connections
    pub connector: Arc<dyn OutgoingConnector>,
    /// BIND support; `None` rejects the command
    pub binder: Option<Arc<dyn BindListener>>,
    /// How long a BIND waits for its peer
    pub bind_timeout: Duration,
}

impl SessionContext {
    /// Create a context without BIND support
    pub fn new(resolver: Arc<dyn Resolver>, connector: Arc<dyn OutgoingConnector>) -> Self {
        SessionContext {
            resolver,
            connector,
            binder: None,
            bind_timeout: Duration::from_secs(60),
        }
    }

    /// Enable BIND through `binder`
    pub fn with_bind(mut self, binder: Arc<dyn BindListener>, timeout: Duration) -> Self {
        self.binder = Some(binder);
        self.bind_timeout = timeout;
        self
    }
}

/// Protocol state of a session; only ever moves forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    /// Waiting for `VER NMETHODS METHODS`
    AwaitingHandshake,
    /// Waiting for the command request
    AwaitingRequest,
    /// A hostname lookup is outstanding
    ResolvingName,
    /// An outgoing connection (or BIND peer) is outstanding
    Connecting,
    /// Bytes are being relayed
    Relaying,
    /// Terminal
    Closed,
}

/// How a session ended without error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The client disconnected before a reply was due
    PeerClosed,
    /// A RESOLVE request was answered
    Resolved {
        /// Name that was looked up
        host: String,
        /// Address it resolved to
        ip: Ipv4Addr,
    },
    /// A CONNECT was relayed until one side closed
    Relayed {
        /// Outgoing connection target
        target: SocketAddrV4,
        /// Side that ended the relay
        end: RelayEnd,
    },
    /// A BIND peer was relayed until one side closed
    Bound {
        /// Address of the inbound peer
        peer: SocketAddrV4,
        /// Side that ended the relay
        end: RelayEnd,
    },
}

impl fmt::Display for SessionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionOutcome::PeerClosed => write!(f, "client closed"),
            SessionOutcome::Resolved { host, ip } => write!(f, "resolved {} to {}", host, ip),
            SessionOutcome::Relayed { target, end } => write!(f, "relay to {}: {}", target, end),
            SessionOutcome::Bound { peer, end } => write!(f, "bind from {}: {}", peer, end),
        }
    }
}

/// One client connection
pub struct ClientSession<S> {
    stream: S,
    local_addr: SocketAddrV4,
    buffer: BytesMut,
    state: SessionState,
    ctx: Arc<SessionContext>,
}

impl<S> ClientSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Create a session for `stream`
    ///
    /// `local_addr` is the proxy's own end of the client connection; it is
    /// what CONNECT replies report as BND.ADDR/BND.PORT.
    pub fn new(stream: S, local_addr: SocketAddrV4, ctx: Arc<SessionContext>) -> Self {
        ClientSession {
            stream,
            local_addr,
            buffer: BytesMut::with_capacity(512),
            state: SessionState::AwaitingHandshake,
            ctx,
        }
    }

    /// Current protocol state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drive the session to completion
    ///
    /// The client connection and any outgoing connection are closed before
    /// this returns, whatever the result.
    pub async fn run(mut self) -> Result<SessionOutcome, ProxyError> {
        let result = self.drive().await;
        self.close().await;
        result
    }

    async fn drive(&mut self) -> Result<SessionOutcome, ProxyError> {
        let handshake = loop {
            if let Some(handshake) = Handshake::parse(&mut self.buffer)? {
                break handshake;
            }
            if !self.fill().await? {
                return Ok(SessionOutcome::PeerClosed);
            }
        };

        trace!("Client offered methods {:?}", handshake.methods);
        self.stream
            .write_all(&[SOCKS5_VERSION, SOCKS5_AUTH_METHOD_NONE])
            .await?;
        self.stream.flush().await?;
        self.transition(SessionState::AwaitingRequest);

        let request = loop {
            match Request::parse(&mut self.buffer) {
                Ok(Some(request)) => break request,
                Ok(None) => {
                    if !self.fill().await? {
                        return Ok(SessionOutcome::PeerClosed);
                    }
                }
                Err(e @ Socks5Error::UnsupportedVersion(_)) => return Err(e.into()),
                Err(e) => {
                    self.send_failure(Socks5ReplyCode::from(&e), BoundAddr::unspecified())
                        .await;
                    return Err(e.into());
                }
            }
        };

        debug!("SOCKS5 {} request to {}", request.command, request.address);

        match request.command {
            SocksCommand::Connect => self.handle_connect(request.address).await,
            SocksCommand::Resolve => self.handle_resolve(request.address).await,
            SocksCommand::Bind => self.handle_bind(request.address).await,
        }
    }

    async fn handle_connect(&mut self, address: AddressSpec) -> Result<SessionOutcome, ProxyError> {
        let ctx = Arc::clone(&self.ctx);

        let target = match address {
            AddressSpec::Ipv4(addr) => addr,
            AddressSpec::Domain(host, port) => {
                self.transition(SessionState::ResolvingName);
                match self.pending(ctx.resolver.resolve(&host)).await? {
                    None => return Ok(SessionOutcome::PeerClosed),
                    Some(Ok(ip)) => SocketAddrV4::new(ip, port),
                    Some(Err(e)) => {
                        self.send_failure(Socks5ReplyCode::HostUnreachable, BoundAddr::unspecified())
                            .await;
                        return Err(e.into());
                    }
                }
            }
        };

        self.transition(SessionState::Connecting);
        let outgoing = match self.pending(ctx.connector.connect(target)).await? {
            None => return Ok(SessionOutcome::PeerClosed),
            Some(Ok(stream)) => stream,
            Some(Err(source)) => {
                self.send_failure(Socks5ReplyCode::from(&source), BoundAddr::unspecified())
                    .await;
                return Err(ProxyError::Connect {
                    addr: target,
                    source,
                });
            }
        };

        self.send_reply(Socks5ReplyCode::Succeeded, BoundAddr::Socket(self.local_addr))
            .await?;
        debug!("SOCKS5 tunnel established to {}", target);

        let end = self.relay(outgoing).await?;
        Ok(SessionOutcome::Relayed { target, end })
    }

    async fn handle_resolve(&mut self, address: AddressSpec) -> Result<SessionOutcome, ProxyError> {
        let host = match address {
            AddressSpec::Domain(host, _) => host,
            AddressSpec::Ipv4(_) => {
                self.send_failure(
                    Socks5ReplyCode::AddressTypeNotSupported,
                    BoundAddr::unspecified(),
                )
                .await;
                return Err(Socks5Error::AddressTypeNotSupported(SOCKS5_ADDR_TYPE_IPV4).into());
            }
        };

        let ctx = Arc::clone(&self.ctx);
        self.transition(SessionState::ResolvingName);

        match self.pending(ctx.resolver.resolve(&host)).await? {
            None => Ok(SessionOutcome::PeerClosed),
            Some(Ok(ip)) => {
                self.send_reply(Socks5ReplyCode::Succeeded, BoundAddr::Ip(ip))
                    .await?;
                Ok(SessionOutcome::Resolved { host, ip })
            }
            Some(Err(e)) => {
                self.send_failure(Socks5ReplyCode::HostUnreachable, BoundAddr::None)
                    .await;
                Err(e.into())
            }
        }
    }

    async fn handle_bind(&mut self, address: AddressSpec) -> Result<SessionOutcome, ProxyError> {
        let ctx = Arc::clone(&self.ctx);
        let binder = match &ctx.binder {
            Some(binder) => binder,
            None => {
                self.send_failure(
                    Socks5ReplyCode::CommandNotSupported,
                    BoundAddr::unspecified(),
                )
                .await;
                return Err(Socks5Error::CommandNotSupported(SOCKS5_CMD_TCP_BIND).into());
            }
        };

        self.transition(SessionState::Connecting);
        let pending_bind = match binder.listen(*self.local_addr.ip()).await {
            Ok(pending_bind) => pending_bind,
            Err(e) => {
                self.send_failure(Socks5ReplyCode::from(&e), BoundAddr::unspecified())
                    .await;
                return Err(e.into());
            }
        };

        let bound = pending_bind.local_addr()?;
        self.send_reply(Socks5ReplyCode::Succeeded, BoundAddr::Socket(bound))
            .await?;
        debug!("BIND waiting on {} for {}", bound, address);

        let accept = tokio::time::timeout(ctx.bind_timeout, pending_bind.accept());
        let (inbound, peer) = match self.pending(accept).await? {
            None => return Ok(SessionOutcome::PeerClosed),
            Some(Ok(Ok(accepted))) => accepted,
            Some(Ok(Err(e))) => {
                self.send_failure(Socks5ReplyCode::from(&e), BoundAddr::unspecified())
                    .await;
                return Err(e.into());
            }
            Some(Err(_)) => {
                self.send_failure(Socks5ReplyCode::HostUnreachable, BoundAddr::unspecified())
                    .await;
                return Err(ProxyError::Timeout(format!("no BIND peer on {}", bound)));
            }
        };

        if let AddressSpec::Ipv4(expected) = address {
            if !expected.ip().is_unspecified() && expected.ip() != peer.ip() {
                self.send_failure(
                    Socks5ReplyCode::ConnectionNotAllowed,
                    BoundAddr::unspecified(),
                )
                .await;
                return Err(ProxyError::Connect {
                    addr: peer,
                    source: io::Error::new(
                        io::ErrorKind::PermissionDenied,
                        format!("BIND peer {} does not match {}", peer.ip(), expected.ip()),
                    ),
                });
            }
        }

        self.send_reply(Socks5ReplyCode::Succeeded, BoundAddr::Socket(peer))
            .await?;

        let end = self.relay(inbound).await?;
        Ok(SessionOutcome::Bound { peer, end })
    }

    /// Forward buffered client bytes, then relay until either side closes
    async fn relay(&mut self, mut outgoing: Box<dyn StreamDyn>) -> io::Result<RelayEnd> {
        self.transition(SessionState::Relaying);

        if !self.buffer.is_empty() {
            let early = self.buffer.split();
            if let Err(e) = outgoing.write_all(&early).await {
                debug!("Failed to forward {} early bytes: {}", early.len(), e);
                return Ok(RelayEnd::TargetClosed(0));
            }
        }

        Ok(relay(&mut self.stream, outgoing).await)
    }

    /// Wait for `op` while watching the client connection
    ///
    /// Returns `None` when the client closes first; `op` is dropped, which
    /// cancels it. A client that sends more than [`MAX_EARLY_DATA`] before
    /// the reply fails the session the same way.
    async fn pending<F, T>(&mut self, op: F) -> io::Result<Option<T>>
    where
        F: Future<Output = T>,
    {
        tokio::pin!(op);

        loop {
            if self.buffer.len() >= MAX_EARLY_DATA {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("more than {} bytes sent before the reply", MAX_EARLY_DATA),
                ));
            }

            tokio::select! {
                biased;
                out = &mut op => return Ok(Some(out)),
                read = self.stream.read_buf(&mut self.buffer) => {
                    if read? == 0 {
                        debug!("Client closed during {:?}", self.state);
                        return Ok(None);
                    }
                }
            }
        }
    }

    /// Read more client bytes; `false` on EOF
    async fn fill(&mut self) -> io::Result<bool> {
        Ok(self.stream.read_buf(&mut self.buffer).await? > 0)
    }

    async fn send_reply(&mut self, code: Socks5ReplyCode, bound: BoundAddr) -> io::Result<()> {
        let reply = encode_reply(code, bound);
        self.stream.write_all(&reply).await?;
        self.stream.flush().await
    }

    /// Best-effort failure reply; the session is ending either way
    async fn send_failure(&mut self, code: Socks5ReplyCode, bound: BoundAddr) {
        if let Err(e) = self.send_reply(code, bound).await {
            debug!("Failed to send {:?} reply: {}", code, e);
        }
    }

    fn transition(&mut self, next: SessionState) {
        debug_assert!(next > self.state, "{:?} -> {:?}", self.state, next);
        trace!("{:?} -> {:?}", self.state, next);
        self.state = next;
    }

    async fn close(&mut self) {
        self.state = SessionState::Closed;
        let _ = self.stream.shutdown().await;
    }
}
