//! SOCKS5 listener
//!
//! Accepts client connections and runs one [`ClientSession`] per connection
//! in its own task. Sessions are independent: a failure in one is logged and
//! never reaches the accept loop.

use crate::config::{Config, ServerConfig};
use crate::error::ProxyError;
use crate::resolver::build_resolver;
use crate::socks::{ClientSession, SessionContext, SessionOutcome};
use crate::transport::{to_ipv4_socket_addr, SocketOpts, TcpBindListener, TcpConnector};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{debug, info, info_span, warn, Instrument};

/// Build the shared session context from configuration
pub fn build_context(config: &Config) -> Result<Arc<SessionContext>> {
    let resolver = build_resolver(&config.resolver).context("Failed to build resolver")?;
    let connector = Arc::new(TcpConnector::from_config(&config.server));

    let mut ctx = SessionContext::new(resolver, connector);
    if config.server.allow_bind {
        ctx = ctx.with_bind(Arc::new(TcpBindListener), config.server.bind_timeout());
    }

    Ok(Arc::new(ctx))
}

/// Accepts SOCKS5 clients on one TCP address
pub struct Listener {
    listener: TcpListener,
    ctx: Arc<SessionContext>,
    socket_opts: SocketOpts,
}

impl Listener {
    /// Bind to `config.bind_addr`
    pub async fn bind(config: &ServerConfig, ctx: Arc<SessionContext>) -> Result<Self> {
        let listener = TcpListener::bind(config.bind_addr.as_str())
            .await
            .with_context(|| format!("Failed to bind {}", config.bind_addr))?;

        Ok(Listener {
            listener,
            ctx,
            socket_opts: SocketOpts::from_tcp_config(&config.tcp),
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept clients until a shutdown signal arrives
    ///
    /// Sessions still running at shutdown are aborted.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<bool>) -> Result<()> {
        info!("Listening for SOCKS5 clients on {}", self.local_addr()?);

        let mut sessions = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping listener");
                    break;
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let ctx = Arc::clone(&self.ctx);
                            let opts = self.socket_opts.clone();
                            sessions.spawn(
                                serve_connection(stream, ctx, opts)
                                    .instrument(info_span!("session", %peer)),
                            );
                        }
                        Err(e) => {
                            // Usually fd exhaustion; give it a moment to clear
                            warn!("Failed to accept connection: {}", e);
                            tokio::time::sleep(Duration::from_millis(100)).await;
                        }
                    }
                }
                Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            warn!("Session task panicked: {}", e);
                        }
                    }
                }
            }
        }

        if !sessions.is_empty() {
            debug!("Aborting {} active sessions", sessions.len());
        }
        sessions.shutdown().await;

        info!("Listener stopped");
        Ok(())
    }
}

async fn serve_connection(stream: TcpStream, ctx: Arc<SessionContext>, opts: SocketOpts) {
    if let Err(e) = opts.apply(&stream) {
        warn!("Failed to set socket options: {}", e);
    }

    let local_addr = match stream.local_addr() {
        Ok(addr) => to_ipv4_socket_addr(addr),
        Err(e) => {
            warn!("Failed to get local address: {}", e);
            return;
        }
    };

    debug!("New SOCKS5 connection");
    log_result(ClientSession::new(stream, local_addr, ctx).run().await);
}

fn log_result(result: Result<SessionOutcome, ProxyError>) {
    match result {
        Ok(outcome) => debug!("Session finished: {}", outcome),
        Err(e) if e.is_upstream_failure() => warn!("{}", e),
        Err(e) => info!("Session error: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    /// Counts events at WARN or above
    struct WarnCounter(Arc<AtomicUsize>);

    impl<S: Subscriber> Layer<S> for WarnCounter {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() <= Level::WARN {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn test_config() -> Config {
        parse_config(
            r#"
[server]
bind_addr = "127.0.0.1:0"

[resolver]
type = "static"

[resolver.hosts]
"example.com" = "127.0.0.1"
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_build_context_without_bind() {
        let ctx = build_context(&test_config()).unwrap();
        assert!(ctx.binder.is_none());
    }

    #[test]
    fn test_build_context_with_bind() {
        let mut config = test_config();
        config.server.allow_bind = true;
        config.server.bind_timeout = 5;

        let ctx = build_context(&config).unwrap();
        assert!(ctx.binder.is_some());
        assert_eq!(ctx.bind_timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_bind_failure() {
        let first = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut config = test_config();
        config.server.bind_addr = first.local_addr().unwrap().to_string();

        let ctx = build_context(&config).unwrap();
        assert!(Listener::bind(&config.server, ctx).await.is_err());
    }

    #[tokio::test]
    async fn test_resolve_over_tcp_and_shutdown() {
        let config = test_config();
        let ctx = build_context(&config).unwrap();
        let listener = Listener::bind(&config.server, ctx).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(listener.run(shutdown_rx));

        let mut client = TcpStream::connect(addr).await.unwrap();
        let mut request = vec![5, 1, 0, 5, 0xF0, 0, 3, 11];
        request.extend_from_slice(b"example.com");
        request.extend_from_slice(&[0, 0]);
        client.write_all(&request).await.unwrap();

        let mut reply = Vec::new();
        client.read_to_end(&mut reply).await.unwrap();
        assert_eq!(reply, vec![5, 0, 5, 0, 0, 1, 127, 0, 0, 1]);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_aborts_sessions() {
        let config = test_config();
        let ctx = build_context(&config).unwrap();
        let listener = Listener::bind(&config.server, ctx).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(listener.run(shutdown_rx));

        // Session parked waiting for the rest of the handshake
        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(&[5]).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap().unwrap();

        let mut rest = Vec::new();
        let read = tokio::time::timeout(Duration::from_secs(1), client.read_to_end(&mut rest))
            .await
            .unwrap();
        assert!(read.is_err() || rest.is_empty());
    }

    /// Send one request through a listener and count the warnings it logs
    async fn serve_and_count_warnings(request: &[u8]) -> (Vec<u8>, usize) {
        let warnings = Arc::new(AtomicUsize::new(0));
        let subscriber =
            tracing_subscriber::registry().with(WarnCounter(Arc::clone(&warnings)));
        // Thread-local; the test runtime runs every task on this thread
        let _guard = tracing::subscriber::set_default(subscriber);

        let config = test_config();
        let ctx = build_context(&config).unwrap();
        let listener = Listener::bind(&config.server, ctx).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(listener.run(shutdown_rx));

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(&[5, 1, 0]).await.unwrap();
        client.write_all(request).await.unwrap();

        let mut reply = Vec::new();
        client.read_to_end(&mut reply).await.unwrap();

        for _ in 0..100 {
            if warnings.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap().unwrap();

        (reply, warnings.load(Ordering::SeqCst))
    }

    #[tokio::test]
    async fn test_resolve_failure_warns_once() {
        let mut request = vec![5, 0xF0, 0, 3, 7];
        request.extend_from_slice(b"unknown");
        request.extend_from_slice(&[0, 0]);

        let (reply, warnings) = serve_and_count_warnings(&request).await;
        assert_eq!(reply, vec![5, 0, 5, 4, 0, 0]);
        assert_eq!(warnings, 1);
    }

    #[tokio::test]
    async fn test_connect_resolution_failure_warns_once() {
        let mut request = vec![5, 1, 0, 3, 7];
        request.extend_from_slice(b"unknown");
        request.extend_from_slice(&80u16.to_be_bytes());

        let (reply, warnings) = serve_and_count_warnings(&request).await;
        assert_eq!(reply, vec![5, 0, 5, 4, 0, 1, 0, 0, 0, 0, 0, 0]);
        assert_eq!(warnings, 1);
    }

    #[tokio::test]
    async fn test_successful_resolve_does_not_warn() {
        let mut request = vec![5, 0xF0, 0, 3, 11];
        request.extend_from_slice(b"example.com");
        request.extend_from_slice(&[0, 0]);

        let (reply, warnings) = serve_and_count_warnings(&request).await;
        assert_eq!(reply, vec![5, 0, 5, 0, 0, 1, 127, 0, 0, 1]);
        assert_eq!(warnings, 0);
    }
}
