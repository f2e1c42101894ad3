//! Bidirectional relay between the client and the outgoing connection
//!
//! Whichever side finishes first (EOF or error) ends the relay, and both
//! write halves are shut down before returning so neither peer is left
//! half-open.

use std::fmt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Which side ended the relay, with the bytes it had sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayEnd {
    /// The client closed or failed; bytes copied client -> target
    ClientClosed(u64),
    /// The target closed or failed; bytes copied target -> client
    TargetClosed(u64),
}

impl fmt::Display for RelayEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayEnd::ClientClosed(n) => write!(f, "client closed after sending {} bytes", n),
            RelayEnd::TargetClosed(n) => write!(f, "target closed after sending {} bytes", n),
        }
    }
}

/// Relay data bidirectionally between `client` and `target`
///
/// Returns when either direction encounters an error or EOF. A reset from
/// either peer is ordinary termination here, not an error.
pub async fn relay<A, B>(client: A, target: B) -> RelayEnd
where
    A: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let (mut client_read, mut client_write) = tokio::io::split(client);
    let (mut target_read, mut target_write) = tokio::io::split(target);

    let end = tokio::select! {
        result = tokio::io::copy(&mut client_read, &mut target_write) => {
            match result {
                Ok(bytes) => {
                    debug!("client->target finished: {} bytes", bytes);
                    RelayEnd::ClientClosed(bytes)
                }
                Err(e) => {
                    debug!("client->target error: {}", e);
                    RelayEnd::ClientClosed(0)
                }
            }
        }
        result = tokio::io::copy(&mut target_read, &mut client_write) => {
            match result {
                Ok(bytes) => {
                    debug!("target->client finished: {} bytes", bytes);
                    RelayEnd::TargetClosed(bytes)
                }
                Err(e) => {
                    debug!("target->client error: {}", e);
                    RelayEnd::TargetClosed(0)
                }
            }
        }
    };

    let _ = target_write.shutdown().await;
    let _ = client_write.shutdown().await;

    end
}
