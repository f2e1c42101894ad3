//! # Telesocks - SOCKS5 proxy with hostname resolution
//!
//! Telesocks is a small SOCKS5 proxy server. Besides plain CONNECT it
//! understands the Tor-style RESOLVE command (0xF0), which asks the proxy to
//! look up a hostname and return its IPv4 address without opening a
//! connection. Clients can therefore keep DNS traffic on the proxy side.
//!
//! ## Features
//!
//! - **No authentication**: the server always selects method `0x00`
//! - **CONNECT** to IPv4 addresses or domain names, resolved by the proxy
//! - **RESOLVE (0xF0)**: hostname to IPv4 lookups over the SOCKS channel
//! - **Optional BIND**: one inbound peer per request, disabled by default
//! - **Pluggable resolution**: system resolver or a fixed host table
//!
//! ## Usage
//!
//! ```rust,ignore
//! use telesocks::config::load_config;
//! use telesocks::server::{build_context, Listener};
//! use tokio::sync::broadcast;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config("telesocks.toml")?;
//!     let ctx = build_context(&config)?;
//!     let listener = Listener::bind(&config.server, ctx).await?;
//!     let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
//!
//!     listener.run(shutdown_rx).await
//! }
//! ```
//!
//! ## Architecture
//!
//! Every accepted connection gets its own [`socks::ClientSession`]. The
//! session parses the handshake and request incrementally, asks a
//! [`resolver::Resolver`] for names and an
//! [`transport::OutgoingConnector`] for connections, then relays bytes
//! until either side closes.
//!
//! ```text
//! SOCKS5 Client -> Telesocks -> Target
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod resolver;
pub mod server;
pub mod socks;
pub mod transport;

// Re-export commonly used items
pub use config::{load_config, Config};
pub use error::{ProxyError, ResolveError, Socks5Error};
pub use server::{build_context, Listener};

/// Version of the Telesocks library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the application
pub const NAME: &str = env!("CARGO_PKG_NAME");
