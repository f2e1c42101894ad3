//! SOCKS5 protocol module for Telesocks
//!
//! This module implements the server side of SOCKS5 with no authentication,
//! the CONNECT and BIND commands, and the RESOLVE (0xF0) extension that
//! answers a hostname lookup without opening a connection.

mod codec;
mod consts;
mod relay;
mod session;
mod types;

pub use codec::{decode_address, encode_reply, BoundAddr, Handshake, Request};
pub use consts::*;
pub use relay::{relay, RelayEnd};
pub use session::{ClientSession, SessionContext, SessionOutcome, SessionState};
pub use types::{AddressSpec, SocksCommand};
