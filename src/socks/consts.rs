//! SOCKS5 protocol constants
//!
//! Defines all constants used in the SOCKS5 protocol implementation,
//! including the Tor RESOLVE extension command.

/// SOCKS5 protocol version
pub const SOCKS5_VERSION: u8 = 0x05;

// Authentication methods
/// No authentication required
pub const SOCKS5_AUTH_METHOD_NONE: u8 = 0x00;
/// Username/password authentication (never selected)
pub const SOCKS5_AUTH_METHOD_PASSWORD: u8 = 0x02;

// Commands
/// TCP CONNECT command
pub const SOCKS5_CMD_TCP_CONNECT: u8 = 0x01;
/// TCP BIND command
pub const SOCKS5_CMD_TCP_BIND: u8 = 0x02;
/// UDP ASSOCIATE command (not supported)
pub const SOCKS5_CMD_UDP_ASSOCIATE: u8 = 0x03;
/// Tor RESOLVE extension: look up a name, reply, close
pub const SOCKS5_CMD_RESOLVE: u8 = 0xF0;

// Address types
/// No address, only used in RESOLVE failure replies
pub const SOCKS5_ADDR_TYPE_NONE: u8 = 0x00;
/// IPv4 address
pub const SOCKS5_ADDR_TYPE_IPV4: u8 = 0x01;
/// Domain name
pub const SOCKS5_ADDR_TYPE_DOMAIN: u8 = 0x03;
/// IPv6 address (not supported)
pub const SOCKS5_ADDR_TYPE_IPV6: u8 = 0x04;

// Reserved byte
/// Reserved byte value (always 0x00)
pub const SOCKS5_RESERVED: u8 = 0x00;

// Sizes
/// Maximum domain name length
pub const MAX_DOMAIN_LEN: usize = 255;
/// Length of VER CMD RSV ATYP
pub const REQUEST_HEADER_LEN: usize = 4;
/// Client bytes buffered while a resolve or connect is pending
pub const MAX_EARLY_DATA: usize = 64 * 1024;
