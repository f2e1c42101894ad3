//! SOCKS5 wire codec
//!
//! Pure encode/decode functions over byte buffers. Nothing here performs IO,
//! so a session can feed bytes in whatever chunks the transport delivers them
//! and retry parsing until a complete structure is buffered.
//!
//! # SOCKS5 Request Format
//!
//! ```text
//! +----+-----+-------+------+----------+----------+
//! |VER | CMD |  RSV  | ATYP | DST.ADDR | DST.PORT |
//! +----+-----+-------+------+----------+----------+
//! | 1  |  1  | X'00' |  1   | Variable |    2     |
//! +----+-----+-------+------+----------+----------+
//! ```
//!
//! # SOCKS5 Reply Format
//!
//! ```text
//! +----+-----+-------+------+----------+----------+
//! |VER | REP |  RSV  | ATYP | BND.ADDR | BND.PORT |
//! +----+-----+-------+------+----------+----------+
//! | 1  |  1  | X'00' |  1   | Variable |    2     |
//! +----+-----+-------+------+----------+----------+
//! ```

use super::consts::*;
use super::types::{AddressSpec, SocksCommand};
use crate::error::{Socks5Error, Socks5ReplyCode};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::net::{Ipv4Addr, SocketAddrV4};

/// Decode `DST.ADDR DST.PORT` for the given address type
///
/// Returns the address and the number of bytes it occupied. A
/// [`Socks5Error::MalformedAddress`] only means the buffer ends before the
/// declared length; callers reading from a stream should wait for more input.
pub fn decode_address(buf: &[u8], atyp: u8) -> Result<(AddressSpec, usize), Socks5Error> {
    match atyp {
        SOCKS5_ADDR_TYPE_IPV4 => {
            let needed = 4 + 2;
            ensure_len(buf, needed)?;
            let ip = Ipv4Addr::new(buf[0], buf[1], buf[2], buf[3]);
            let port = u16::from_be_bytes([buf[4], buf[5]]);
            Ok((AddressSpec::ipv4(ip, port), needed))
        }

        SOCKS5_ADDR_TYPE_DOMAIN => {
            ensure_len(buf, 1)?;
            let domain_len = buf[0] as usize;
            if domain_len == 0 {
                return Err(Socks5Error::InvalidDomain(String::new()));
            }

            let needed = 1 + domain_len + 2;
            ensure_len(buf, needed)?;

            let name = &buf[1..1 + domain_len];
            if !name.is_ascii() {
                return Err(Socks5Error::InvalidDomain(
                    String::from_utf8_lossy(name).into_owned(),
                ));
            }
            // ASCII is valid UTF-8
            let domain = String::from_utf8_lossy(name).into_owned();
            let port = u16::from_be_bytes([buf[1 + domain_len], buf[2 + domain_len]]);

            Ok((AddressSpec::Domain(domain, port), needed))
        }

        _ => Err(Socks5Error::AddressTypeNotSupported(atyp)),
    }
}

fn ensure_len(buf: &[u8], needed: usize) -> Result<(), Socks5Error> {
    if buf.len() < needed {
        return Err(Socks5Error::MalformedAddress {
            needed,
            available: buf.len(),
        });
    }
    Ok(())
}

/// Address carried in a server reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundAddr {
    /// `ATYP=0` with no address or port (RESOLVE failure)
    None,
    /// Bare IPv4 address without a port (RESOLVE success)
    Ip(Ipv4Addr),
    /// IPv4 address and port
    Socket(SocketAddrV4),
}

impl BoundAddr {
    /// `0.0.0.0:0`, used by failure replies
    pub fn unspecified() -> Self {
        BoundAddr::Socket(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0))
    }

    /// ATYP byte for this address
    pub fn addr_type(&self) -> u8 {
        match self {
            BoundAddr::None => SOCKS5_ADDR_TYPE_NONE,
            BoundAddr::Ip(_) | BoundAddr::Socket(_) => SOCKS5_ADDR_TYPE_IPV4,
        }
    }
}

/// Build a reply: `VER REP RSV ATYP` followed by the bound address
pub fn encode_reply(code: Socks5ReplyCode, bound: BoundAddr) -> Bytes {
    let mut reply = BytesMut::with_capacity(10);
    reply.put_slice(&[SOCKS5_VERSION, code.into(), SOCKS5_RESERVED, bound.addr_type()]);

    match bound {
        BoundAddr::None => {}
        BoundAddr::Ip(ip) => reply.put_slice(&ip.octets()),
        BoundAddr::Socket(addr) => {
            reply.put_slice(&addr.ip().octets());
            reply.put_u16(addr.port());
        }
    }

    reply.freeze()
}

/// Client method selection message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    /// Authentication methods the client advertised
    pub methods: Vec<u8>,
}

impl Handshake {
    /// Parse `VER NMETHODS METHODS` from the front of `buf`
    ///
    /// Consumes the message and returns it once complete; returns `Ok(None)`
    /// and leaves `buf` untouched while bytes are still missing.
    pub fn parse(buf: &mut BytesMut) -> Result<Option<Self>, Socks5Error> {
        if buf.is_empty() {
            return Ok(None);
        }
        if buf[0] != SOCKS5_VERSION {
            return Err(Socks5Error::UnsupportedVersion(buf[0]));
        }
        if buf.len() < 2 {
            return Ok(None);
        }

        let num_methods = buf[1] as usize;
        if buf.len() < 2 + num_methods {
            return Ok(None);
        }

        buf.advance(2);
        let methods = buf.split_to(num_methods).to_vec();
        Ok(Some(Handshake { methods }))
    }
}

/// Client command request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Requested command
    pub command: SocksCommand,
    /// Destination address
    pub address: AddressSpec,
}

impl Request {
    /// Parse `VER CMD RSV ATYP DST.ADDR DST.PORT` from the front of `buf`
    ///
    /// Invalid version, command or address type bytes fail as soon as they
    /// are buffered, without waiting for the rest of the request.
    pub fn parse(buf: &mut BytesMut) -> Result<Option<Self>, Socks5Error> {
        if buf.is_empty() {
            return Ok(None);
        }
        if buf[0] != SOCKS5_VERSION {
            return Err(Socks5Error::UnsupportedVersion(buf[0]));
        }
        if buf.len() < 2 {
            return Ok(None);
        }

        let command =
            SocksCommand::from_byte(buf[1]).ok_or(Socks5Error::CommandNotSupported(buf[1]))?;
        if buf.len() < REQUEST_HEADER_LEN {
            return Ok(None);
        }

        let addr_type = buf[3];
        let (address, used) = match decode_address(&buf[REQUEST_HEADER_LEN..], addr_type) {
            Ok(decoded) => decoded,
            Err(Socks5Error::MalformedAddress { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        buf.advance(REQUEST_HEADER_LEN + used);
        Ok(Some(Request { command, address }))
    }

    /// Serialize the request, as a client would send it
    pub fn to_bytes(&self) -> Result<Vec<u8>, Socks5Error> {
        let mut bytes = vec![SOCKS5_VERSION, self.command.to_byte(), SOCKS5_RESERVED];
        bytes.extend_from_slice(&self.address.to_bytes()?);
        Ok(bytes)
    }
}
