//! Message framing: the command table, the 24-byte header and the
//! payload checksum.
//!
//! A Bitcoin message frame consists of:
//! - 4-byte magic value (network identifier)
//! - 12-byte command, ASCII padded with zero bytes
//! - 4-byte payload length, little-endian
//! - 4-byte checksum
//! - variable-length payload
//!
//! https://developer.bitcoin.org/reference/p2p_networking.html#message-headers

use std::fmt;

use sha2::{Digest, Sha256};

use crate::error::WireError;
use crate::wire::constants::{HEADER_LEN, MAX_PAYLOAD_LEN};

/// A Bitcoin P2P command, derived from the 12-byte header field by exact
/// match against the known-command table.
///
/// Commands outside the table map to [`Command::Unknown`], which keeps
/// the raw field bytes so callers can log or inspect them; an unknown
/// command is never a protocol error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Version,
    Verack,
    Ping,
    Pong,
    Addr,
    GetHeaders,
    Inv,
    GetData,
    Tx,
    Block,
    Unknown([u8; 12]),
}

impl From<&[u8; 12]> for Command {
    fn from(bytes: &[u8; 12]) -> Self {
        let name = std::str::from_utf8(bytes)
            .unwrap_or("")
            .trim_end_matches('\0');

        match name {
            "version" => Command::Version,
            "verack" => Command::Verack,
            "ping" => Command::Ping,
            "pong" => Command::Pong,
            "addr" => Command::Addr,
            "getheaders" => Command::GetHeaders,
            "inv" => Command::Inv,
            "getdata" => Command::GetData,
            "tx" => Command::Tx,
            "block" => Command::Block,
            _ => Command::Unknown(*bytes),
        }
    }
}

impl Command {
    /// Returns the 12-byte command field as transmitted on the wire.
    ///
    /// The command string is ASCII and padded with zero bytes.
    pub fn as_bytes(&self) -> [u8; 12] {
        let name: &[u8] = match self {
            Command::Version => b"version",
            Command::Verack => b"verack",
            Command::Ping => b"ping",
            Command::Pong => b"pong",
            Command::Addr => b"addr",
            Command::GetHeaders => b"getheaders",
            Command::Inv => b"inv",
            Command::GetData => b"getdata",
            Command::Tx => b"tx",
            Command::Block => b"block",
            Command::Unknown(raw) => return *raw,
        };

        let mut padded = [0u8; 12];
        padded[..name.len()].copy_from_slice(name);
        padded
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Unknown(raw) => {
                let name = String::from_utf8_lossy(raw);
                write!(f, "unknown({})", name.trim_end_matches('\0'))
            }
            other => {
                let bytes = other.as_bytes();
                let name = std::str::from_utf8(&bytes).unwrap_or("");
                f.write_str(name.trim_end_matches('\0'))
            }
        }
    }
}

/// The decoded 24-byte message header.
///
/// `payload_len` always equals the byte length of the associated payload
/// and `checksum` equals [`checksum`]`(payload)` for any frame this crate
/// produces; inbound frames are held to the same invariant by
/// [`FrameReader`](crate::wire::reader::FrameReader).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    pub magic: [u8; 4],
    pub command: Command,
    pub payload_len: u32,
    pub checksum: [u8; 4],
}

/// A complete inbound message: parsed header plus checksum-verified
/// payload bytes. Payload interpretation is left to the dispatcher.
#[derive(Debug)]
pub struct Frame {
    pub header: MessageHeader,
    pub payload: Vec<u8>,
}

/// Payload integrity tag: the first 4 bytes of SHA256(SHA256(payload)).
///
/// Used both to produce outbound checksums and to verify inbound ones.
/// This is an integrity check against corruption, not authentication.
pub fn checksum(payload: &[u8]) -> [u8; 4] {
    let digest = Sha256::digest(Sha256::digest(payload));
    let mut out = [0u8; 4];
    out.copy_from_slice(&digest[..4]);
    out
}

/// Builds a complete message frame: header (with computed length and
/// checksum) followed by the payload.
pub fn frame(command: Command, payload: &[u8], magic: [u8; 4]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());

    bytes.extend_from_slice(&magic);
    bytes.extend_from_slice(&command.as_bytes());
    bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&checksum(payload));
    bytes.extend_from_slice(payload);

    bytes
}

/// Parses the fixed 24-byte header. Does not touch the payload.
///
/// Rejects header-declared payload lengths beyond
/// [`MAX_PAYLOAD_LEN`] so a hostile length field never drives an
/// allocation.
pub fn unframe(header: &[u8; HEADER_LEN]) -> Result<MessageHeader, WireError> {
    let magic: [u8; 4] = header[0..4].try_into().unwrap();
    let cmd: [u8; 12] = header[4..16].try_into().unwrap();
    let payload_len = u32::from_le_bytes(header[16..20].try_into().unwrap());
    let checksum: [u8; 4] = header[20..24].try_into().unwrap();

    if payload_len > MAX_PAYLOAD_LEN {
        return Err(WireError::OversizedPayload(payload_len, MAX_PAYLOAD_LEN));
    }

    Ok(MessageHeader {
        magic,
        command: Command::from(&cmd),
        payload_len,
        checksum,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::constants::MAIN_NET_MAGIC;

    const KNOWN: [(&[u8], Command); 10] = [
        (b"version", Command::Version),
        (b"verack", Command::Verack),
        (b"ping", Command::Ping),
        (b"pong", Command::Pong),
        (b"addr", Command::Addr),
        (b"getheaders", Command::GetHeaders),
        (b"inv", Command::Inv),
        (b"getdata", Command::GetData),
        (b"tx", Command::Tx),
        (b"block", Command::Block),
    ];

    fn padded(name: &[u8]) -> [u8; 12] {
        let mut field = [0u8; 12];
        field[..name.len()].copy_from_slice(name);
        field
    }

    #[test]
    fn command_table_round_trips() {
        for (name, command) in KNOWN {
            assert_eq!(Command::from(&padded(name)), command);
            assert_eq!(command.as_bytes(), padded(name));
        }
    }

    #[test]
    fn unknown_command_keeps_raw_bytes() {
        let raw = padded(b"wtfmessage");
        assert_eq!(Command::from(&raw), Command::Unknown(raw));
        assert_eq!(Command::Unknown(raw).as_bytes(), raw);
    }

    #[test]
    fn command_name_must_match_exactly() {
        // a prefix of a known command is not that command
        let raw = padded(b"versionx");
        assert!(matches!(Command::from(&raw), Command::Unknown(_)));
    }

    #[test]
    fn checksum_is_deterministic_and_input_sensitive() {
        let a = checksum(b"hello");
        assert_eq!(a, checksum(b"hello"));
        assert_ne!(a, checksum(b"hellp"));
    }

    #[test]
    fn empty_payload_checksum_is_the_known_constant() {
        // double SHA-256 of the empty string, first 4 bytes — the
        // checksum carried by every verack frame on the network
        assert_eq!(checksum(&[]), [0x5D, 0xF6, 0xE0, 0xE2]);
    }

    #[test]
    fn frame_unframe_round_trip() {
        let payload = [0xDE, 0xAD, 0xBE, 0xEF];
        let bytes = frame(Command::Ping, &payload, MAIN_NET_MAGIC);

        assert_eq!(bytes.len(), HEADER_LEN + payload.len());

        let header = unframe(&bytes[..HEADER_LEN].try_into().unwrap()).unwrap();
        assert_eq!(header.magic, MAIN_NET_MAGIC);
        assert_eq!(header.command, Command::Ping);
        assert_eq!(header.payload_len, payload.len() as u32);
        assert_eq!(header.checksum, checksum(&payload));
        assert_eq!(&bytes[HEADER_LEN..], &payload);
    }

    #[test]
    fn frame_of_empty_payload_is_header_only() {
        let bytes = frame(Command::Verack, &[], MAIN_NET_MAGIC);
        assert_eq!(bytes.len(), HEADER_LEN);

        let header = unframe(&bytes[..].try_into().unwrap()).unwrap();
        assert_eq!(header.payload_len, 0);
        assert_eq!(header.checksum, [0x5D, 0xF6, 0xE0, 0xE2]);
    }

    #[test]
    fn unframe_rejects_oversized_declared_length() {
        let mut header = frame(Command::Block, &[], MAIN_NET_MAGIC);
        header[16..20].copy_from_slice(&(MAX_PAYLOAD_LEN + 1).to_le_bytes());

        assert!(matches!(
            unframe(&header[..HEADER_LEN].try_into().unwrap()),
            Err(WireError::OversizedPayload(_, MAX_PAYLOAD_LEN))
        ));
    }

    #[test]
    fn display_names_match_wire_names() {
        assert_eq!(Command::GetHeaders.to_string(), "getheaders");
        assert_eq!(
            Command::Unknown(padded(b"sendcmpct")).to_string(),
            "unknown(sendcmpct)"
        );
    }
}
