//! Bitcoin P2P wire protocol primitives.
//!
//! This module implements the byte-level protocol:
//! - fixed-width and CompactSize integer codec ([`codec`])
//! - the 24-byte message header, command table and payload checksum
//!   ([`message`])
//! - timestamp / network-address / version-payload serializers
//!   ([`payload`])
//! - frame reassembly from a fragmented byte stream ([`reader`])
//!
//! Connection lifecycle (handshake sequencing, dispatch) lives above
//! this layer in [`crate::handshake`] and [`crate::session`].
//!
//! Protocol reference:
//! https://developer.bitcoin.org/reference/p2p_networking.html

pub mod codec;
pub mod constants;
pub mod message;
pub mod payload;
pub mod reader;

pub use message::{checksum, frame, unframe, Command, Frame, MessageHeader};
pub use payload::{build_version_payload, NetAddr, Services, VersionMessage};
pub use reader::FrameReader;
