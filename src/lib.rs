//! Client side of the Bitcoin P2P wire protocol.
//!
//! This crate connects to a remote peer, performs the version/verack
//! handshake, and then continuously frames, validates and dispatches
//! variable-length binary messages over a persistent TCP stream.
//!
//! The pieces, leaf-first:
//!
//! - [`wire::codec`] — fixed-width and CompactSize integer codec
//! - [`wire::message`] — command table, 24-byte header, framing, checksum
//! - [`wire::payload`] — timestamps, network addresses, version payload
//! - [`wire::reader`] — frame reassembly from arbitrarily-fragmented reads
//! - [`handshake`] — the version/verack state machine and message dispatch
//! - [`session`] — the per-connection TCP driver tying it all together
//!
//! Protocol reference:
//! https://developer.bitcoin.org/reference/p2p_networking.html

pub mod config;
pub mod error;
pub mod handshake;
pub mod session;
pub mod wire;

pub use config::{Config, Network};
pub use error::{CloseReason, WireError};
pub use session::Session;
