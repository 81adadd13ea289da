//! Wire protocol and connection errors.

use std::io;

use thiserror::Error;

/// Errors produced while decoding or validating wire bytes.
///
/// All of these are fatal to the connection: once framing is lost there
/// is no way to resynchronise a corrupted byte stream. Unknown commands
/// and out-of-sequence messages are *not* errors — they are recovered
/// locally by the handshake state machine.
#[derive(Debug, Error)]
pub enum WireError {
    /// Fewer bytes were available than a declared fixed-width field requires.
    #[error("malformed field: {0}")]
    MalformedField(&'static str),

    /// A header declared a payload length beyond the safety cap.
    ///
    /// Rejected before the payload is buffered, so a malicious peer
    /// cannot make us allocate the declared length.
    #[error("declared payload length {0} exceeds the {1}-byte cap")]
    OversizedPayload(u32, u32),

    /// The payload hash does not match the header checksum.
    #[error("checksum mismatch: header {header:02x?}, computed {computed:02x?}")]
    ChecksumMismatch {
        header: [u8; 4],
        computed: [u8; 4],
    },

    /// The header magic does not identify the configured network.
    #[error("bad network magic {0:02x?}")]
    BadMagic([u8; 4]),

    /// Transport-layer failure.
    #[error("socket error: {0}")]
    Io(#[from] io::Error),
}

/// Why a connection ended.
///
/// Reported by [`Session::run`](crate::session::Session::run); the caller
/// decides whether to reconnect. A reconnect always starts from fresh
/// handshake state — nothing is carried over.
#[derive(Debug, Error)]
pub enum CloseReason {
    /// The byte stream violated the protocol (bad frame, bad checksum,
    /// malformed payload). Unrecoverable for this connection.
    #[error("protocol error: {0}")]
    ProtocolError(WireError),

    /// The transport failed mid-connection.
    #[error("socket error: {0}")]
    SocketError(io::Error),

    /// The peer closed the stream.
    #[error("peer closed the connection")]
    PeerClosed,

    /// The peer echoed our own version nonce — we connected to ourselves.
    #[error("self connection detected (nonce match)")]
    SelfConnection,
}
