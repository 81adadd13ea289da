//! Frame reassembly from an arbitrarily-fragmented byte stream.
//!
//! TCP delivers bytes, not messages: a single read may carry half a
//! header, or several complete frames back to back. [`FrameReader`]
//! accumulates whatever arrives and yields complete, checksum-verified
//! frames one at a time, keeping any surplus bytes buffered for the
//! next message.

use crate::error::WireError;
use crate::wire::message::{self, checksum, Frame};
use crate::wire::constants::HEADER_LEN;

/// Incremental frame reassembler for one connection.
///
/// Owned exclusively by that connection's read loop; the codec and
/// checksum helpers underneath are pure, so readers for different
/// connections never share state.
#[derive(Debug)]
pub struct FrameReader {
    buf: Vec<u8>,
    magic: [u8; 4],
}

impl FrameReader {
    pub fn new(magic: [u8; 4]) -> Self {
        Self {
            buf: Vec::new(),
            magic,
        }
    }

    /// Feeds bytes received from the transport, in arrival order.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Number of bytes buffered but not yet consumed.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Yields the next complete frame, or `None` when more bytes are
    /// needed (never blocks).
    ///
    /// Only the bytes belonging to the returned frame are consumed;
    /// anything after them stays buffered, so pipelined messages
    /// delivered in one read are never lost.
    ///
    /// Errors (wrong magic, oversized declared length, checksum
    /// mismatch) are unrecoverable: message framing is lost and the
    /// connection must be closed. An oversized length is rejected from
    /// the header alone, before any payload is buffered.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, WireError> {
        if self.buf.len() < HEADER_LEN {
            return Ok(None);
        }

        let header_bytes: [u8; HEADER_LEN] = self.buf[..HEADER_LEN].try_into().unwrap();
        let header = message::unframe(&header_bytes)?;

        if header.magic != self.magic {
            return Err(WireError::BadMagic(header.magic));
        }

        let total = HEADER_LEN + header.payload_len as usize;
        if self.buf.len() < total {
            return Ok(None);
        }

        let payload = self.buf[HEADER_LEN..total].to_vec();
        self.buf.drain(..total);

        let computed = checksum(&payload);
        if computed != header.checksum {
            return Err(WireError::ChecksumMismatch {
                header: header.checksum,
                computed,
            });
        }

        Ok(Some(Frame { header, payload }))
    }
}
