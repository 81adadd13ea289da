//! Per-connection TCP driver.
//!
//! A [`Session`] exclusively owns its socket, its partial-read buffer
//! and its handshake state; one logical sequential loop drives the
//! whole connection (read → reassemble → dispatch → reply), so no
//! locking is ever needed across connections. Reads block on socket
//! readiness — there is no fixed-delay polling anywhere.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, SocketAddrV4, TcpStream, ToSocketAddrs};

use rand::Rng;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{CloseReason, WireError};
use crate::handshake::{Action, Handshake};
use crate::wire::message::{frame, Command};
use crate::wire::payload::{build_version_payload, VersionMessage};
use crate::wire::reader::FrameReader;

/// A live connection to one peer.
pub struct Session {
    stream: TcpStream,
    reader: FrameReader,
    handshake: Handshake,
    config: Config,
}

impl Session {
    /// Resolves `node` (`host:port`), dials it and immediately sends our
    /// `version` message, entering the handshake.
    ///
    /// The handshake nonce is freshly random per attempt so a connection
    /// looped back to ourselves is detected when the peer echoes it.
    pub fn connect(node: &str, config: Config) -> Result<Self, WireError> {
        let peer = resolve_v4(node)?;

        let stream =
            TcpStream::connect_timeout(&SocketAddr::V4(peer), config.connect_timeout)?;

        let nonce: u64 = rand::thread_rng().gen();
        let payload = build_version_payload(&config, peer, nonce)?;

        let mut session = Session {
            stream,
            reader: FrameReader::new(config.network.magic()),
            handshake: Handshake::new(nonce),
            config,
        };

        session.send(Command::Version, &payload)?;
        info!(peer = %peer, "connected, version sent");

        Ok(session)
    }

    /// Writes one framed message to the peer.
    pub fn send(&mut self, command: Command, payload: &[u8]) -> io::Result<()> {
        let bytes = frame(command, payload, self.config.network.magic());
        self.stream.write_all(&bytes)?;
        debug!(command = %command, payload_len = payload.len(), "sent");
        Ok(())
    }

    pub fn is_established(&self) -> bool {
        self.handshake.is_established()
    }

    /// The peer's advertised version message, once the handshake has
    /// progressed far enough to know it.
    pub fn peer_version(&self) -> Option<&VersionMessage> {
        self.handshake.peer()
    }

    /// Drives the connection until the handshake completes.
    ///
    /// The rare messages deliverable before completion (pong, unknown
    /// commands) are logged and dropped.
    pub fn wait_established(&mut self) -> Result<(), CloseReason> {
        while !self.handshake.is_established() {
            if let Some((command, payload)) = self.pump()? {
                debug!(command = %command, len = payload.len(), "dropped during handshake");
            }
        }
        Ok(())
    }

    /// Blocks until the next message legal in the current state arrives,
    /// and returns it. Handshake bookkeeping and automatic replies
    /// (verack, pong, getdata) happen internally.
    pub fn recv(&mut self) -> Result<(Command, Vec<u8>), CloseReason> {
        loop {
            if let Some(message) = self.pump()? {
                return Ok(message);
            }
        }
    }

    /// Drives the connection until it closes, handing every dispatched
    /// message to `handler` in strict arrival order.
    pub fn run<F>(&mut self, mut handler: F) -> CloseReason
    where
        F: FnMut(&Command, &[u8]),
    {
        loop {
            match self.recv() {
                Ok((command, payload)) => handler(&command, &payload),
                Err(reason) => return reason,
            }
        }
    }

    /// Processes exactly one inbound frame: reads from the socket until
    /// a complete frame is buffered, runs it through the handshake state
    /// machine, executes the resulting sends, and returns the delivered
    /// message, if that frame produced one.
    fn pump(&mut self) -> Result<Option<(Command, Vec<u8>)>, CloseReason> {
        let frame = loop {
            match self.reader.next_frame() {
                Ok(Some(frame)) => break frame,
                Ok(None) => {}
                Err(e) => return Err(CloseReason::ProtocolError(e)),
            }

            let mut chunk = [0u8; 4096];
            match self.stream.read(&mut chunk) {
                Ok(0) => return Err(CloseReason::PeerClosed),
                Ok(n) => self.reader.extend(&chunk[..n]),
                Err(e) => return Err(CloseReason::SocketError(e)),
            }
        };

        let was_established = self.handshake.is_established();

        let actions = self
            .handshake
            .on_message(frame.header.command, frame.payload)?;

        let mut delivered = None;
        for action in actions {
            match action {
                Action::Send(command, payload) => self
                    .send(command, &payload)
                    .map_err(CloseReason::SocketError)?,
                Action::Deliver(command, payload) => delivered = Some((command, payload)),
            }
        }

        if !was_established && self.handshake.is_established() {
            let peer = self.handshake.peer();
            info!(
                version = peer.map(|v| v.version),
                user_agent = peer.map(|v| v.user_agent.as_str()),
                "handshake complete",
            );
        }

        Ok(delivered)
    }
}

fn resolve_v4(node: &str) -> Result<SocketAddrV4, WireError> {
    node.to_socket_addrs()?
        .find_map(|addr| match addr {
            SocketAddr::V4(v4) => Some(v4),
            SocketAddr::V6(_) => None,
        })
        .ok_or_else(|| {
            WireError::Io(io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                "no IPv4 address for node",
            ))
        })
}
