//! The version/verack handshake and steady-state dispatch state machine.
//!
//! The machine is pure: it consumes `(command, payload)` pairs and emits
//! [`Action`]s for the session driver to execute. It never touches the
//! socket, which keeps every sequencing rule testable with plain byte
//! fixtures.
//!
//! Lifecycle:
//!
//! ```text
//! VersionSent ── version + (verack sent ∧ verack received) ──▶ Established
//! ```
//!
//! Both halves complete in either order; real peers race them.
//!
//! https://developer.bitcoin.org/devguide/p2p_network.html#connecting-to-peers

use tracing::{debug, warn};

use crate::error::CloseReason;
use crate::wire::message::Command;
use crate::wire::payload::VersionMessage;

/// Connection-lifecycle position, as visible to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Our `version` is out; the exchange has not completed yet.
    VersionSent,
    /// Both sides exchanged version and verack; data messages flow.
    Established,
}

/// What the session driver must do after a message was consumed.
#[derive(Debug)]
pub enum Action {
    /// Write a framed reply to the peer.
    Send(Command, Vec<u8>),
    /// Hand a message to the application handler.
    Deliver(Command, Vec<u8>),
}

/// Per-connection handshake and dispatch state.
///
/// Created when the connection's `version` message goes out; destroyed
/// with the connection. Never reused across reconnect attempts.
#[derive(Debug)]
pub struct Handshake {
    /// The nonce we sent in our version payload. A peer echoing it back
    /// is ourselves through a loop.
    nonce: u64,
    version_received: bool,
    verack_received: bool,
    verack_sent: bool,
    peer: Option<VersionMessage>,
}

impl Handshake {
    pub fn new(nonce: u64) -> Self {
        Self {
            nonce,
            version_received: false,
            verack_received: false,
            verack_sent: false,
            peer: None,
        }
    }

    pub fn state(&self) -> HandshakeState {
        if self.is_established() {
            HandshakeState::Established
        } else {
            HandshakeState::VersionSent
        }
    }

    pub fn is_established(&self) -> bool {
        self.version_received && self.verack_sent && self.verack_received
    }

    /// The peer's advertised version message, once received.
    pub fn peer(&self) -> Option<&VersionMessage> {
        self.peer.as_ref()
    }

    /// Consumes one checksum-verified message and returns the actions it
    /// triggers, in execution order.
    ///
    /// Sequencing rules:
    /// - `version`: record the peer's advertised version/services.
    /// - `verack`: reply with our own verack exactly once per
    ///   connection, then count the peer's as received.
    /// - `ping`: legal in any state; answered with a `pong` echoing the
    ///   identical payload bytes.
    /// - `inv` once established: answered with a `getdata` replaying the
    ///   same payload, requesting the advertised objects in full.
    /// - data messages before the handshake completes are out of
    ///   sequence: logged and dropped, never fatal.
    /// - unknown commands: delivered as opaque bytes for the caller.
    ///
    /// A fatal condition (undecodable version payload, our own nonce
    /// echoed back) is returned as the [`CloseReason`] for the
    /// connection.
    pub fn on_message(
        &mut self,
        command: Command,
        payload: Vec<u8>,
    ) -> Result<Vec<Action>, CloseReason> {
        let mut actions = Vec::new();

        match command {
            Command::Version => {
                let version =
                    VersionMessage::decode(&payload).map_err(CloseReason::ProtocolError)?;
                if version.nonce == self.nonce {
                    return Err(CloseReason::SelfConnection);
                }
                debug!(
                    version = version.version,
                    services = ?version.services,
                    user_agent = %version.user_agent,
                    start_height = version.start_height,
                    "peer version",
                );
                self.version_received = true;
                self.peer = Some(version);
            }

            Command::Verack => {
                if !self.verack_sent {
                    self.verack_sent = true;
                    actions.push(Action::Send(Command::Verack, Vec::new()));
                }
                self.verack_received = true;
            }

            Command::Ping => {
                actions.push(Action::Send(Command::Pong, payload));
            }

            Command::Pong => {
                actions.push(Action::Deliver(Command::Pong, payload));
            }

            Command::Unknown(raw) => {
                debug!(command = %Command::Unknown(raw), len = payload.len(), "unknown command");
                actions.push(Action::Deliver(Command::Unknown(raw), payload));
            }

            data @ (Command::Addr
            | Command::GetHeaders
            | Command::Inv
            | Command::GetData
            | Command::Tx
            | Command::Block) => {
                if !self.is_established() {
                    // out of sequence: peers occasionally race these
                    // past their verack, so drop rather than disconnect
                    warn!(command = %data, len = payload.len(), "out of sequence, ignoring");
                } else {
                    if data == Command::Inv {
                        actions.push(Action::Send(Command::GetData, payload.clone()));
                    }
                    actions.push(Action::Deliver(data, payload));
                }
            }
        }

        Ok(actions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Network};
    use crate::wire::payload::build_version_payload;
    use std::net::{Ipv4Addr, SocketAddrV4};

    const OUR_NONCE: u64 = 41;
    const PEER_NONCE: u64 = 42;

    fn peer_version_payload(nonce: u64) -> Vec<u8> {
        let config = Config::new(Network::Mainnet);
        let peer = SocketAddrV4::new(Ipv4Addr::new(1, 2, 3, 4), 8333);
        build_version_payload(&config, peer, nonce).unwrap()
    }

    fn sends(actions: &[Action]) -> Vec<Command> {
        actions
            .iter()
            .filter_map(|a| match a {
                Action::Send(command, _) => Some(*command),
                Action::Deliver(..) => None,
            })
            .collect()
    }

    #[test]
    fn version_then_verack_sends_one_verack_and_establishes() {
        let mut hs = Handshake::new(OUR_NONCE);

        let actions = hs
            .on_message(Command::Version, peer_version_payload(PEER_NONCE))
            .unwrap();
        assert!(actions.is_empty());
        assert!(!hs.is_established());

        let actions = hs.on_message(Command::Verack, vec![]).unwrap();
        assert_eq!(sends(&actions), vec![Command::Verack]);
        assert!(hs.is_established());
        assert_eq!(hs.state(), HandshakeState::Established);
        assert_eq!(hs.peer().unwrap().nonce, PEER_NONCE);
    }

    #[test]
    fn verack_before_version_establishes_after_version_arrives() {
        let mut hs = Handshake::new(OUR_NONCE);

        let actions = hs.on_message(Command::Verack, vec![]).unwrap();
        assert_eq!(sends(&actions), vec![Command::Verack]);
        assert!(!hs.is_established());
        assert_eq!(hs.state(), HandshakeState::VersionSent);

        let actions = hs
            .on_message(Command::Version, peer_version_payload(PEER_NONCE))
            .unwrap();
        assert!(actions.is_empty());
        assert!(hs.is_established());
    }

    #[test]
    fn verack_reply_is_idempotent() {
        let mut hs = Handshake::new(OUR_NONCE);

        let first = hs.on_message(Command::Verack, vec![]).unwrap();
        let second = hs.on_message(Command::Verack, vec![]).unwrap();

        assert_eq!(sends(&first), vec![Command::Verack]);
        assert!(second.is_empty(), "never send more than one verack");
    }

    #[test]
    fn ping_echoes_payload_in_any_state() {
        let mut hs = Handshake::new(OUR_NONCE);

        // before the handshake completes
        let actions = hs
            .on_message(Command::Ping, vec![0xDE, 0xAD, 0xBE, 0xEF])
            .unwrap();
        assert!(matches!(
            &actions[..],
            [Action::Send(Command::Pong, payload)] if payload == &[0xDE, 0xAD, 0xBE, 0xEF]
        ));
    }

    #[test]
    fn self_connection_is_detected_by_nonce_echo() {
        let mut hs = Handshake::new(OUR_NONCE);

        let result = hs.on_message(Command::Version, peer_version_payload(OUR_NONCE));
        assert!(matches!(result, Err(CloseReason::SelfConnection)));
    }

    #[test]
    fn undecodable_version_payload_is_a_protocol_error() {
        let mut hs = Handshake::new(OUR_NONCE);

        let result = hs.on_message(Command::Version, vec![0u8; 10]);
        assert!(matches!(result, Err(CloseReason::ProtocolError(_))));
    }

    fn established() -> Handshake {
        let mut hs = Handshake::new(OUR_NONCE);
        hs.on_message(Command::Version, peer_version_payload(PEER_NONCE))
            .unwrap();
        hs.on_message(Command::Verack, vec![]).unwrap();
        assert!(hs.is_established());
        hs
    }

    #[test]
    fn early_data_messages_are_dropped_not_fatal() {
        let mut hs = Handshake::new(OUR_NONCE);

        for command in [Command::Inv, Command::Tx, Command::Block, Command::Addr] {
            let actions = hs.on_message(command, vec![1, 2, 3]).unwrap();
            assert!(actions.is_empty(), "{command} must be ignored pre-handshake");
        }
        assert!(!hs.is_established());
    }

    #[test]
    fn inv_when_established_requests_the_same_objects() {
        let mut hs = established();

        let inv_payload = vec![0x01, 0xAA, 0xBB];
        let actions = hs.on_message(Command::Inv, inv_payload.clone()).unwrap();

        assert!(matches!(
            &actions[..],
            [Action::Send(Command::GetData, request), Action::Deliver(Command::Inv, delivered)]
                if request == &inv_payload && delivered == &inv_payload
        ));
    }

    #[test]
    fn tx_and_block_are_delivered_once_established() {
        let mut hs = established();

        for command in [Command::Tx, Command::Block, Command::Addr, Command::GetHeaders] {
            let actions = hs.on_message(command, vec![7, 7]).unwrap();
            assert!(matches!(
                &actions[..],
                [Action::Deliver(delivered, payload)] if *delivered == command && payload == &[7, 7]
            ));
        }
    }

    #[test]
    fn unknown_commands_are_delivered_as_opaque_bytes() {
        let mut hs = Handshake::new(OUR_NONCE);

        let mut raw = [0u8; 12];
        raw[..9].copy_from_slice(b"sendcmpct");
        let actions = hs.on_message(Command::Unknown(raw), vec![0xAB]).unwrap();

        assert!(matches!(
            &actions[..],
            [Action::Deliver(Command::Unknown(r), payload)] if *r == raw && payload == &[0xAB]
        ));
    }
}
