//! Per-connection configuration.
//!
//! Everything the connection needs — network selection, protocol
//! version, advertised capabilities, endpoints — travels in one
//! immutable [`Config`] value handed to
//! [`Session::connect`](crate::session::Session::connect). There is no
//! process-wide protocol state.

use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;

use crate::wire::constants::{
    MAIN_NET_MAGIC, MAIN_NET_PORT, PROTOCOL_VERSION, TEST_NET_MAGIC, TEST_NET_PORT,
};
use crate::wire::payload::Services;

/// Which Bitcoin network to speak. Selects the header magic and the
/// default peer port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    /// The 4 magic bytes opening every message header on this network.
    pub const fn magic(self) -> [u8; 4] {
        match self {
            Network::Mainnet => MAIN_NET_MAGIC,
            Network::Testnet => TEST_NET_MAGIC,
        }
    }

    pub const fn default_port(self) -> u16 {
        match self {
            Network::Mainnet => MAIN_NET_PORT,
            Network::Testnet => TEST_NET_PORT,
        }
    }
}

/// Connection parameters, fixed for the lifetime of a [`Session`].
///
/// [`Session`]: crate::session::Session
#[derive(Debug, Clone)]
pub struct Config {
    pub network: Network,

    /// Protocol version advertised in our `version` message.
    pub protocol_version: i32,

    /// Capability flags advertised in our `version` message.
    pub services: Services,

    /// User agent string, var_str-encoded into the version payload.
    /// May be empty.
    pub user_agent: String,

    /// Best block height advertised in our `version` message.
    pub start_height: i32,

    /// Endpoint written into the version payload's `addr_from` field.
    pub local: SocketAddrV4,

    pub connect_timeout: Duration,
}

impl Config {
    /// Defaults for `network`: latest protocol version, no advertised
    /// services, empty user agent, loopback local endpoint.
    pub fn new(network: Network) -> Self {
        Self {
            network,
            protocol_version: PROTOCOL_VERSION,
            services: Services::NONE,
            user_agent: String::new(),
            start_height: 0,
            local: SocketAddrV4::new(Ipv4Addr::LOCALHOST, 8880),
            connect_timeout: Duration::from_secs(30),
        }
    }
}
