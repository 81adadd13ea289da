//! Payload-level serializers: timestamps, network addresses, service
//! flags and the `version` handshake payload.
//!
//! Everything here is little-endian except the port inside a network
//! address, which the protocol transmits big-endian. That asymmetry is
//! original Satoshi-era layout and must be preserved bit-for-bit.
//!
//! https://developer.bitcoin.org/reference/p2p_networking.html#version

use std::fmt::{self, Debug, Formatter};
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddrV4};
use std::time::{SystemTime, UNIX_EPOCH};

use byteorder::{LittleEndian, WriteBytesExt};

use crate::config::Config;
use crate::error::WireError;
use crate::wire::codec::{self, read_varint, write_varint};
use crate::wire::constants::NET_ADDR_LEN;

/// 12-byte prefix mapping an IPv4 address into the 16-byte IP field
/// (`::ffff:a.b.c.d`, the standard IPv6-mapped form).
const IPV4_MAPPED_PREFIX: [u8; 12] = [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0xFF, 0xFF];

/// Service flags as defined by the Bitcoin P2P protocol.
///
/// A `u64` bitfield transmitted in the `version` message and inside
/// network address fields; each bit advertises a node capability.
/// Unknown bits are preserved — the flags are forward-compatible.
///
/// https://developer.bitcoin.org/reference/p2p_networking.html#version
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Services(u64);

impl Services {
    pub const fn new(bits: u64) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Returns true if all bits in `other` are set.
    pub const fn contains(self, other: Services) -> bool {
        (self.0 & other.0) == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// 0x00 — not a full node; may only relay transactions it originates.
    pub const NONE: Services = Services(0x00);

    /// 0x01 — NODE_NETWORK: a full node that can be asked for full blocks.
    pub const NODE_NETWORK: Services = Services(0x01);

    /// 0x02 — NODE_GETUTXO: answers `getutxo` requests (BIP64).
    pub const NODE_GETUTXO: Services = Services(0x02);

    /// 0x04 — NODE_BLOOM: supports bloom-filtered connections (BIP111).
    pub const NODE_BLOOM: Services = Services(0x04);

    /// 0x08 — NODE_WITNESS: serves witness data (BIP144).
    pub const NODE_WITNESS: Services = Services(0x08);

    /// 0x0400 — NODE_NETWORK_LIMITED: serves at least the last 288 blocks
    /// (BIP159).
    pub const NODE_NETWORK_LIMITED: Services = Services(0x0400);

    pub fn names(self) -> Vec<&'static str> {
        let mut names = Vec::new();

        if self.is_empty() {
            names.push("NONE");
            return names;
        }

        if self.contains(Self::NODE_NETWORK) {
            names.push("NODE_NETWORK");
        }
        if self.contains(Self::NODE_GETUTXO) {
            names.push("NODE_GETUTXO");
        }
        if self.contains(Self::NODE_BLOOM) {
            names.push("NODE_BLOOM");
        }
        if self.contains(Self::NODE_WITNESS) {
            names.push("NODE_WITNESS");
        }
        if self.contains(Self::NODE_NETWORK_LIMITED) {
            names.push("NODE_NETWORK_LIMITED");
        }

        names
    }
}

impl From<u64> for Services {
    fn from(value: u64) -> Self {
        Services::new(value)
    }
}

impl Debug for Services {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "Services(NONE)");
        }

        write!(f, "Services({}) [0x{:016x}]", self.names().join(" | "), self.bits())
    }
}

/// A network address field as embedded in `version` and `addr` payloads:
/// services, a 16-byte IP (IPv4 addresses use the `::ffff:` mapping) and
/// a big-endian port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetAddr {
    pub services: u64,
    pub ip: IpAddr,
    pub port: u16,
}

/// Encodes an epoch timestamp as the 8 little-endian bytes the wire uses.
pub fn encode_timestamp(epoch_seconds: i64) -> [u8; 8] {
    epoch_seconds.to_le_bytes()
}

/// Encodes a network address into its fixed 26-byte layout.
///
/// Layout: services u64 LE, 16-byte IP field (IPv4 gets the `::ffff:`
/// mapped prefix, octets kept in address order — single bytes are never
/// swapped), port u16 **big-endian**.
pub fn encode_net_addr(addr: &NetAddr) -> [u8; NET_ADDR_LEN] {
    let mut out = [0u8; NET_ADDR_LEN];

    out[..8].copy_from_slice(&addr.services.to_le_bytes());
    match addr.ip {
        IpAddr::V4(ip) => {
            out[8..20].copy_from_slice(&IPV4_MAPPED_PREFIX);
            out[20..24].copy_from_slice(&ip.octets());
        }
        IpAddr::V6(ip) => out[8..24].copy_from_slice(&ip.octets()),
    }
    out[24..26].copy_from_slice(&addr.port.to_be_bytes());

    out
}

/// Decodes a 26-byte network address field at the cursor; exact inverse
/// of [`encode_net_addr`]. A non-mapped IP field decodes as native IPv6.
pub fn decode_net_addr(p: &[u8], c: &mut usize) -> Result<NetAddr, WireError> {
    let services = codec::read_u64(p, c, "net_addr: services")?;
    let ip_bytes: [u8; 16] = codec::read_array(p, c, "net_addr: ip")?;
    let port = codec::read_u16_be(p, c, "net_addr: port")?;

    let ip = if ip_bytes[..12] == IPV4_MAPPED_PREFIX {
        IpAddr::V4(Ipv4Addr::new(
            ip_bytes[12],
            ip_bytes[13],
            ip_bytes[14],
            ip_bytes[15],
        ))
    } else {
        IpAddr::V6(Ipv6Addr::from(ip_bytes))
    };

    Ok(NetAddr { services, ip, port })
}

/// A decoded `version` message payload.
#[derive(Debug, Clone)]
pub struct VersionMessage {
    pub version: i32,
    pub services: Services,
    pub timestamp: i64,
    pub addr_recv: NetAddr,
    pub addr_from: NetAddr,
    pub nonce: u64,
    pub user_agent: String,
    pub start_height: i32,
    /// BIP37 relay flag. Modern peers append it; absent on old payloads.
    pub relay: Option<bool>,
}

impl VersionMessage {
    pub fn decode(payload: &[u8]) -> Result<Self, WireError> {
        let mut c = 0;

        let version = codec::read_i32(payload, &mut c, "version: version")?;
        let services = Services::from(codec::read_u64(payload, &mut c, "version: services")?);
        let timestamp = codec::read_i64(payload, &mut c, "version: timestamp")?;
        let addr_recv = decode_net_addr(payload, &mut c)?;
        let addr_from = decode_net_addr(payload, &mut c)?;
        let nonce = codec::read_u64(payload, &mut c, "version: nonce")?;

        let ua_len = read_varint(payload, &mut c)? as usize;
        let user_agent = std::str::from_utf8(
            payload
                .get(c..c + ua_len)
                .ok_or(WireError::MalformedField("version: user_agent"))?,
        )
        .map_err(|_| WireError::MalformedField("version: user_agent not utf-8"))?
        .to_string();
        c += ua_len;

        let start_height = codec::read_i32(payload, &mut c, "version: start_height")?;
        let relay = payload.get(c).map(|&b| b != 0);

        Ok(VersionMessage {
            version,
            services,
            timestamp,
            addr_recv,
            addr_from,
            nonce,
            user_agent,
            start_height,
            relay,
        })
    }
}

/// Builds a `version` message payload for the handshake.
///
/// Field order:
///
/// ```text
/// int32    version
/// uint64   services
/// int64    timestamp
/// net_addr addr_recv
/// net_addr addr_from
/// uint64   nonce
/// var_str  user_agent
/// int32    start_height
/// ```
///
/// Deterministic given its inputs except for the timestamp. The nonce is
/// caller-supplied and must be freshly random per connection attempt so a
/// peer echoing it back exposes a connection to ourselves.
pub fn build_version_payload(
    config: &Config,
    peer: SocketAddrV4,
    nonce: u64,
) -> Result<Vec<u8>, WireError> {
    let mut payload = vec![];

    payload.write_i32::<LittleEndian>(config.protocol_version)?;
    payload.write_u64::<LittleEndian>(config.services.bits())?;

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
        .as_secs();
    payload.extend(encode_timestamp(now as i64));

    // addr_recv: assume the peer we dialed is a full node
    payload.extend(encode_net_addr(&NetAddr {
        services: Services::NODE_NETWORK.bits(),
        ip: IpAddr::V4(*peer.ip()),
        port: peer.port(),
    }));

    // addr_from: our own advertised endpoint and capabilities
    payload.extend(encode_net_addr(&NetAddr {
        services: config.services.bits(),
        ip: IpAddr::V4(*config.local.ip()),
        port: config.local.port(),
    }));

    payload.write_u64::<LittleEndian>(nonce)?;

    write_varint(config.user_agent.len() as u64, &mut payload);
    payload.extend_from_slice(config.user_agent.as_bytes());

    payload.write_i32::<LittleEndian>(config.start_height)?;

    Ok(payload)
}
