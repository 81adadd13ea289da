/// Network magic for Bitcoin mainnet, in wire byte order.
///
/// The first 4 bytes of every Bitcoin P2P message identify the
/// network and act as a message boundary marker in the TCP stream.
///
/// You can see how Bitcoin Core maps magic values to networks
/// in `GetNetworkForMagic`:
/// https://github.com/bitcoin/bitcoin/blob/master/src/kernel/chainparams.cpp#L703-L723
pub const MAIN_NET_MAGIC: [u8; 4] = [0xF9, 0xBE, 0xB4, 0xD9];

/// Network magic for testnet3, in wire byte order.
pub const TEST_NET_MAGIC: [u8; 4] = [0x0B, 0x11, 0x09, 0x07];

/// Current Bitcoin P2P protocol version.
///
/// Sent in the `version` message during handshake and used for peer
/// capability negotiation.
///
/// Serialized on the wire as a signed 32-bit little-endian integer.
/// Notable versions: https://developer.bitcoin.org/reference/p2p_networking.html#protocol-versions
pub const PROTOCOL_VERSION: i32 = 70016;

/// Default peer port on mainnet.
pub const MAIN_NET_PORT: u16 = 8333;

/// Default peer port on testnet3.
pub const TEST_NET_PORT: u16 = 18333;

/// Upper bound accepted for a header-declared payload length.
///
/// Bitcoin Core caps protocol messages at 32 MiB; anything larger is a
/// corrupt or hostile header and is rejected before the payload is read.
pub const MAX_PAYLOAD_LEN: u32 = 32 * 1024 * 1024;

/// Length of the fixed message header: magic (4) + command (12) +
/// payload length (4) + checksum (4).
pub const HEADER_LEN: usize = 24;

/// Length of a serialized network address field inside message payloads:
/// services (8) + IPv6-mapped IP (16) + port (2).
pub const NET_ADDR_LEN: usize = 26;
