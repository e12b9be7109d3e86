//! Service Description Exchange wire format — on-wire types for the UDP
//! protocol a client speaks once it has associated with the access point.
//!
//! These types ARE the protocol. All integers are network byte order and
//! every layout below is fixed; replies that carry a variable part (the
//! timestamp array, the position array, the TLV blob) append it directly
//! after the fixed struct in the same datagram.
//!
//! Responses come in announce/data pairs: the announce packet declares the
//! element count or byte size of the data packet that follows so a receiver
//! can allocate exactly once, and the data packet repeats the same field so
//! a receiver that lost the announce can still validate. Both packets of a
//! pair echo the request's sequence number.

use static_assertions::assert_eq_size;
use zerocopy::byteorder::{NetworkEndian, U32};
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

/// 32-bit big-endian wire integer.
pub type U32be = U32<NetworkEndian>;

/// UDP port the responder listens on.
pub const SDE_PORT: u16 = 30003;

/// Receive buffer size — sized for the largest datagram the OS will hand us.
pub const MAX_DATAGRAM: usize = 64 * 1024;

// ── Packet types ─────────────────────────────────────────────────────────────

/// Service Description Exchange packet type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum PacketType {
    /// A metadata request.
    GetMetadata = 0,
    /// The metadata response announce.
    Metadata = 1,
    /// The metadata response data.
    MetadataData = 2,
    /// A service description request announce.
    GetServiceDesc = 3,
    /// The service description request data (the wanted positions).
    GetServiceDescData = 4,
    /// The service description response announce.
    ServiceDesc = 5,
    /// The service description response data.
    ServiceDescData = 6,
}

impl TryFrom<u32> for PacketType {
    type Error = SdeError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PacketType::GetMetadata),
            1 => Ok(PacketType::Metadata),
            2 => Ok(PacketType::MetadataData),
            3 => Ok(PacketType::GetServiceDesc),
            4 => Ok(PacketType::GetServiceDescData),
            5 => Ok(PacketType::ServiceDesc),
            6 => Ok(PacketType::ServiceDescData),
            other => Err(SdeError::UnknownPacketType(other)),
        }
    }
}

impl From<PacketType> for u32 {
    fn from(t: PacketType) -> u32 {
        t as u32
    }
}

// ── Description chunk types ──────────────────────────────────────────────────

/// TLV chunk types used inside a service description payload and in the
/// serialized form the owner UI posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ChunkType {
    /// Encloses one service's description; the value is a TLV sequence of
    /// the chunk types below.
    Description = 0,
    /// Position of the service as advertised in the SSID (1 byte).
    ServicePos = 1,
    /// Last-modification timestamp (8 bytes, network order).
    ServiceTs = 2,
    /// Service category ID (4 bytes, network order).
    ServiceCatId = 3,
    /// Optional short description advertised in the SSID.
    ServiceShortDesc = 4,
    /// Optional long description.
    ServiceLongDesc = 5,
    /// URI to obtain the service.
    ServiceUri = 6,
}

impl TryFrom<u32> for ChunkType {
    type Error = SdeError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ChunkType::Description),
            1 => Ok(ChunkType::ServicePos),
            2 => Ok(ChunkType::ServiceTs),
            3 => Ok(ChunkType::ServiceCatId),
            4 => Ok(ChunkType::ServiceShortDesc),
            5 => Ok(ChunkType::ServiceLongDesc),
            6 => Ok(ChunkType::ServiceUri),
            other => Err(SdeError::UnknownChunkType(other)),
        }
    }
}

impl From<ChunkType> for u32 {
    fn from(t: ChunkType) -> u32 {
        t as u32
    }
}

// ── Packet layouts ───────────────────────────────────────────────────────────

/// The common prefix of every SDE packet.
///
/// A `GET_METADATA` request is exactly this header; every reply echoes the
/// request's `seq`.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
pub struct PacketHeader {
    pub packet_type: U32be,
    pub seq: U32be,
}

assert_eq_size!(PacketHeader, [u8; 8]);

impl PacketHeader {
    pub fn new(packet_type: PacketType, seq: u32) -> Self {
        Self {
            packet_type: U32be::new(packet_type.into()),
            seq: U32be::new(seq),
        }
    }
}

/// `METADATA` announce: how many timestamps the data packet carries.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
pub struct Metadata {
    pub header: PacketHeader,
    pub count: U32be,
}

assert_eq_size!(Metadata, [u8; 12]);

/// `METADATA_DATA`: `count` 8-byte timestamps follow, one per published
/// service in position order. `unused` pads the timestamp array to an
/// 8-byte boundary.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
pub struct MetadataData {
    pub header: PacketHeader,
    pub count: U32be,
    pub unused: U32be,
}

assert_eq_size!(MetadataData, [u8; 16]);

/// `GET_SERVICE_DESC` announce: how many positions the data packet carries.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
pub struct GetServiceDesc {
    pub header: PacketHeader,
    pub count: U32be,
}

assert_eq_size!(GetServiceDesc, [u8; 12]);

/// `GET_SERVICE_DESC_DATA`: `count` single-byte positions follow, unpadded.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
pub struct GetServiceDescData {
    pub header: PacketHeader,
    pub count: U32be,
}

assert_eq_size!(GetServiceDescData, [u8; 12]);

/// `SERVICE_DESC` announce: the byte size of the data packet's TLV blob.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
pub struct ServiceDesc {
    pub header: PacketHeader,
    pub size: U32be,
}

assert_eq_size!(ServiceDesc, [u8; 12]);

/// `SERVICE_DESC_DATA`: `size` bytes of `DESCRIPTION` TLV chunks follow.
#[derive(Debug, Clone, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
pub struct ServiceDescData {
    pub header: PacketHeader,
    pub size: U32be,
}

assert_eq_size!(ServiceDescData, [u8; 12]);

// ── Errors ───────────────────────────────────────────────────────────────────

/// Errors that can arise when interpreting SDE wire data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SdeError {
    #[error("unknown packet type: {0}")]
    UnknownPacketType(u32),

    #[error("unknown description chunk type: {0}")]
    UnknownChunkType(u32),
}

// ── Tests ────────────────────────────────────────────────────────────────────
