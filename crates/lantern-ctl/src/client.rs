//! SDE client operations — one request/reply exchange per call.
//!
//! Replies arrive as announce/data pairs sharing the request's sequence
//! number; the client pairs them by the echoed `seq`, never by arrival
//! order, and validates every size a packet declares before trusting it.
//! Datagrams from other peers or with a stale `seq` are skipped.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use tokio::net::UdpSocket;
use tokio::time::timeout;
use zerocopy::{AsBytes, FromBytes};

use lantern_core::sde::{
    ChunkType, GetServiceDesc, GetServiceDescData, Metadata, MetadataData, PacketHeader,
    PacketType, ServiceDesc, ServiceDescData, U32be, MAX_DATAGRAM,
};
use lantern_core::tlv::chunks;

/// How long to wait for each reply datagram before reporting the server
/// unresponsive. The protocol has no reliability layer; the caller retries.
pub const REPLY_TIMEOUT: Duration = Duration::from_secs(2);

/// One service parsed out of a `SERVICE_DESC_DATA` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescription {
    pub pos: u8,
    pub mod_time: u64,
    pub cat_id: u32,
    pub short_desc: Option<String>,
    pub long_desc: Option<String>,
    pub uri: String,
}

pub struct SdeClient {
    socket: UdpSocket,
    server: SocketAddr,
    seq: u32,
}

impl SdeClient {
    pub async fn connect(server: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .context("cannot bind client socket")?;
        Ok(Self {
            socket,
            server,
            seq: 0,
        })
    }

    /// `GET_METADATA`: the published services' modification timestamps, in
    /// position order.
    pub async fn metadata(&mut self) -> Result<Vec<u64>> {
        self.seq = self.seq.wrapping_add(1);
        let seq = self.seq;

        let request = PacketHeader::new(PacketType::GetMetadata, seq);
        self.socket.send_to(request.as_bytes(), self.server).await?;

        let announce = self.recv_reply(PacketType::Metadata, seq).await?;
        let count = Metadata::read_from_prefix(&announce)
            .ok_or_else(|| anyhow!("short METADATA announce"))?
            .count
            .get() as usize;

        let data = self.recv_reply(PacketType::MetadataData, seq).await?;
        let header = MetadataData::read_from_prefix(&data)
            .ok_or_else(|| anyhow!("short METADATA_DATA packet"))?;
        if header.count.get() as usize != count {
            bail!(
                "announce and data disagree on the count ({count} vs {})",
                header.count.get()
            );
        }

        let body = &data[std::mem::size_of::<MetadataData>()..];
        if body.len() < count * 8 {
            bail!("METADATA_DATA is shorter than its declared count");
        }
        let mut timestamps = Vec::with_capacity(count);
        for raw in body.chunks_exact(8).take(count) {
            let mut ts = [0u8; 8];
            ts.copy_from_slice(raw);
            timestamps.push(u64::from_be_bytes(ts));
        }
        Ok(timestamps)
    }

    /// `GET_SERVICE_DESC`: full descriptions of the services at the given
    /// positions. The responder returns them in ascending position order
    /// regardless of the order requested here.
    pub async fn describe(&mut self, positions: &[u8]) -> Result<Vec<ServiceDescription>> {
        self.seq = self.seq.wrapping_add(1);
        let seq = self.seq;

        let announce = GetServiceDesc {
            header: PacketHeader::new(PacketType::GetServiceDesc, seq),
            count: U32be::new(positions.len() as u32),
        };
        self.socket
            .send_to(announce.as_bytes(), self.server)
            .await?;

        let mut request = Vec::with_capacity(
            std::mem::size_of::<GetServiceDescData>() + positions.len(),
        );
        request.extend_from_slice(
            GetServiceDescData {
                header: PacketHeader::new(PacketType::GetServiceDescData, seq),
                count: U32be::new(positions.len() as u32),
            }
            .as_bytes(),
        );
        request.extend_from_slice(positions);
        self.socket.send_to(&request, self.server).await?;

        let reply = self.recv_reply(PacketType::ServiceDesc, seq).await?;
        let size = ServiceDesc::read_from_prefix(&reply)
            .ok_or_else(|| anyhow!("short SERVICE_DESC announce"))?
            .size
            .get() as usize;

        let data = self.recv_reply(PacketType::ServiceDescData, seq).await?;
        let header = ServiceDescData::read_from_prefix(&data)
            .ok_or_else(|| anyhow!("short SERVICE_DESC_DATA packet"))?;
        if header.size.get() as usize != size {
            bail!(
                "announce and data disagree on the size ({size} vs {})",
                header.size.get()
            );
        }

        let body = &data[std::mem::size_of::<ServiceDescData>()..];
        if body.len() < size {
            bail!("SERVICE_DESC_DATA is shorter than its declared size");
        }
        parse_descriptions(&body[..size])
    }

    /// Waits for the reply datagram of `expected` type echoing `seq`,
    /// skipping anything else.
    async fn recv_reply(&self, expected: PacketType, seq: u32) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            let (len, from) = timeout(REPLY_TIMEOUT, self.socket.recv_from(&mut buf))
                .await
                .map_err(|_| anyhow!("no reply from {} ({expected:?})", self.server))?
                .context("recv failed")?;
            if from != self.server {
                continue;
            }
            let Some(header) = PacketHeader::read_from_prefix(&buf[..len]) else {
                continue;
            };
            if header.packet_type.get() == u32::from(expected) && header.seq.get() == seq {
                return Ok(buf[..len].to_vec());
            }
        }
    }
}

/// Parses the `DESCRIPTION` chunks of a reply payload.
pub fn parse_descriptions(blob: &[u8]) -> Result<Vec<ServiceDescription>> {
    let mut descriptions = Vec::new();
    for chunk in chunks(blob) {
        if chunk.chunk_type != u32::from(ChunkType::Description) {
            continue;
        }

        let mut pos = 0u8;
        let mut mod_time = 0u64;
        let mut cat_id = 0u32;
        let mut short_desc = None;
        let mut long_desc = None;
        let mut uri = None;

        for field in chunks(chunk.value) {
            match ChunkType::try_from(field.chunk_type) {
                Ok(ChunkType::ServicePos) => {
                    pos = *field.value.first().unwrap_or(&0);
                }
                Ok(ChunkType::ServiceTs) => {
                    let mut ts = [0u8; 8];
                    if field.value.len() == 8 {
                        ts.copy_from_slice(field.value);
                    }
                    mod_time = u64::from_be_bytes(ts);
                }
                Ok(ChunkType::ServiceCatId) => {
                    let mut id = [0u8; 4];
                    if field.value.len() == 4 {
                        id.copy_from_slice(field.value);
                    }
                    cat_id = u32::from_be_bytes(id);
                }
                Ok(ChunkType::ServiceShortDesc) => {
                    short_desc = Some(String::from_utf8_lossy(field.value).into_owned());
                }
                Ok(ChunkType::ServiceLongDesc) => {
                    long_desc = Some(String::from_utf8_lossy(field.value).into_owned());
                }
                Ok(ChunkType::ServiceUri) => {
                    uri = Some(String::from_utf8_lossy(field.value).into_owned());
                }
                // Unknown inner chunks are future extensions; skip them.
                _ => {}
            }
        }

        descriptions.push(ServiceDescription {
            pos,
            mod_time,
            cat_id,
            short_desc,
            long_desc,
            uri: uri.ok_or_else(|| anyhow!("description chunk without a URI"))?,
        });
    }
    Ok(descriptions)
}
