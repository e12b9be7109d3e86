//! The SDE responder — a single-socket UDP server answering service
//! inquiries from associated clients.
//!
//! The loop peeks at each pending datagram, shape-checks it by declared
//! type, then pulls and dispatches it. Malformed and unknown datagrams are
//! pulled and dropped without a reply; retrying is the client's job. Every
//! reply pair echoes the request's sequence number, announce strictly
//! before data.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::UdpSocket;
use tokio::sync::watch;
use zerocopy::{AsBytes, FromBytes};

use lantern_core::sde::{
    GetServiceDescData, Metadata, MetadataData, PacketHeader, PacketType, ServiceDesc,
    ServiceDescData, U32be, MAX_DATAGRAM,
};
use lantern_core::tlv::chunks;
use lantern_store::{ServiceList, SsidBinding};

use crate::cache::{DescriptionCache, MetadataCache};

const HEADER_LEN: usize = std::mem::size_of::<PacketHeader>();

/// A shape-checked request, extracted from a peeked datagram.
#[derive(Debug, PartialEq, Eq)]
enum Request {
    Metadata { seq: u32 },
    ServiceDesc { seq: u32, positions: Vec<u8> },
    /// Well-formed but answered elsewhere (or not at all).
    Ignored,
    /// Malformed or unknown; pulled and dropped.
    Discarded,
}

/// Decides what to do with a datagram without consuming it.
fn classify(datagram: &[u8]) -> Request {
    let Some(header) = PacketHeader::read_from_prefix(datagram) else {
        return Request::Discarded;
    };
    let seq = header.seq.get();

    let Ok(packet_type) = PacketType::try_from(header.packet_type.get()) else {
        return Request::Discarded;
    };

    // Every known type must at least reach its fixed size before the
    // variable part (if any) is looked at.
    let fixed_size = match packet_type {
        PacketType::GetMetadata => HEADER_LEN,
        PacketType::MetadataData => HEADER_LEN + 8,
        _ => HEADER_LEN + 4,
    };
    if datagram.len() < fixed_size {
        return Request::Discarded;
    }

    match packet_type {
        PacketType::GetMetadata => Request::Metadata { seq },
        PacketType::GetServiceDescData => {
            let Some(packet) = GetServiceDescData::read_from_prefix(datagram) else {
                return Request::Discarded;
            };
            let count = packet.count.get() as usize;
            let body = &datagram[std::mem::size_of::<GetServiceDescData>()..];
            if body.len() < count {
                return Request::Discarded;
            }
            Request::ServiceDesc {
                seq,
                positions: body[..count].to_vec(),
            }
        }
        // The positions travel in the companion _DATA datagram carrying
        // the same seq; the announce itself needs no reply.
        PacketType::GetServiceDesc => Request::Ignored,
        // Reply types addressed to us make no sense; drop them quietly.
        PacketType::Metadata
        | PacketType::MetadataData
        | PacketType::ServiceDesc
        | PacketType::ServiceDescData => Request::Ignored,
    }
}

/// The SDE responder: one UDP socket, a read handle on the service list,
/// and the two reply caches.
pub struct Responder {
    socket: UdpSocket,
    db_path: PathBuf,
    ssid: Arc<dyn SsidBinding>,
    reader: ServiceList,
    metadata: MetadataCache,
    descriptions: DescriptionCache,
    buf: Vec<u8>,
}

impl Responder {
    /// Binds the responder socket and attaches to the service list store.
    pub async fn bind(
        port: u16,
        db_path: PathBuf,
        ssid: Arc<dyn SsidBinding>,
    ) -> Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", port))
            .await
            .with_context(|| format!("cannot bind SDE socket on port {port}"))?;
        let reader = ServiceList::open(&db_path, Arc::clone(&ssid))
            .context("cannot open the service list store")?;

        Ok(Self {
            socket,
            db_path,
            ssid,
            reader,
            metadata: MetadataCache::new(),
            descriptions: DescriptionCache::new(),
            buf: vec![0u8; MAX_DATAGRAM],
        })
    }

    /// The bound address — the port is OS-assigned when bound with 0.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Serves requests until `shutdown` flips to true.
    ///
    /// The stop flag is checked at the top of every iteration; a blocking
    /// receive is interrupted by the shutdown notification, so the loop
    /// winds down promptly without a pending datagram.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        tracing::info!(addr = %self.local_addr()?, "sde responder listening");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let peeked = tokio::select! {
                _ = shutdown.changed() => continue,
                r = self.socket.peek_from(&mut self.buf) => r,
            };
            let len = match peeked {
                Ok((len, _)) => len,
                Err(e) => {
                    tracing::warn!(error = %e, "peek failed");
                    continue;
                }
            };

            let request = classify(&self.buf[..len]);

            // Consume the datagram we just classified. Nothing else reads
            // this socket, so the pull returns the peeked datagram.
            let peer = match self.socket.recv_from(&mut self.buf).await {
                Ok((_, peer)) => peer,
                Err(e) => {
                    tracing::warn!(error = %e, "recv failed");
                    continue;
                }
            };

            match request {
                Request::Metadata { seq } => {
                    if let Err(e) = self.send_metadata(peer, seq).await {
                        tracing::warn!(error = %e, %peer, "metadata reply failed");
                    }
                }
                Request::ServiceDesc { seq, positions } => {
                    if let Err(e) = self.send_service_desc(peer, seq, positions).await {
                        tracing::warn!(error = %e, %peer, "service description reply failed");
                    }
                }
                Request::Ignored => {}
                Request::Discarded => {
                    tracing::debug!(%peer, len, "discarded malformed datagram");
                }
            }
        }

        tracing::info!("sde responder stopped");
        Ok(())
    }

    /// Replies to `GET_METADATA`: `METADATA{count}` then
    /// `METADATA_DATA{count, timestamps}`.
    async fn send_metadata(&mut self, peer: SocketAddr, seq: u32) -> Result<()> {
        self.refresh_metadata()?;
        let count = self.metadata.count();

        let announce = Metadata {
            header: PacketHeader::new(PacketType::Metadata, seq),
            count: U32be::new(count),
        };
        self.socket.send_to(announce.as_bytes(), peer).await?;

        let mut data = Vec::with_capacity(
            std::mem::size_of::<MetadataData>() + self.metadata.timestamps().len(),
        );
        data.extend_from_slice(
            MetadataData {
                header: PacketHeader::new(PacketType::MetadataData, seq),
                count: U32be::new(count),
                unused: U32be::new(0),
            }
            .as_bytes(),
        );
        data.extend_from_slice(self.metadata.timestamps());
        self.socket.send_to(&data, peer).await?;

        tracing::debug!(%peer, seq, count, "metadata served");
        Ok(())
    }

    /// Replies to `GET_SERVICE_DESC_DATA`: `SERVICE_DESC{size}` then
    /// `SERVICE_DESC_DATA{size, chunks}`.
    ///
    /// Positions are sorted ascending in place and the cached blob is
    /// walked exactly once, copying each selected `DESCRIPTION` chunk
    /// verbatim. Positions past the end of the list select nothing.
    async fn send_service_desc(
        &mut self,
        peer: SocketAddr,
        seq: u32,
        mut positions: Vec<u8>,
    ) -> Result<()> {
        self.refresh_descriptions()?;
        positions.sort_unstable();

        let mut payload = Vec::new();
        let mut wanted = positions.iter().peekable();
        for (ordinal, chunk) in chunks(self.descriptions.blob()).enumerate() {
            while wanted.next_if(|&&p| p as usize == ordinal).is_some() {
                payload.extend_from_slice(chunk.raw);
            }
        }

        let size = payload.len() as u32;
        let announce = ServiceDesc {
            header: PacketHeader::new(PacketType::ServiceDesc, seq),
            size: U32be::new(size),
        };
        self.socket.send_to(announce.as_bytes(), peer).await?;

        let mut data =
            Vec::with_capacity(std::mem::size_of::<ServiceDescData>() + payload.len());
        data.extend_from_slice(
            ServiceDescData {
                header: PacketHeader::new(PacketType::ServiceDescData, seq),
                size: U32be::new(size),
            }
            .as_bytes(),
        );
        data.extend_from_slice(&payload);
        self.socket.send_to(&data, peer).await?;

        tracing::debug!(%peer, seq, requested = positions.len(), size, "descriptions served");
        Ok(())
    }

    fn refresh_metadata(&mut self) -> Result<()> {
        let tag = self.reader.last_published_mod_time()?;
        if self.metadata.is_fresh(tag) {
            return Ok(());
        }
        let mut snapshot = self.snapshot()?;
        self.metadata.rebuild(tag, &mut snapshot)?;
        Ok(())
    }

    fn refresh_descriptions(&mut self) -> Result<()> {
        let tag = self.reader.last_published_mod_time()?;
        if self.descriptions.is_fresh(tag) {
            return Ok(());
        }
        let mut snapshot = self.snapshot()?;
        self.descriptions.rebuild(tag, &mut snapshot)?;
        Ok(())
    }

    /// A fresh handle whose first read freezes the published list, so a
    /// rebuild never sees a half-committed state.
    fn snapshot(&self) -> Result<ServiceList> {
        Ok(ServiceList::open(&self.db_path, Arc::clone(&self.ssid))?)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
