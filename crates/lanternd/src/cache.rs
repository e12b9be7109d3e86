//! Reply caches keyed on the service list's last publication time.
//!
//! The responder serves two derived artifacts: the packed metadata
//! timestamps and the concatenated `DESCRIPTION` TLV blob. Both are cheap
//! to rebuild but hot on the reply path, so each one remembers the list
//! `mod_time` it was built from and is rebuilt only when the published
//! list has moved on. Invalidation is by value, never by handle identity —
//! any committed change bumps `mod_time` and both caches notice on the
//! next request that needs them.

use lantern_core::sde::ChunkType;
use lantern_core::tlv::TlvWriter;
use lantern_store::{Service, ServiceList, StoreError};

/// Walks a snapshot handle in position order.
fn snapshot_services(list: &mut ServiceList) -> Result<Vec<Service>, StoreError> {
    let mut services = Vec::with_capacity(list.count()? as usize);
    let mut pos = 0;
    while let Some(service) = list.get(pos)? {
        services.push(service);
        pos += 1;
    }
    Ok(services)
}

// ── Metadata ─────────────────────────────────────────────────────────────────

/// Big-endian `mod_time` of every published service, packed in position
/// order — the body of a `METADATA_DATA` packet.
#[derive(Debug, Default)]
pub struct MetadataCache {
    tag: Option<u64>,
    count: u32,
    timestamps: Vec<u8>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_fresh(&self, tag: u64) -> bool {
        self.tag == Some(tag)
    }

    pub fn rebuild(&mut self, tag: u64, list: &mut ServiceList) -> Result<(), StoreError> {
        let services = snapshot_services(list)?;
        self.count = services.len() as u32;
        self.timestamps.clear();
        for service in &services {
            self.timestamps
                .extend_from_slice(&service.mod_time.to_be_bytes());
        }
        self.tag = Some(tag);
        tracing::debug!(tag, count = self.count, "metadata cache rebuilt");
        Ok(())
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn timestamps(&self) -> &[u8] {
        &self.timestamps
    }
}

// ── Descriptions ─────────────────────────────────────────────────────────────

/// Concatenated `DESCRIPTION` chunks for every published service, in
/// position order. A reply picks whole chunks out of this blob verbatim.
#[derive(Debug, Default)]
pub struct DescriptionCache {
    tag: Option<u64>,
    blob: Vec<u8>,
}

impl DescriptionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_fresh(&self, tag: u64) -> bool {
        self.tag == Some(tag)
    }

    pub fn rebuild(&mut self, tag: u64, list: &mut ServiceList) -> Result<(), StoreError> {
        let services = snapshot_services(list)?;
        let mut blob = TlvWriter::new();
        for service in &services {
            blob.append(
                ChunkType::Description.into(),
                describe(service).as_bytes(),
            );
        }
        self.blob = blob.into_bytes();
        self.tag = Some(tag);
        tracing::debug!(tag, bytes = self.blob.len(), "description cache rebuilt");
        Ok(())
    }

    pub fn blob(&self) -> &[u8] {
        &self.blob
    }
}

/// Serialises one service into the nested chunk sequence carried by a
/// `DESCRIPTION` chunk. Integer values are network byte order so an
/// aligned reader can lift them out of the value area directly.
fn describe(service: &Service) -> TlvWriter {
    let mut inner = TlvWriter::new();
    inner
        .append(ChunkType::ServicePos.into(), &[service.pos as u8])
        .append(ChunkType::ServiceTs.into(), &service.mod_time.to_be_bytes())
        .append(
            ChunkType::ServiceCatId.into(),
            &service.cat_id.to_be_bytes(),
        );
    if let Some(desc) = &service.desc {
        inner.append(ChunkType::ServiceShortDesc.into(), desc.as_bytes());
    }
    if let Some(long_desc) = &service.long_desc {
        inner.append(ChunkType::ServiceLongDesc.into(), long_desc.as_bytes());
    }
    inner.append(ChunkType::ServiceUri.into(), service.uri.as_bytes());
    inner
}

// ── Tests ────────────────────────────────────────────────────────────────────
