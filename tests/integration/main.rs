//! Lantern integration test harness.
//!
//! These tests exercise the real pieces end to end: a ServiceList over a
//! scratch database file, an in-process SDE responder on an ephemeral UDP
//! port, and the publish path's decode/apply pipeline. Nothing here needs
//! root or a radio — the SSID binding is the in-memory stand-in, shared
//! between handles exactly the way the driver would be.
//!
//!   cargo test --test integration

use std::path::PathBuf;
use std::sync::Arc;

use lantern_store::{MemorySsid, ServiceDraft, ServiceList, SsidBinding};
use tempfile::TempDir;

mod publish;
mod sde;
mod store;

// ── Shared fixtures ──────────────────────────────────────────────────────────

/// A scratch store: one database file and one shared SSID binding, like a
/// single access point with several processes attached.
pub struct TestStore {
    pub dir: TempDir,
    pub ssid: Arc<MemorySsid>,
}

impl TestStore {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("cannot create scratch dir"),
            ssid: Arc::new(MemorySsid::new()),
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("service_list.db")
    }

    /// A fresh handle, as another process would obtain one.
    pub fn open(&self) -> ServiceList {
        ServiceList::open(
            self.db_path(),
            Arc::clone(&self.ssid) as Arc<dyn SsidBinding>,
        )
        .expect("cannot open service list")
    }

    pub fn advertised(&self) -> Vec<u8> {
        self.ssid.get_ssid().expect("cannot read ssid")
    }
}

pub fn draft(cat_id: u32, uri: &str) -> ServiceDraft {
    ServiceDraft::new(cat_id, uri).expect("valid draft")
}

/// The canonical three-service catalog used across the scenarios; its
/// advertisement is `##^1^2,service2^3`.
pub fn seed_catalog(list: &mut ServiceList) {
    list.add_last(&draft(1, "uri1").with_long_desc("service1"))
        .unwrap();
    list.add_last(
        &draft(2, "uri2")
            .with_desc("service2")
            .with_long_desc("service2"),
    )
    .unwrap();
    list.add_last(&draft(3, "uri3")).unwrap();
    list.commit().unwrap();
}
