//! lantern-store — the durable, ordered service list with shadow-copy
//! transactions, the SSID binding it publishes through, and the read-only
//! category lookup.

pub mod category;
pub mod error;
pub mod list;
pub mod service;
pub mod ssid;

pub use category::{Category, CategoryStore};
pub use error::StoreError;
pub use list::{ServiceList, SSID_PREFIX};
pub use service::{Service, ServiceDraft};
pub use ssid::{FileSsid, MemorySsid, SsidBinding, SsidError, WirelessSsid, SSID_MAX_LEN};
