//! Service record types.

use crate::error::StoreError;

/// A published service as read back from the list.
///
/// `pos` and `mod_time` are maintained by the store: `pos` is the 0-based
/// SSID advertisement order and `mod_time` is the commit wall-clock second
/// of the last change to the record's tuple (0 for a record that has never
/// been published).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub pos: u32,
    pub mod_time: u64,
    pub cat_id: u32,
    pub uri: String,
    pub desc: Option<String>,
    pub long_desc: Option<String>,
}

/// The writable tuple of a service, staged into a list before commit.
///
/// The URI is mandatory; both descriptions are optional. The short
/// description, when present, is advertised in the SSID next to the
/// category ID and therefore counts against the 32-byte cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDraft {
    cat_id: u32,
    uri: String,
    desc: Option<String>,
    long_desc: Option<String>,
}

impl ServiceDraft {
    /// Creates a draft. Fails with [`StoreError::UriRequired`] when the URI
    /// is empty.
    pub fn new(cat_id: u32, uri: impl Into<String>) -> Result<Self, StoreError> {
        let uri = uri.into();
        if uri.is_empty() {
            return Err(StoreError::UriRequired);
        }
        Ok(Self {
            cat_id,
            uri,
            desc: None,
            long_desc: None,
        })
    }

    pub fn with_desc(mut self, desc: impl Into<String>) -> Self {
        self.desc = Some(desc.into());
        self
    }

    pub fn with_long_desc(mut self, long_desc: impl Into<String>) -> Self {
        self.long_desc = Some(long_desc.into());
        self
    }

    pub fn cat_id(&self) -> u32 {
        self.cat_id
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn desc(&self) -> Option<&str> {
        self.desc.as_deref()
    }

    pub fn long_desc(&self) -> Option<&str> {
        self.long_desc.as_deref()
    }
}

impl From<&Service> for ServiceDraft {
    fn from(s: &Service) -> Self {
        Self {
            cat_id: s.cat_id,
            uri: s.uri.clone(),
            desc: s.desc.clone(),
            long_desc: s.long_desc.clone(),
        }
    }
}
