//! Store error types.

use crate::ssid::SSID_MAX_LEN;

/// Errors reported by the service list store.
///
/// `SsidTooLong` and `InvalidServicePos` are commit-time validation
/// failures: the shadow copy is left intact so the caller can edit and
/// retry. `Save` means a lower layer failed during publication after
/// best-effort rollback; the published copy is unchanged.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("the advertised service set does not fit in a {SSID_MAX_LEN}-byte SSID")]
    SsidTooLong,

    #[error("service positions are not contiguous at position {0}")]
    InvalidServicePos(u32),

    #[error("a service URI is required")]
    UriRequired,

    #[error("position {idx} is outside the service list of {count} entries")]
    IndexOutOfRange { idx: u32, count: u32 },

    #[error("failed to save the service list: {0}")]
    Save(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}
