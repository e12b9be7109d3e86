//! lanternd — the SDE responder daemon. The library half exposes the
//! responder and its caches so the integration tests can drive an
//! in-process instance on an ephemeral port.

pub mod cache;
pub mod responder;

pub use responder::Responder;
