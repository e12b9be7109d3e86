//! lantern-core — shared wire types: the TLV codec, the SDE packet
//! structures, and workspace configuration. All other Lantern crates
//! depend on this one.

pub mod config;
pub mod sde;
pub mod tlv;

pub use config::LanternConfig;
