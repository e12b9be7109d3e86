//! lantern-ctl — diagnostic SDE client. The library half carries the
//! protocol exchanges so the integration tests can drive a responder the
//! same way the CLI does.

pub mod client;

pub use client::{parse_descriptions, SdeClient, ServiceDescription};
