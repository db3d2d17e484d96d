//! StripeFS Client - Internal RPC clients
//!
//! This crate provides gRPC clients for the MDS and OST services plus the
//! chunk-routing helpers used by external collaborators (volume plugin,
//! workload generator, dashboards).

pub mod mds;
pub mod ost;
pub mod stripe;

// Re-exports
pub use mds::MdsClient;
pub use ost::OstClient;
pub use stripe::{read_striped, write_striped};
