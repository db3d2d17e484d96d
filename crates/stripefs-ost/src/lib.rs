//! StripeFS OST - Object Storage Target
//!
//! The block engine stores opaque, independently addressed blocks under a
//! local data directory and serves them over gRPC. It has no knowledge of
//! the MDS namespace.

pub mod engine;
pub mod metrics;
pub mod service;

pub use engine::{BlockEngine, HealthSnapshot};
pub use metrics::{LatencyHistogram, OstMetrics};
pub use service::OstService;
