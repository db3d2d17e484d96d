//! StripeFS MDS - Metadata Service
//!
//! The namespace engine: inode allocation, directory entries, stripe-layout
//! assignment, and crash-consistent persistence in an embedded Redb store.
//! Reads are served from an in-memory projection rebuilt at startup; every
//! mutation commits its durable transaction before the projection changes.

pub mod namespace;
pub mod service;
pub mod store;
pub mod tables;

pub use namespace::{Namespace, NamespaceConfig, NamespaceStats};
pub use service::{MdsMetrics, MdsService};
pub use store::{DirentRow, NamespaceStore};
