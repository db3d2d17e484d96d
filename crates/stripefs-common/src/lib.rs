//! StripeFS Common - shared constants, helpers, and error types
//!
//! Everything here is used by both tiers (MDS and OST) or by their
//! clients; anything specific to one tier lives with that tier.

pub mod error;

pub use error::{Error, Result};

/// Reserved inode id of the root directory.
pub const ROOT_INODE_ID: &str = "root";

/// Permission bits substituted when a create request carries mode 0.
pub const DEFAULT_MODE: u32 = 0o644;

/// Default stripe size: 1 MiB.
pub const DEFAULT_STRIPE_SIZE_BYTES: u32 = 1024 * 1024;

/// OST that owns chunk `chunk_id` under the given stripe order.
///
/// Returns `None` only when the layout carries no OSTs (an MDS configured
/// without any targets).
pub fn ost_for_chunk(ost_ids: &[String], chunk_id: u64) -> Option<&str> {
    if ost_ids.is_empty() {
        return None;
    }
    let idx = (chunk_id % ost_ids.len() as u64) as usize;
    Some(ost_ids[idx].as_str())
}
