//! Striped file I/O across a set of OSTs.
//!
//! Chunk `k` of a file lives on `layout.ost_ids[k % N]`. Writes slice the
//! buffer into stripe-size chunks; reads pull chunks in order until a short
//! or missing chunk marks the end of the file. The MDS does not track file
//! sizes, so the chunk chain is the only length authority.

use std::collections::HashMap;

use tonic::{Code, Status};

use stripefs_common::ost_for_chunk;
use stripefs_proto::metadata::StripeLayout;

use crate::ost::OstClient;

fn client_for<'a>(
    osts: &'a mut HashMap<String, OstClient>,
    layout: &StripeLayout,
    chunk_id: u64,
) -> Result<&'a mut OstClient, Status> {
    let ost_id = ost_for_chunk(&layout.ost_ids, chunk_id)
        .ok_or_else(|| Status::failed_precondition("stripe layout has no OSTs"))?;
    osts.get_mut(ost_id)
        .ok_or_else(|| Status::failed_precondition(format!("no client for {ost_id}")))
}

/// Write `data` as the full contents of `file_id`, one block per stripe
/// chunk. Returns the number of bytes written.
pub async fn write_striped(
    osts: &mut HashMap<String, OstClient>,
    layout: &StripeLayout,
    file_id: &str,
    data: &[u8],
) -> Result<u64, Status> {
    if layout.stripe_size_bytes == 0 {
        return Err(Status::failed_precondition("stripe size is zero"));
    }
    let stripe = layout.stripe_size_bytes as usize;
    let mut written = 0u64;
    for (chunk_id, chunk) in data.chunks(stripe).enumerate() {
        let client = client_for(osts, layout, chunk_id as u64)?;
        written += client
            .write_block(file_id, chunk_id as u64, chunk.to_vec())
            .await?;
    }
    Ok(written)
}

/// Read the full contents of `file_id` chunk by chunk. The chain ends at
/// the first missing chunk or the first chunk shorter than the stripe size.
pub async fn read_striped(
    osts: &mut HashMap<String, OstClient>,
    layout: &StripeLayout,
    file_id: &str,
) -> Result<Vec<u8>, Status> {
    if layout.stripe_size_bytes == 0 {
        return Err(Status::failed_precondition("stripe size is zero"));
    }
    let stripe = layout.stripe_size_bytes as usize;
    let mut data = Vec::new();
    for chunk_id in 0u64.. {
        let client = client_for(osts, layout, chunk_id)?;
        let chunk = match client.read_block(file_id, chunk_id, 0, 0).await {
            Ok(chunk) => chunk,
            Err(status) if status.code() == Code::NotFound => break,
            Err(status) => return Err(status),
        };
        let len = chunk.len();
        data.extend_from_slice(&chunk);
        if len < stripe {
            break;
        }
    }
    Ok(data)
}
