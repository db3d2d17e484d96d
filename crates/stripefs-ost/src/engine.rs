//! OST block engine: block-granular I/O on a local data directory.
//!
//! Blocks live at `data_dir/<sanitized file_id>/<chunk_id>.blk`. The engine
//! never consults the MDS; a block either exists on disk or it does not.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use stripefs_common::{Error, Result};

use crate::metrics::OstMetrics;

/// Cumulative health counters returned by `GetHealth`.
#[derive(Debug, Clone)]
pub struct HealthSnapshot {
    pub ost_id: String,
    pub healthy: bool,
    pub iops_total: u64,
    pub throughput_bytes: u64,
}

pub struct BlockEngine {
    ost_id: String,
    data_dir: PathBuf,
    metrics: Arc<OstMetrics>,
}

impl BlockEngine {
    /// Create an engine owning `data_dir` exclusively, creating it if absent.
    pub fn new(ost_id: impl Into<String>, data_dir: impl Into<PathBuf>) -> Result<Self> {
        let ost_id = ost_id.into();
        let data_dir = data_dir.into();
        if ost_id.is_empty() {
            return Err(Error::invalid_argument("ost id is required"));
        }
        if data_dir.as_os_str().is_empty() {
            return Err(Error::invalid_argument("data dir is required"));
        }
        fs::create_dir_all(&data_dir)?;
        Ok(Self {
            ost_id,
            data_dir,
            metrics: Arc::new(OstMetrics::default()),
        })
    }

    pub fn ost_id(&self) -> &str {
        &self.ost_id
    }

    pub fn metrics(&self) -> &Arc<OstMetrics> {
        &self.metrics
    }

    /// Write `data` as the entire contents of the block, replacing any
    /// prior contents. Creates the parent directory on first write.
    pub fn write_block(&self, file_id: &str, chunk_id: u64, data: &[u8]) -> Result<u64> {
        let start = Instant::now();
        let result = self.write_block_inner(file_id, chunk_id, data);
        let bytes = if result.is_ok() { data.len() as u64 } else { 0 };
        self.metrics.record_write(bytes, start.elapsed());
        result
    }

    fn write_block_inner(&self, file_id: &str, chunk_id: u64, data: &[u8]) -> Result<u64> {
        let path = self.block_path(file_id, chunk_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, data)?;
        debug!(ost_id = %self.ost_id, file_id, chunk_id, bytes = data.len(), "wrote block");
        Ok(data.len() as u64)
    }

    /// Read `[offset, offset + length)` of a block. `length == 0` reads to
    /// the end; an offset at or past the end yields an empty buffer.
    pub fn read_block(&self, file_id: &str, chunk_id: u64, offset: u64, length: u64) -> Result<Vec<u8>> {
        let result = self.read_block_inner(file_id, chunk_id, offset, length);
        let served = result.as_ref().map(|data| data.len() as u64).unwrap_or(0);
        self.metrics.record_read(served);
        result
    }

    fn read_block_inner(&self, file_id: &str, chunk_id: u64, offset: u64, length: u64) -> Result<Vec<u8>> {
        let path = self.block_path(file_id, chunk_id);
        let mut blob = match fs::read(&path) {
            Ok(blob) => blob,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(Error::not_found(format!(
                    "block {file_id}/{chunk_id} not found"
                )));
            }
            Err(err) => return Err(err.into()),
        };

        if offset >= blob.len() as u64 {
            return Ok(Vec::new());
        }
        let mut data = blob.split_off(offset as usize);
        if length > 0 && (length as usize) < data.len() {
            data.truncate(length as usize);
        }
        Ok(data)
    }

    /// Remove a block. Returns `false` (not an error) when it was absent.
    pub fn delete_block(&self, file_id: &str, chunk_id: u64) -> Result<bool> {
        self.metrics.record_delete();
        let path = self.block_path(file_id, chunk_id);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(ost_id = %self.ost_id, file_id, chunk_id, "deleted block");
                Ok(true)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    pub fn health(&self) -> HealthSnapshot {
        HealthSnapshot {
            ost_id: self.ost_id.clone(),
            healthy: true,
            iops_total: self.metrics.iops_total(),
            throughput_bytes: self.metrics.throughput_bytes(),
        }
    }

    fn block_path(&self, file_id: &str, chunk_id: u64) -> PathBuf {
        self.data_dir
            .join(sanitize(file_id))
            .join(format!("{chunk_id}.blk"))
    }
}

/// Strip path traversal out of a caller-supplied file id so it cannot name
/// anything outside the data directory.
fn sanitize(file_id: &str) -> String {
    let cleaned = file_id.trim().replace('/', "_").replace("..", "_");
    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned
    }
}
