//! Metadata gRPC service implementation

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tonic::{Request, Response, Status};

use stripefs_proto::metadata::{
    metadata_service_server::MetadataService, CreateRequest, CreateResponse, ListDirRequest,
    ListDirResponse, LookupRequest, LookupResponse, StatRequest, StatResponse, UnlinkRequest,
    UnlinkResponse,
};

use crate::namespace::{Namespace, NamespaceStats};

/// Per-method request counters.
#[derive(Debug, Default)]
pub struct MdsMethodMetrics {
    pub requests_total: AtomicU64,
    pub requests_error: AtomicU64,
    pub latency_sum_us: AtomicU64,
}

impl MdsMethodMetrics {
    fn record(&self, success: bool, latency_us: u64) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.requests_error.fetch_add(1, Ordering::Relaxed);
        }
        self.latency_sum_us.fetch_add(latency_us, Ordering::Relaxed);
    }
}

/// MDS request metrics, exported in Prometheus text format together with
/// namespace gauges.
#[derive(Debug, Default)]
pub struct MdsMetrics {
    pub create: MdsMethodMetrics,
    pub lookup: MdsMethodMetrics,
    pub stat: MdsMethodMetrics,
    pub list_dir: MdsMethodMetrics,
    pub unlink: MdsMethodMetrics,
}

impl MdsMetrics {
    pub fn export_prometheus(&self, stats: &NamespaceStats) -> String {
        let mut output = String::with_capacity(4 * 1024);

        let methods = [
            ("Create", &self.create),
            ("Lookup", &self.lookup),
            ("Stat", &self.stat),
            ("ListDir", &self.list_dir),
            ("Unlink", &self.unlink),
        ];

        let _ = writeln!(
            output,
            "# HELP stripefs_mds_requests_total Total MDS requests by method and status"
        );
        let _ = writeln!(output, "# TYPE stripefs_mds_requests_total counter");
        for (method, metrics) in &methods {
            let total = metrics.requests_total.load(Ordering::Relaxed);
            let error = metrics.requests_error.load(Ordering::Relaxed);
            let _ = writeln!(
                output,
                "stripefs_mds_requests_total{{method=\"{method}\",status=\"success\"}} {}",
                total - error
            );
            let _ = writeln!(
                output,
                "stripefs_mds_requests_total{{method=\"{method}\",status=\"error\"}} {error}"
            );
        }

        let _ = writeln!(
            output,
            "# HELP stripefs_mds_request_latency_seconds_sum Sum of MDS request latencies"
        );
        let _ = writeln!(output, "# TYPE stripefs_mds_request_latency_seconds_sum counter");
        for (method, metrics) in &methods {
            let sum_us = metrics.latency_sum_us.load(Ordering::Relaxed);
            let _ = writeln!(
                output,
                "stripefs_mds_request_latency_seconds_sum{{method=\"{method}\"}} {}",
                sum_us as f64 / 1_000_000.0
            );
        }

        let _ = writeln!(output, "# HELP stripefs_mds_inodes Inodes in the namespace");
        let _ = writeln!(output, "# TYPE stripefs_mds_inodes gauge");
        let _ = writeln!(output, "stripefs_mds_inodes {}", stats.inodes);

        let _ = writeln!(output, "# HELP stripefs_mds_dirents Directory entries in the namespace");
        let _ = writeln!(output, "# TYPE stripefs_mds_dirents gauge");
        let _ = writeln!(output, "stripefs_mds_dirents {}", stats.dirents);

        let _ = writeln!(
            output,
            "# HELP stripefs_mds_lease_wait_seconds_sum Time spent waiting for the namespace lease"
        );
        let _ = writeln!(output, "# TYPE stripefs_mds_lease_wait_seconds_sum counter");
        let _ = writeln!(
            output,
            "stripefs_mds_lease_wait_seconds_sum {}",
            stats.lease_wait_us as f64 / 1_000_000.0
        );
        let _ = writeln!(
            output,
            "# HELP stripefs_mds_lease_wait_count Lease acquisitions observed"
        );
        let _ = writeln!(output, "# TYPE stripefs_mds_lease_wait_count counter");
        let _ = writeln!(output, "stripefs_mds_lease_wait_count {}", stats.lease_waits);

        output
    }
}

/// gRPC front for one [`Namespace`].
pub struct MdsService {
    namespace: Arc<Namespace>,
    metrics: Arc<MdsMetrics>,
}

impl MdsService {
    pub fn new(namespace: Arc<Namespace>) -> Self {
        Self {
            namespace,
            metrics: Arc::new(MdsMetrics::default()),
        }
    }

    pub fn metrics(&self) -> &Arc<MdsMetrics> {
        &self.metrics
    }
}

#[tonic::async_trait]
impl MetadataService for MdsService {
    async fn create(
        &self,
        request: Request<CreateRequest>,
    ) -> Result<Response<CreateResponse>, Status> {
        let start = Instant::now();
        let req = request.into_inner();
        let result = self
            .namespace
            .create(&req.parent_inode_id, &req.name, req.is_dir, req.mode);
        self.metrics
            .create
            .record(result.is_ok(), start.elapsed().as_micros() as u64);
        let inode = result?;
        Ok(Response::new(CreateResponse { inode: Some(inode) }))
    }

    async fn lookup(
        &self,
        request: Request<LookupRequest>,
    ) -> Result<Response<LookupResponse>, Status> {
        let start = Instant::now();
        let req = request.into_inner();
        let result = self.namespace.lookup(&req.parent_inode_id, &req.name);
        self.metrics
            .lookup
            .record(result.is_ok(), start.elapsed().as_micros() as u64);
        let inode = result?;
        Ok(Response::new(LookupResponse { inode: Some(inode) }))
    }

    async fn stat(&self, request: Request<StatRequest>) -> Result<Response<StatResponse>, Status> {
        let start = Instant::now();
        let req = request.into_inner();
        let result = self.namespace.stat(&req.inode_id);
        self.metrics
            .stat
            .record(result.is_ok(), start.elapsed().as_micros() as u64);
        let inode = result?;
        Ok(Response::new(StatResponse { inode: Some(inode) }))
    }

    async fn list_dir(
        &self,
        request: Request<ListDirRequest>,
    ) -> Result<Response<ListDirResponse>, Status> {
        let start = Instant::now();
        let req = request.into_inner();
        let result = self.namespace.list_dir(&req.inode_id);
        self.metrics
            .list_dir
            .record(result.is_ok(), start.elapsed().as_micros() as u64);
        let entries = result?;
        Ok(Response::new(ListDirResponse { entries }))
    }

    async fn unlink(
        &self,
        request: Request<UnlinkRequest>,
    ) -> Result<Response<UnlinkResponse>, Status> {
        let start = Instant::now();
        let req = request.into_inner();
        let result = self.namespace.unlink(&req.parent_inode_id, &req.name);
        self.metrics
            .unlink
            .record(result.is_ok(), start.elapsed().as_micros() as u64);
        let deleted = result?;
        Ok(Response::new(UnlinkResponse { deleted }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::NamespaceConfig;
    use stripefs_common::ROOT_INODE_ID;
    use tempfile::tempdir;

    fn service(dir: &std::path::Path) -> MdsService {
        let ns = Namespace::open(NamespaceConfig::new(
            dir.join("mds.redb"),
            vec!["ost-0".to_string(), "ost-1".to_string(), "ost-2".to_string()],
        ))
        .unwrap();
        MdsService::new(Arc::new(ns))
    }

    #[tokio::test]
    async fn test_create_returns_inode_with_layout() {
        let dir = tempdir().unwrap();
        let svc = service(dir.path());

        let inode = svc
            .create(Request::new(CreateRequest {
                parent_inode_id: ROOT_INODE_ID.to_string(),
                name: "sample.bin".to_string(),
                is_dir: false,
                mode: 0o644,
            }))
            .await
            .unwrap()
            .into_inner()
            .inode
            .unwrap();

        let layout = inode.stripe_layout.unwrap();
        assert_eq!(layout.ost_ids.len(), 3);
        assert_eq!(layout.ost_ids[0], "ost-0");
    }

    #[tokio::test]
    async fn test_error_kinds_map_to_grpc_codes() {
        let dir = tempdir().unwrap();
        let svc = service(dir.path());

        let status = svc
            .create(Request::new(CreateRequest {
                parent_inode_id: String::new(),
                name: "x".to_string(),
                is_dir: false,
                mode: 0,
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);

        let status = svc
            .stat(Request::new(StatRequest {
                inode_id: "inode-missing".to_string(),
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::NotFound);
    }

    #[tokio::test]
    async fn test_unlink_absent_is_not_an_error() {
        let dir = tempdir().unwrap();
        let svc = service(dir.path());

        let resp = svc
            .unlink(Request::new(UnlinkRequest {
                parent_inode_id: ROOT_INODE_ID.to_string(),
                name: "ghost".to_string(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(!resp.deleted);
    }

    #[tokio::test]
    async fn test_metrics_export_after_requests() {
        let dir = tempdir().unwrap();
        let svc = service(dir.path());

        svc.create(Request::new(CreateRequest {
            parent_inode_id: ROOT_INODE_ID.to_string(),
            name: "f".to_string(),
            is_dir: false,
            mode: 0,
        }))
        .await
        .unwrap();
        svc.stat(Request::new(StatRequest {
            inode_id: "inode-missing".to_string(),
        }))
        .await
        .unwrap_err();

        let output = svc
            .metrics()
            .export_prometheus(&svc.namespace.stats());
        assert!(output.contains("stripefs_mds_requests_total{method=\"Create\",status=\"success\"} 1"));
        assert!(output.contains("stripefs_mds_requests_total{method=\"Stat\",status=\"error\"} 1"));
        assert!(output.contains("stripefs_mds_inodes 2"));
    }
}
