//! OST gRPC service implementation

use std::sync::Arc;

use tonic::{Request, Response, Status};

use stripefs_proto::storage::{
    object_storage_service_server::ObjectStorageService, BlockRef, DeleteBlockRequest,
    DeleteBlockResponse, HealthRequest, HealthResponse, ReadBlockRequest, ReadBlockResponse,
    WriteBlockRequest, WriteBlockResponse,
};

use crate::engine::BlockEngine;

/// gRPC front for one [`BlockEngine`].
pub struct OstService {
    engine: Arc<BlockEngine>,
}

impl OstService {
    pub fn new(engine: Arc<BlockEngine>) -> Self {
        Self { engine }
    }
}

fn required_block(block: Option<BlockRef>) -> Result<BlockRef, Status> {
    block.ok_or_else(|| Status::invalid_argument("block is required"))
}

#[tonic::async_trait]
impl ObjectStorageService for OstService {
    async fn write_block(
        &self,
        request: Request<WriteBlockRequest>,
    ) -> Result<Response<WriteBlockResponse>, Status> {
        let req = request.into_inner();
        let block = required_block(req.block)?;
        let bytes_written = self
            .engine
            .write_block(&block.file_id, block.chunk_id, &req.data)?;
        Ok(Response::new(WriteBlockResponse { bytes_written }))
    }

    async fn read_block(
        &self,
        request: Request<ReadBlockRequest>,
    ) -> Result<Response<ReadBlockResponse>, Status> {
        let req = request.into_inner();
        let block = required_block(req.block)?;
        let data = self
            .engine
            .read_block(&block.file_id, block.chunk_id, req.offset, req.length)?;
        Ok(Response::new(ReadBlockResponse { data }))
    }

    async fn delete_block(
        &self,
        request: Request<DeleteBlockRequest>,
    ) -> Result<Response<DeleteBlockResponse>, Status> {
        let req = request.into_inner();
        let block = required_block(req.block)?;
        let deleted = self.engine.delete_block(&block.file_id, block.chunk_id)?;
        Ok(Response::new(DeleteBlockResponse { deleted }))
    }

    async fn get_health(
        &self,
        _request: Request<HealthRequest>,
    ) -> Result<Response<HealthResponse>, Status> {
        let health = self.engine.health();
        Ok(Response::new(HealthResponse {
            ost_id: health.ost_id,
            healthy: health.healthy,
            iops_total: health.iops_total,
            throughput_bytes: health.throughput_bytes,
        }))
    }
}
