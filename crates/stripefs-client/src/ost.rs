//! Object storage (OST) client

use tonic::transport::Channel;
use tonic::Status;

use stripefs_proto::storage::{
    object_storage_service_client::ObjectStorageServiceClient, BlockRef, DeleteBlockRequest,
    HealthRequest, HealthResponse, ReadBlockRequest, WriteBlockRequest,
};

/// Typed client for one OST.
pub struct OstClient {
    ost_id: String,
    inner: ObjectStorageServiceClient<Channel>,
}

impl OstClient {
    /// Connect to an OST endpoint, e.g. `http://127.0.0.1:50061`.
    pub async fn connect(
        ost_id: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Result<Self, tonic::transport::Error> {
        let inner = ObjectStorageServiceClient::connect(endpoint.into()).await?;
        Ok(Self {
            ost_id: ost_id.into(),
            inner,
        })
    }

    pub fn ost_id(&self) -> &str {
        &self.ost_id
    }

    fn block_ref(&self, file_id: &str, chunk_id: u64) -> BlockRef {
        BlockRef {
            file_id: file_id.to_string(),
            chunk_id,
            ost_id: self.ost_id.clone(),
        }
    }

    pub async fn write_block(
        &mut self,
        file_id: &str,
        chunk_id: u64,
        data: Vec<u8>,
    ) -> Result<u64, Status> {
        let resp = self
            .inner
            .write_block(WriteBlockRequest {
                block: Some(self.block_ref(file_id, chunk_id)),
                data,
            })
            .await?
            .into_inner();
        Ok(resp.bytes_written)
    }

    /// Read `[offset, offset + length)` of a block; `length == 0` reads to
    /// the end.
    pub async fn read_block(
        &mut self,
        file_id: &str,
        chunk_id: u64,
        offset: u64,
        length: u64,
    ) -> Result<Vec<u8>, Status> {
        let resp = self
            .inner
            .read_block(ReadBlockRequest {
                block: Some(self.block_ref(file_id, chunk_id)),
                offset,
                length,
            })
            .await?
            .into_inner();
        Ok(resp.data)
    }

    pub async fn delete_block(&mut self, file_id: &str, chunk_id: u64) -> Result<bool, Status> {
        let resp = self
            .inner
            .delete_block(DeleteBlockRequest {
                block: Some(self.block_ref(file_id, chunk_id)),
            })
            .await?
            .into_inner();
        Ok(resp.deleted)
    }

    pub async fn get_health(&mut self) -> Result<HealthResponse, Status> {
        let resp = self.inner.get_health(HealthRequest {}).await?.into_inner();
        Ok(resp)
    }
}
