//! Metadata service client

use tonic::transport::Channel;
use tonic::Status;

use stripefs_proto::metadata::{
    metadata_service_client::MetadataServiceClient, CreateRequest, Inode, ListDirRequest,
    LookupRequest, StatRequest, UnlinkRequest,
};

/// Typed client for the MDS.
pub struct MdsClient {
    inner: MetadataServiceClient<Channel>,
}

impl MdsClient {
    /// Connect to an MDS endpoint, e.g. `http://127.0.0.1:50051`.
    pub async fn connect(endpoint: impl Into<String>) -> Result<Self, tonic::transport::Error> {
        let inner = MetadataServiceClient::connect(endpoint.into()).await?;
        Ok(Self { inner })
    }

    pub async fn create(
        &mut self,
        parent_inode_id: &str,
        name: &str,
        is_dir: bool,
        mode: u32,
    ) -> Result<Inode, Status> {
        let resp = self
            .inner
            .create(CreateRequest {
                parent_inode_id: parent_inode_id.to_string(),
                name: name.to_string(),
                is_dir,
                mode,
            })
            .await?
            .into_inner();
        resp.inode
            .ok_or_else(|| Status::internal("create response missing inode"))
    }

    pub async fn lookup(&mut self, parent_inode_id: &str, name: &str) -> Result<Inode, Status> {
        let resp = self
            .inner
            .lookup(LookupRequest {
                parent_inode_id: parent_inode_id.to_string(),
                name: name.to_string(),
            })
            .await?
            .into_inner();
        resp.inode
            .ok_or_else(|| Status::internal("lookup response missing inode"))
    }

    pub async fn stat(&mut self, inode_id: &str) -> Result<Inode, Status> {
        let resp = self
            .inner
            .stat(StatRequest {
                inode_id: inode_id.to_string(),
            })
            .await?
            .into_inner();
        resp.inode
            .ok_or_else(|| Status::internal("stat response missing inode"))
    }

    pub async fn list_dir(&mut self, inode_id: &str) -> Result<Vec<Inode>, Status> {
        let resp = self
            .inner
            .list_dir(ListDirRequest {
                inode_id: inode_id.to_string(),
            })
            .await?
            .into_inner();
        Ok(resp.entries)
    }

    pub async fn unlink(&mut self, parent_inode_id: &str, name: &str) -> Result<bool, Status> {
        let resp = self
            .inner
            .unlink(UnlinkRequest {
                parent_inode_id: parent_inode_id.to_string(),
                name: name.to_string(),
            })
            .await?
            .into_inner();
        Ok(resp.deleted)
    }
}
