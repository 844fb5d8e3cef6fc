use async_trait::async_trait;
use bytes::Bytes;
use cid::Cid;

pub type StoreResult<T, E = anyhow::Error> = std::result::Result<T, E>;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("block not found: {0}")]
    NotFound(Cid),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Content-addressed block persistence.
///
/// Blocks are identified by their multihash: a block written under a CIDv0
/// can be read back with the CIDv1 of the same content and vice versa.
#[async_trait]
pub trait Blockstore: std::fmt::Debug + Send + Sync + 'static {
    /// Stores `block` under `cid`. Writing an existing block is a no-op.
    async fn put(&self, cid: &Cid, block: Bytes) -> StoreResult<()>;

    /// Returns the block stored under `cid`, or [`StoreError::NotFound`].
    async fn get(&self, cid: &Cid) -> StoreResult<Bytes>;

    async fn has(&self, cid: &Cid) -> StoreResult<bool>;

    /// Removes the block stored under `cid`. Missing blocks are ignored.
    async fn delete(&self, cid: &Cid) -> StoreResult<()>;

    /// Returns the CIDs of all stored blocks, in no particular order.
    async fn list(&self) -> StoreResult<Vec<Cid>>;
}
