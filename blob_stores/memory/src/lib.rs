use bytes::Bytes;
use dagadd_core::content_id::block_key;
use dagadd_core::{Blockstore, Cid, StoreError, StoreResult};
use dashmap::DashMap;

/// Block store that keeps everything in memory.
///
/// Blocks are keyed by multihash, so a block written under a CIDv0 is found
/// under the CIDv1 of the same content.
#[derive(Debug)]
pub struct MemoryBlockstore {
    blocks: DashMap<Vec<u8>, (Cid, Bytes)>,
}

impl MemoryBlockstore {
    /// Creates a new, empty `MemoryBlockstore`.
    pub fn new() -> Self {
        Self {
            blocks: DashMap::new(),
        }
    }

    /// Number of stored blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

impl Default for MemoryBlockstore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Blockstore for MemoryBlockstore {
    async fn put(&self, cid: &Cid, block: Bytes) -> StoreResult<()> {
        self.blocks
            .entry(block_key(cid))
            .or_insert_with(|| (*cid, block));
        Ok(())
    }

    async fn get(&self, cid: &Cid) -> StoreResult<Bytes> {
        let entry = self
            .blocks
            .get(&block_key(cid))
            .ok_or(StoreError::NotFound(*cid))?;
        Ok(entry.1.clone())
    }

    async fn has(&self, cid: &Cid) -> StoreResult<bool> {
        Ok(self.blocks.contains_key(&block_key(cid)))
    }

    async fn delete(&self, cid: &Cid) -> StoreResult<()> {
        self.blocks.remove(&block_key(cid));
        Ok(())
    }

    async fn list(&self) -> StoreResult<Vec<Cid>> {
        Ok(self.blocks.iter().map(|entry| entry.value().0).collect())
    }
}
