//! Test utilities for `Blockstore` implementations and for code that drives
//! the collaborator traits.
//!
//! # Usage
//!
//! In your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! dagadd_core = { workspace = true, features = ["testutil"] }
//! ```
//!
//! In your test file:
//!
//! ```ignore
//! use dagadd_core::testutil::BlockstoreTests;
//!
//! #[tokio::test]
//! async fn test_my_store() {
//!     let store = MyStore::new(...);
//!     BlockstoreTests::new(&store).run_all().await.unwrap();
//! }
//! ```

use crate::content_id::{DAG_PB, RAW, cid_for_block, to_v1};
use crate::import::{CandidateStream, ImportedNode, Importer, ImporterOptions, NodeStream};
use crate::lock::{GcLock, LockGuard, RepoLock};
use crate::pins::{PinOptions, Pins};
use crate::preload::Preload;
use crate::store::{Blockstore, StoreError, StoreResult};
use crate::{HashAlg, UnixFsMeta};
use bytes::Bytes;
use cid::{Cid, Version};
use futures::StreamExt;
use rand::Rng;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Test suite for `Blockstore` implementations.
///
/// Runs a set of checks against the `Blockstore` trait contract. The store
/// is expected to start empty.
pub struct BlockstoreTests<'a, S> {
    store: &'a S,
}

impl<'a, S: Blockstore> BlockstoreTests<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Run all tests.
    pub async fn run_all(&self) -> StoreResult<()> {
        self.test_put_get().await?;
        self.test_has().await?;
        self.test_put_is_idempotent().await?;
        self.test_lookup_across_versions().await?;
        self.test_get_missing().await?;
        self.test_delete().await?;
        self.test_list().await?;

        self.cleanup().await?;
        Ok(())
    }

    /// Test basic put and get.
    pub async fn test_put_get(&self) -> StoreResult<()> {
        let block = Bytes::from_static(b"hello, world!");
        let cid = raw_cid(&block);

        self.store.put(&cid, block.clone()).await?;
        let retrieved = self.store.get(&cid).await?;
        assert_eq!(retrieved, block, "retrieved block should match original");

        let large = random_bytes(256 * 1024);
        let cid = raw_cid(&large);
        self.store.put(&cid, large.clone()).await?;
        assert_eq!(self.store.get(&cid).await?, large, "large block should match");

        Ok(())
    }

    /// Test existence checks.
    pub async fn test_has(&self) -> StoreResult<()> {
        let block = Bytes::from_static(b"has test");
        let cid = raw_cid(&block);

        assert!(
            !self.store.has(&cid).await?,
            "block should not exist before put"
        );
        self.store.put(&cid, block).await?;
        assert!(self.store.has(&cid).await?, "block should exist after put");

        Ok(())
    }

    /// Writing the same block twice keeps one copy.
    pub async fn test_put_is_idempotent(&self) -> StoreResult<()> {
        let block = Bytes::from_static(b"written twice");
        let cid = raw_cid(&block);

        self.store.put(&cid, block.clone()).await?;
        self.store.put(&cid, block.clone()).await?;

        let count = self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|c| c.hash() == cid.hash())
            .count();
        assert_eq!(count, 1, "duplicate puts should store one block");
        assert_eq!(self.store.get(&cid).await?, block);

        Ok(())
    }

    /// Blocks are addressed by multihash, not by CID version.
    pub async fn test_lookup_across_versions(&self) -> StoreResult<()> {
        let block = Bytes::from_static(b"dag-pb-ish block");
        let v0 = cid_for_block(Version::V0, DAG_PB, HashAlg::Sha2_256, &block);
        let v1 = to_v1(v0)?;

        self.store.put(&v0, block.clone()).await?;
        assert!(self.store.has(&v1).await?, "v1 lookup should find v0 block");
        assert_eq!(self.store.get(&v1).await?, block);

        Ok(())
    }

    /// Reading a missing block fails with `StoreError::NotFound`.
    pub async fn test_get_missing(&self) -> StoreResult<()> {
        let cid = raw_cid(b"never stored");
        let err = self
            .store
            .get(&cid)
            .await
            .expect_err("missing block should not be readable");
        assert!(
            matches!(err.downcast_ref::<StoreError>(), Some(StoreError::NotFound(_))),
            "missing block should be reported as NotFound, got {err:#}"
        );
        Ok(())
    }

    /// Test block deletion.
    pub async fn test_delete(&self) -> StoreResult<()> {
        let block = Bytes::from_static(b"to be deleted");
        let cid = raw_cid(&block);

        self.store.put(&cid, block).await?;
        assert!(self.store.has(&cid).await?, "block should exist before delete");

        self.store.delete(&cid).await?;
        assert!(
            !self.store.has(&cid).await?,
            "block should not exist after delete"
        );

        // Deleting again is not an error.
        self.store.delete(&cid).await?;
        Ok(())
    }

    /// Test block listing.
    pub async fn test_list(&self) -> StoreResult<()> {
        let blocks: [&[u8]; 3] = [b"list a", b"list b", b"list c"];
        let mut expected = HashSet::new();

        for block in blocks {
            let cid = raw_cid(block);
            self.store.put(&cid, Bytes::copy_from_slice(block)).await?;
            expected.insert(cid.hash().to_bytes());
        }

        let found: HashSet<Vec<u8>> = self
            .store
            .list()
            .await?
            .iter()
            .map(|c| c.hash().to_bytes())
            .collect();

        for key in &expected {
            assert!(found.contains(key), "list should contain every stored block");
        }
        Ok(())
    }

    /// Delete everything the suite wrote.
    pub async fn cleanup(&self) -> StoreResult<()> {
        for cid in self.store.list().await? {
            let _ = self.store.delete(&cid).await;
        }
        Ok(())
    }
}

/// CIDv1 of `data` as a raw block.
pub fn raw_cid(data: &[u8]) -> Cid {
    cid_for_block(Version::V1, RAW, HashAlg::Sha2_256, data)
}

/// CIDv0 of `data` as if it were a dag-pb block.
pub fn pb_cid(data: &[u8]) -> Cid {
    cid_for_block(Version::V0, DAG_PB, HashAlg::Sha2_256, data)
}

/// Generate random bytes for testing.
pub fn random_bytes(len: usize) -> Bytes {
    let mut data = vec![0u8; len];
    rand::rng().fill(&mut data[..]);
    Bytes::from(data)
}

// --- Pipeline doubles ---

/// `GcLock` that counts acquisitions and releases.
#[derive(Debug, Clone, Default)]
pub struct CountingLock {
    inner: RepoLock,
    read_acquired: Arc<AtomicUsize>,
    read_released: Arc<AtomicUsize>,
    write_acquired: Arc<AtomicUsize>,
}

impl CountingLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_acquired(&self) -> usize {
        self.read_acquired.load(Ordering::SeqCst)
    }

    pub fn read_released(&self) -> usize {
        self.read_released.load(Ordering::SeqCst)
    }

    /// Read locks currently held.
    pub fn readers(&self) -> usize {
        self.read_acquired() - self.read_released()
    }

    pub fn write_acquired(&self) -> usize {
        self.write_acquired.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl GcLock for CountingLock {
    async fn read_lock(&self) -> LockGuard {
        let inner = self.inner.read_lock().await;
        self.read_acquired.fetch_add(1, Ordering::SeqCst);
        let released = self.read_released.clone();
        LockGuard::new(move || {
            inner.release();
            released.fetch_add(1, Ordering::SeqCst);
        })
    }

    async fn write_lock(&self) -> LockGuard {
        let inner = self.inner.write_lock().await;
        self.write_acquired.fetch_add(1, Ordering::SeqCst);
        LockGuard::new(move || inner.release())
    }
}

/// `Pins` that records every call and can be told to fail.
#[derive(Debug, Clone, Default)]
pub struct RecordingPins {
    calls: Arc<Mutex<Vec<(Cid, PinOptions)>>>,
    fail_on: Arc<Mutex<HashSet<Cid>>>,
}

impl RecordingPins {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `pin_add` fail for `cid`.
    pub fn fail_on(&self, cid: Cid) {
        self.fail_on.lock().unwrap().insert(cid);
    }

    /// CIDs passed to `pin_add`, in call order.
    pub fn pinned(&self) -> Vec<Cid> {
        self.calls.lock().unwrap().iter().map(|(c, _)| *c).collect()
    }

    /// Every `pin_add` call with its options.
    pub fn calls(&self) -> Vec<(Cid, PinOptions)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Pins for RecordingPins {
    async fn pin_add(&self, cid: Cid, options: PinOptions) -> anyhow::Result<()> {
        if self.fail_on.lock().unwrap().contains(&cid) {
            anyhow::bail!("pin store unavailable for {cid}");
        }
        self.calls.lock().unwrap().push((cid, options));
        Ok(())
    }

    async fn pin_rm(&self, cid: Cid, _options: PinOptions) -> anyhow::Result<bool> {
        let mut calls = self.calls.lock().unwrap();
        let before = calls.len();
        calls.retain(|(c, _)| *c != cid);
        Ok(calls.len() != before)
    }

    async fn is_pinned(&self, cid: &Cid) -> anyhow::Result<bool> {
        Ok(self.calls.lock().unwrap().iter().any(|(c, _)| c == cid))
    }

    async fn ls(&self) -> anyhow::Result<Vec<Cid>> {
        let mut cids = self.pinned();
        cids.sort();
        cids.dedup();
        Ok(cids)
    }
}

/// `Preload` that records the CIDs it was asked to preload.
#[derive(Debug, Clone, Default)]
pub struct RecordingPreload {
    cids: Arc<Mutex<Vec<Cid>>>,
}

impl RecordingPreload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn preloaded(&self) -> Vec<Cid> {
        self.cids.lock().unwrap().clone()
    }
}

impl Preload for RecordingPreload {
    fn preload(&self, cid: &Cid) {
        self.cids.lock().unwrap().push(*cid);
    }
}

/// One step of a [`ScriptedImporter`] run.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Emit this node.
    Node(ImportedNode),
    /// Report this many processed bytes through the progress callback.
    Progress(u64),
    /// Fail with this message.
    Fail(String),
}

/// `Importer` that ignores its input and plays back a fixed script.
#[derive(Debug, Clone, Default)]
pub struct ScriptedImporter {
    steps: Vec<ScriptStep>,
    options: Arc<Mutex<Option<ImporterOptions>>>,
    emitted: Arc<AtomicUsize>,
}

impl ScriptedImporter {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            steps,
            ..Default::default()
        }
    }

    /// Importer that emits `nodes` in order.
    pub fn nodes(nodes: Vec<ImportedNode>) -> Self {
        Self::new(nodes.into_iter().map(ScriptStep::Node).collect())
    }

    /// Options received by the last `import` call.
    pub fn last_options(&self) -> Option<ImporterOptions> {
        self.options.lock().unwrap().clone()
    }

    /// Number of nodes pulled out of the importer so far.
    pub fn emitted(&self) -> usize {
        self.emitted.load(Ordering::SeqCst)
    }
}

impl Importer for ScriptedImporter {
    fn import(
        &self,
        _source: CandidateStream,
        _store: Arc<dyn Blockstore>,
        options: ImporterOptions,
    ) -> NodeStream {
        let progress = options.progress.clone();
        *self.options.lock().unwrap() = Some(options);
        let emitted = self.emitted.clone();

        Box::pin(
            futures::stream::iter(self.steps.clone()).filter_map(move |step| {
                let item = match step {
                    ScriptStep::Node(node) => {
                        emitted.fetch_add(1, Ordering::SeqCst);
                        Some(Ok(node))
                    }
                    ScriptStep::Progress(bytes) => {
                        if let Some(progress) = &progress {
                            progress(bytes);
                        }
                        None
                    }
                    ScriptStep::Fail(message) => Some(Err(anyhow::anyhow!(message))),
                };
                futures::future::ready(item)
            }),
        )
    }
}

/// Builds an importer node with a CIDv0 derived from `path`.
pub fn node(path: &str) -> ImportedNode {
    ImportedNode {
        cid: pb_cid(format!("node:{path}").as_bytes()),
        path: path.to_owned(),
        size: 16,
        unixfs: None,
    }
}

/// Like [`node`], with UnixFS metadata.
pub fn node_with_meta(path: &str, meta: UnixFsMeta) -> ImportedNode {
    ImportedNode {
        unixfs: Some(meta),
        ..node(path)
    }
}
