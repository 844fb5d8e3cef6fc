//! Reference UnixFS importer.
//!
//! Files are chunked, hashed and written as they are read from the
//! candidate stream, one file at a time. Directories are built once the
//! input is exhausted, deepest first, so every directory is emitted after
//! its children.

mod pb;

use anyhow::{Context, bail};
use bytes::{Bytes, BytesMut};
use dagadd_core::content_id::{DAG_PB, RAW, cid_for_block};
use dagadd_core::{
    Blockstore, CandidateStream, Chunker, Cid, Content, HashAlg, ImportCandidate, ImportedNode,
    Importer, ImporterOptions, Layout, NodeStream, ProgressFn, UnixFsMeta,
};
use futures::TryStreamExt;
use pb::{DataType, PbLink, pb_node, unixfs_data};
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Maximum number of links in one file node.
pub const MAX_LINKS: usize = 174;

/// Importer that builds balanced UnixFS DAGs without directory sharding.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatImporter;

impl FlatImporter {
    pub fn new() -> Self {
        Self
    }
}

impl Importer for FlatImporter {
    fn import(
        &self,
        source: CandidateStream,
        store: Arc<dyn Blockstore>,
        options: ImporterOptions,
    ) -> NodeStream {
        if options.layout == Layout::Trickle {
            tracing::debug!("flat importer: trickle layout requested, building balanced DAGs");
        }
        let state = ImportState {
            source,
            writer: BlockWriter {
                store,
                cid_version: options.cid_version,
                hash_alg: options.hash_alg,
                only_hash: options.only_hash,
            },
            options,
            dirs: BTreeMap::new(),
            pending_dirs: None,
        };
        Box::pin(futures::stream::try_unfold(state, ImportState::step))
    }
}

/// A built child, ready to be linked from its parent.
#[derive(Debug, Clone)]
struct Link {
    cid: Cid,
    /// Encoded size of the child's whole DAG.
    tsize: u64,
    /// File bytes below the child. Zero for directories.
    filesize: u64,
}

#[derive(Debug, Default)]
struct DirNode {
    links: BTreeMap<String, Link>,
    meta: UnixFsMeta,
}

struct BlockWriter {
    store: Arc<dyn Blockstore>,
    cid_version: cid::Version,
    hash_alg: HashAlg,
    only_hash: bool,
}

impl BlockWriter {
    async fn put(&self, codec: u64, block: Vec<u8>) -> anyhow::Result<Cid> {
        let cid = cid_for_block(self.cid_version, codec, self.hash_alg, &block);
        if !self.only_hash {
            self.store
                .put(&cid, Bytes::from(block))
                .await
                .with_context(|| format!("failed to store block {cid}"))?;
        }
        Ok(cid)
    }

    /// Writes a dag-pb node and returns its link.
    async fn pb(
        &self,
        links: &[(&str, &Link)],
        data: Vec<u8>,
        filesize: u64,
    ) -> anyhow::Result<Link> {
        let pb_links: Vec<PbLink<'_>> = links
            .iter()
            .map(|&(name, link)| PbLink {
                cid: &link.cid,
                name,
                tsize: link.tsize,
            })
            .collect();
        let block = pb_node(&pb_links, &data);
        let tsize = block.len() as u64 + links.iter().map(|(_, l)| l.tsize).sum::<u64>();
        let cid = self.put(DAG_PB, block).await?;
        Ok(Link {
            cid,
            tsize,
            filesize,
        })
    }

    async fn leaf(&self, chunk: Bytes, raw: bool, meta: UnixFsMeta) -> anyhow::Result<Link> {
        let filesize = chunk.len() as u64;
        if raw {
            let cid = self.put(RAW, chunk.to_vec()).await?;
            return Ok(Link {
                cid,
                tsize: filesize,
                filesize,
            });
        }
        let data = unixfs_data(DataType::File, &chunk, Some(filesize), &[], meta);
        self.pb(&[], data, filesize).await
    }
}

/// Chunks of one file on their way into a DAG.
struct FileBuilder<'a> {
    writer: &'a BlockWriter,
    raw_leaves: bool,
    progress: Option<&'a ProgressFn>,
    leaves: Vec<Link>,
    // The latest chunk is held back so that a single-chunk file can carry
    // its metadata in the leaf itself.
    held: Option<Bytes>,
}

impl<'a> FileBuilder<'a> {
    async fn push(&mut self, chunk: Bytes) -> anyhow::Result<()> {
        if let Some(progress) = self.progress {
            progress(chunk.len() as u64);
        }
        if let Some(prev) = self.held.replace(chunk) {
            let leaf = self
                .writer
                .leaf(prev, self.raw_leaves, UnixFsMeta::default())
                .await?;
            self.leaves.push(leaf);
        }
        Ok(())
    }

    async fn finish(mut self, meta: UnixFsMeta) -> anyhow::Result<Link> {
        let last = self.held.take().unwrap_or_default();
        if self.leaves.is_empty() {
            // Raw blocks have nowhere to keep metadata.
            let raw = self.raw_leaves && meta == UnixFsMeta::default();
            return self.writer.leaf(last, raw, meta).await;
        }
        let leaf = self
            .writer
            .leaf(last, self.raw_leaves, UnixFsMeta::default())
            .await?;
        self.leaves.push(leaf);

        let mut level = self.leaves;
        loop {
            let is_root = level.len() <= MAX_LINKS;
            let mut next = Vec::with_capacity(level.len().div_ceil(MAX_LINKS));
            for group in level.chunks(MAX_LINKS) {
                let filesize = group.iter().map(|l| l.filesize).sum();
                let blocksizes: Vec<u64> = group.iter().map(|l| l.filesize).collect();
                let node_meta = if is_root { meta } else { UnixFsMeta::default() };
                let data = unixfs_data(DataType::File, &[], Some(filesize), &blocksizes, node_meta);
                let links: Vec<(&str, &Link)> = group.iter().map(|l| ("", l)).collect();
                next.push(self.writer.pb(&links, data, filesize).await?);
            }
            if is_root {
                return next.pop().context("file tree has no root");
            }
            level = next;
        }
    }
}

struct ImportState {
    source: CandidateStream,
    writer: BlockWriter,
    options: ImporterOptions,
    dirs: BTreeMap<String, DirNode>,
    /// Directory paths still to build, set once the input is exhausted.
    /// Popped from the back: deepest first, the wrapper last.
    pending_dirs: Option<Vec<String>>,
}

impl ImportState {
    async fn step(mut self) -> anyhow::Result<Option<(ImportedNode, Self)>> {
        if self.pending_dirs.is_none() {
            while let Some(candidate) = self.source.try_next().await? {
                if let Some(node) = self.import_candidate(candidate).await? {
                    return Ok(Some((node, self)));
                }
            }
            self.pending_dirs = Some(self.dir_order());
        }

        let Some(path) = self.pending_dirs.as_mut().and_then(Vec::pop) else {
            return Ok(None);
        };
        let node = self.build_dir(path).await?;
        Ok(Some((node, self)))
    }

    /// Imports a file, or records a directory for later.
    async fn import_candidate(
        &mut self,
        candidate: ImportCandidate,
    ) -> anyhow::Result<Option<ImportedNode>> {
        let meta = UnixFsMeta {
            mode: candidate.mode,
            mtime: candidate.mtime,
        };
        let Some(content) = candidate.content else {
            let Some(path) = candidate.path else {
                bail!("directory candidate without a path");
            };
            self.ensure_dir(&path).meta = meta;
            return Ok(None);
        };

        let path = candidate.path.unwrap_or_default();
        let link = import_file(&self.writer, &self.options, content, meta)
            .await
            .with_context(|| format!("failed to import file {path:?}"))?;
        tracing::trace!(cid = %link.cid, path = %path, "flat importer: file");

        let name = match path.rsplit_once('/') {
            Some((_, name)) => name.to_owned(),
            None if path.is_empty() => link.cid.to_string(),
            None => path.clone(),
        };
        let parent = self.parent_of(&path);
        // Only the wrapper itself has the empty path; an unnamed file inside
        // it is known by its link name.
        let path = if path.is_empty() && parent.is_some() {
            name.clone()
        } else {
            path
        };
        if let Some(parent) = parent {
            self.ensure_dir(&parent).links.insert(name, link.clone());
        }

        Ok(Some(node(link, path, meta)))
    }

    fn parent_of(&self, path: &str) -> Option<String> {
        if path.is_empty() {
            return self.options.wrap_with_directory.then(String::new);
        }
        match path.rsplit_once('/') {
            Some((parent, _)) => Some(parent.to_owned()),
            None => self.options.wrap_with_directory.then(String::new),
        }
    }

    /// Returns the directory at `path`, creating it and its ancestors.
    fn ensure_dir(&mut self, path: &str) -> &mut DirNode {
        if !self.dirs.contains_key(path) {
            let mut ancestor = path;
            while let Some((parent, _)) = ancestor.rsplit_once('/') {
                self.dirs.entry(parent.to_owned()).or_default();
                ancestor = parent;
            }
        }
        self.dirs.entry(path.to_owned()).or_default()
    }

    fn dir_order(&mut self) -> Vec<String> {
        if self.options.wrap_with_directory {
            self.dirs.entry(String::new()).or_default();
        }
        let mut paths: Vec<String> = self.dirs.keys().cloned().collect();
        paths.sort_by_key(|path| (depth(path), Reverse(path.clone())));
        paths
    }

    async fn build_dir(&mut self, path: String) -> anyhow::Result<ImportedNode> {
        let dir = self.dirs.remove(&path).unwrap_or_default();
        if dir.links.len() > self.options.shard_split_threshold {
            tracing::debug!(
                path = %path,
                entries = dir.links.len(),
                threshold = self.options.shard_split_threshold,
                "flat importer: directory exceeds shard threshold, storing it unsharded"
            );
        }

        let data = unixfs_data(DataType::Directory, &[], None, &[], dir.meta);
        let links: Vec<(&str, &Link)> = dir
            .links
            .iter()
            .map(|(name, link)| (name.as_str(), link))
            .collect();
        let link = self
            .writer
            .pb(&links, data, 0)
            .await
            .with_context(|| format!("failed to build directory {path:?}"))?;
        tracing::trace!(cid = %link.cid, path = %path, "flat importer: directory");

        if let Some(parent) = self.parent_of(&path)
            && !path.is_empty()
        {
            let name = path.rsplit('/').next().unwrap_or(&path).to_owned();
            self.ensure_dir(&parent).links.insert(name, link.clone());
        }

        Ok(node(link, path, dir.meta))
    }
}

/// Chunks `content` and builds the file's DAG.
async fn import_file(
    writer: &BlockWriter,
    options: &ImporterOptions,
    content: Content,
    meta: UnixFsMeta,
) -> anyhow::Result<Link> {
    let mut file = FileBuilder {
        writer,
        raw_leaves: options.raw_leaves,
        progress: options.progress.as_ref(),
        leaves: Vec::new(),
        held: None,
    };

    let mut stream = content.into_stream();
    match options.chunker {
        Chunker::FixedSize { size } => {
            let size = size.max(1);
            let mut buf = BytesMut::new();
            while let Some(bytes) = stream.try_next().await? {
                buf.extend_from_slice(&bytes);
                while buf.len() >= size {
                    file.push(buf.split_to(size).freeze()).await?;
                }
            }
            if !buf.is_empty() {
                file.push(buf.freeze()).await?;
            }
        }
        Chunker::Rabin { min, avg, max } => {
            use fastcdc::ronomon::{
                AVERAGE_MAX, AVERAGE_MIN, FastCDC, MAXIMUM_MAX, MAXIMUM_MIN, MINIMUM_MAX,
                MINIMUM_MIN,
            };

            let mut buf = BytesMut::new();
            while let Some(bytes) = stream.try_next().await? {
                buf.extend_from_slice(&bytes);
            }
            let data = buf.freeze();
            let min = min.clamp(MINIMUM_MIN, MINIMUM_MAX);
            let avg = avg.clamp(AVERAGE_MIN, AVERAGE_MAX);
            let max = max.clamp(MAXIMUM_MIN, MAXIMUM_MAX);
            let cuts: Vec<(usize, usize)> = FastCDC::new(&data, min, avg, max)
                .map(|chunk| (chunk.offset, chunk.length))
                .collect();
            for (offset, length) in cuts {
                file.push(data.slice(offset..offset + length)).await?;
            }
        }
    }

    file.finish(meta).await
}

fn depth(path: &str) -> usize {
    if path.is_empty() {
        0
    } else {
        path.matches('/').count() + 1
    }
}

fn node(link: Link, path: String, meta: UnixFsMeta) -> ImportedNode {
    ImportedNode {
        cid: link.cid,
        path,
        size: link.tsize,
        unixfs: (meta != UnixFsMeta::default()).then_some(meta),
    }
}
