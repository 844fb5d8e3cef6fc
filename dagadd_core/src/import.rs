//! Canonical import items and the importer seam.
//!
//! An [`Importer`] turns a stream of [`ImportCandidate`]s into a stream of
//! [`ImportedNode`]s, writing blocks to a [`Blockstore`] as it goes. Both
//! streams are pull-driven: an importer only reads its next candidate when
//! its own consumer asks for the next node.

use crate::{Blockstore, HashAlg};
use bytes::Bytes;
use cid::{Cid, Version};
use futures::stream::BoxStream;
use std::fmt;
use std::io;
use std::sync::Arc;

/// Stream of canonical items handed to an importer.
pub type CandidateStream = BoxStream<'static, anyhow::Result<ImportCandidate>>;

/// Stream of nodes produced by an importer.
pub type NodeStream = BoxStream<'static, anyhow::Result<ImportedNode>>;

/// Byte-count callback used for progress reporting.
pub type ProgressFn = Arc<dyn Fn(u64) + Send + Sync>;

/// File content of a candidate.
pub enum Content {
    Bytes(Bytes),
    Stream(BoxStream<'static, io::Result<Bytes>>),
}

impl Content {
    /// Turns the content into a stream of byte chunks.
    pub fn into_stream(self) -> BoxStream<'static, io::Result<Bytes>> {
        match self {
            Content::Bytes(bytes) => Box::pin(futures::stream::once(async move { Ok(bytes) })),
            Content::Stream(stream) => stream,
        }
    }
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Content::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Content::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<Bytes> for Content {
    fn from(bytes: Bytes) -> Self {
        Content::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Content {
    fn from(bytes: Vec<u8>) -> Self {
        Content::Bytes(bytes.into())
    }
}

impl From<&'static [u8]> for Content {
    fn from(bytes: &'static [u8]) -> Self {
        Content::Bytes(Bytes::from_static(bytes))
    }
}

impl From<&'static str> for Content {
    fn from(s: &'static str) -> Self {
        Content::Bytes(Bytes::from_static(s.as_bytes()))
    }
}

/// Modification time as stored in UnixFS metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Mtime {
    pub secs: i64,
    pub nsecs: u32,
}

impl Mtime {
    pub fn new(secs: i64, nsecs: u32) -> Self {
        Self { secs, nsecs }
    }
}

/// UnixFS metadata attached to a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnixFsMeta {
    pub mode: Option<u32>,
    pub mtime: Option<Mtime>,
}

/// One canonical input item.
///
/// A candidate without content is a directory. A candidate without a path
/// is an unnamed file.
#[derive(Debug, Default)]
pub struct ImportCandidate {
    pub path: Option<String>,
    pub content: Option<Content>,
    pub mode: Option<u32>,
    pub mtime: Option<Mtime>,
}

impl ImportCandidate {
    /// A named file.
    pub fn file(path: impl Into<String>, content: impl Into<Content>) -> Self {
        Self {
            path: Some(path.into()),
            content: Some(content.into()),
            ..Default::default()
        }
    }

    /// An unnamed file.
    pub fn content(content: impl Into<Content>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    /// A directory.
    pub fn dir(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_mtime(mut self, mtime: Mtime) -> Self {
        self.mtime = Some(mtime);
        self
    }

    pub fn is_dir(&self) -> bool {
        self.content.is_none()
    }
}

/// A node emitted by an importer: one per file or directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedNode {
    pub cid: Cid,
    /// Empty for an unnamed file or for the wrapping directory.
    pub path: String,
    /// Cumulative size of the node's DAG in bytes.
    pub size: u64,
    pub unixfs: Option<UnixFsMeta>,
}

/// Chunking strategy descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chunker {
    /// Fixed-size pieces of `size` bytes.
    FixedSize { size: usize },
    /// Content-defined chunking with the given bounds.
    Rabin { min: usize, avg: usize, max: usize },
}

impl Default for Chunker {
    fn default() -> Self {
        Chunker::FixedSize {
            size: Self::DEFAULT_SIZE,
        }
    }
}

impl Chunker {
    /// Default fixed chunk size and default rabin average.
    pub const DEFAULT_SIZE: usize = 262_144;
}

/// DAG layout for multi-chunk files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Layout {
    #[default]
    Balanced,
    Trickle,
}

/// Options understood by every importer.
///
/// There is no pin flag: pinning is the caller's job.
#[derive(Clone)]
pub struct ImporterOptions {
    pub chunker: Chunker,
    pub layout: Layout,
    pub cid_version: Version,
    pub hash_alg: HashAlg,
    pub raw_leaves: bool,
    pub only_hash: bool,
    pub wrap_with_directory: bool,
    /// Directories with more entries than this are candidates for sharding.
    /// `usize::MAX` disables sharding.
    pub shard_split_threshold: usize,
    pub progress: Option<ProgressFn>,
}

impl Default for ImporterOptions {
    fn default() -> Self {
        Self {
            chunker: Chunker::default(),
            layout: Layout::default(),
            cid_version: Version::V0,
            hash_alg: HashAlg::default(),
            raw_leaves: false,
            only_hash: false,
            wrap_with_directory: false,
            shard_split_threshold: usize::MAX,
            progress: None,
        }
    }
}

impl fmt::Debug for ImporterOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImporterOptions")
            .field("chunker", &self.chunker)
            .field("layout", &self.layout)
            .field("cid_version", &self.cid_version)
            .field("hash_alg", &self.hash_alg)
            .field("raw_leaves", &self.raw_leaves)
            .field("only_hash", &self.only_hash)
            .field("wrap_with_directory", &self.wrap_with_directory)
            .field("shard_split_threshold", &self.shard_split_threshold)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

/// Chunking and DAG construction.
pub trait Importer: fmt::Debug + Send + Sync {
    /// Builds the DAG for `source`.
    ///
    /// Nodes are emitted in construction order (children before their
    /// parents). Blocks are written to `store` unless `options.only_hash`
    /// is set. Errors from `source` are passed through.
    fn import(
        &self,
        source: CandidateStream,
        store: Arc<dyn Blockstore>,
        options: ImporterOptions,
    ) -> NodeStream;
}
