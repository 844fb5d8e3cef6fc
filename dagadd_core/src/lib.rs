//! Core dagadd types and traits.
//!
//! This crate defines the shared vocabulary of the add pipeline: the
//! content identifiers it produces, the canonical items it feeds to an
//! importer, and the collaborator traits the pipeline drives.
//!
//! ## Data types
//!
//! - Content identifiers (`cid::Cid`, re-exported) and the helpers in
//!   [`content_id`] for building and normalizing them
//! - Hash algorithms (`hash_alg::HashAlg`)
//! - Canonical import items and importer output
//!   (`import::ImportCandidate`, `import::ImportedNode`)
//! - Source shapes accepted by an add (`source::AddSource`)
//!
//! ## Collaborator traits
//!
//! The pipeline never talks to a concrete backend. Everything it touches is
//! reached through one of these seams:
//!
//! - [`Blockstore`]: content-addressed block persistence
//! - [`Importer`]: chunking and DAG construction
//! - [`Normalizer`]: source shape normalization
//! - [`Pins`]: the pin set
//! - [`Preload`]: best-effort availability hints
//! - [`GcLock`]: the multi-reader/single-writer lock guarding the store
//!   against garbage collection while adds are running

pub mod content_id;
pub mod hash_alg;
pub mod import;
pub mod lock;
pub mod pins;
pub mod preload;
pub mod source;
pub mod store;

// Test utilities (behind feature flag)
#[cfg(feature = "testutil")]
pub mod testutil;

// --- Core Public Surface ---

pub use cid::Cid;

pub use hash_alg::HashAlg;

pub use import::{
    CandidateStream, Chunker, Content, ImportCandidate, ImportedNode, Importer, ImporterOptions,
    Layout, Mtime, NodeStream, ProgressFn, UnixFsMeta,
};

pub use lock::{GcLock, LockGuard, RepoLock};

pub use pins::memory::MemoryPins;
pub use pins::{PinOptions, Pins};

pub use preload::{NoopPreload, Preload, PreloadFetch, TaskPreload};

pub use source::{AddSource, DefaultNormalizer, Normalizer};

pub use store::{Blockstore, StoreError, StoreResult};
