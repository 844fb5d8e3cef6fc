//! Add options and their resolution.

use crate::chunker::parse_chunker;
use crate::progress::ProgressAccumulator;
use crate::AddError;
use cid::Version;
use dagadd_core::{Chunker, HashAlg, ImporterOptions, Layout, ProgressFn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Shard split threshold used when the sharding experiment is enabled.
pub const DEFAULT_SHARD_SPLIT_THRESHOLD: usize = 1000;

/// Caller-facing add options. Every field is optional.
///
/// The serializable part is what the `[add]` table of a config file holds;
/// the progress callback and the cancellation token can only be set in code.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AddOptions {
    /// Chunker spec, e.g. `size-262144` or `rabin-16384-65536-131072`.
    pub chunker: Option<String>,
    pub cid_version: Option<u8>,
    pub hash_alg: Option<String>,
    /// Compute CIDs without writing blocks, pinning or preloading.
    pub only_hash: bool,
    /// Pin the added roots. Defaults to true.
    pub pin: Option<bool>,
    /// Preload the added root. Defaults to true.
    pub preload: Option<bool>,
    /// Defaults to true for CIDv1 and false for CIDv0.
    pub raw_leaves: Option<bool>,
    pub shard_split_threshold: Option<usize>,
    /// Enables directory sharding with the default threshold.
    pub sharding: bool,
    pub trickle: bool,
    pub wrap_with_directory: bool,
    pub timeout_ms: Option<u64>,
    #[serde(skip)]
    pub progress: Option<ProgressFn>,
    #[serde(skip)]
    pub cancel: Option<CancellationToken>,
}

impl fmt::Debug for AddOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddOptions")
            .field("chunker", &self.chunker)
            .field("cid_version", &self.cid_version)
            .field("hash_alg", &self.hash_alg)
            .field("only_hash", &self.only_hash)
            .field("pin", &self.pin)
            .field("preload", &self.preload)
            .field("raw_leaves", &self.raw_leaves)
            .field("shard_split_threshold", &self.shard_split_threshold)
            .field("sharding", &self.sharding)
            .field("trickle", &self.trickle)
            .field("wrap_with_directory", &self.wrap_with_directory)
            .field("timeout_ms", &self.timeout_ms)
            .field("progress", &self.progress.is_some())
            .field("cancel", &self.cancel.is_some())
            .finish()
    }
}

impl AddOptions {
    /// Fills every unset field of `self` from `fallback`.
    ///
    /// Flags are or-ed: a flag set on either side stays set.
    pub fn or(self, fallback: AddOptions) -> AddOptions {
        AddOptions {
            chunker: self.chunker.or(fallback.chunker),
            cid_version: self.cid_version.or(fallback.cid_version),
            hash_alg: self.hash_alg.or(fallback.hash_alg),
            only_hash: self.only_hash || fallback.only_hash,
            pin: self.pin.or(fallback.pin),
            preload: self.preload.or(fallback.preload),
            raw_leaves: self.raw_leaves.or(fallback.raw_leaves),
            shard_split_threshold: self.shard_split_threshold.or(fallback.shard_split_threshold),
            sharding: self.sharding || fallback.sharding,
            trickle: self.trickle || fallback.trickle,
            wrap_with_directory: self.wrap_with_directory || fallback.wrap_with_directory,
            timeout_ms: self.timeout_ms.or(fallback.timeout_ms),
            progress: self.progress.or(fallback.progress),
            cancel: self.cancel.or(fallback.cancel),
        }
    }

    /// Merges the options over the defaults and validates them.
    ///
    /// - The chunker spec is parsed into a [`Chunker`].
    /// - `trickle` selects [`Layout::Trickle`] and goes no further.
    /// - A non-default hash algorithm forces CIDv1.
    /// - A progress callback is wrapped into a [`ProgressAccumulator`].
    pub fn resolve(self) -> Result<ResolvedOptions, AddError> {
        let chunker = parse_chunker(self.chunker.as_deref())?;

        let layout = if self.trickle {
            Layout::Trickle
        } else {
            Layout::Balanced
        };

        let hash_alg = match &self.hash_alg {
            Some(name) => name
                .parse::<HashAlg>()
                .map_err(|_| AddError::UnsupportedHashAlg(name.clone()))?,
            None => HashAlg::default(),
        };

        let mut cid_version = match self.cid_version {
            None | Some(0) => Version::V0,
            Some(1) => Version::V1,
            Some(other) => return Err(AddError::InvalidCidVersion(other)),
        };
        // CIDv0 only exists for the default hash.
        if !hash_alg.is_default() && cid_version != Version::V1 {
            cid_version = Version::V1;
        }

        let shard_split_threshold = self.shard_split_threshold.unwrap_or(if self.sharding {
            DEFAULT_SHARD_SPLIT_THRESHOLD
        } else {
            usize::MAX
        });

        let progress = self
            .progress
            .map(|callback| ProgressAccumulator::new(callback).into_callback());

        Ok(ResolvedOptions {
            chunker,
            layout,
            cid_version,
            hash_alg,
            raw_leaves: self.raw_leaves.unwrap_or(cid_version == Version::V1),
            only_hash: self.only_hash,
            pin: self.pin.unwrap_or(true),
            preload: self.preload.unwrap_or(true),
            wrap_with_directory: self.wrap_with_directory,
            shard_split_threshold,
            progress,
            timeout: self.timeout_ms.map(Duration::from_millis),
            cancel: self.cancel,
        })
    }
}

/// Fully merged options of one add.
#[derive(Clone)]
pub struct ResolvedOptions {
    pub chunker: Chunker,
    pub layout: Layout,
    pub cid_version: Version,
    pub hash_alg: HashAlg,
    pub raw_leaves: bool,
    pub only_hash: bool,
    pub pin: bool,
    pub preload: bool,
    pub wrap_with_directory: bool,
    pub shard_split_threshold: usize,
    /// Already accumulating.
    pub progress: Option<ProgressFn>,
    pub timeout: Option<Duration>,
    pub cancel: Option<CancellationToken>,
}

impl ResolvedOptions {
    /// The subset of options the importer gets to see.
    pub fn importer_options(&self) -> ImporterOptions {
        ImporterOptions {
            chunker: self.chunker,
            layout: self.layout,
            cid_version: self.cid_version,
            hash_alg: self.hash_alg,
            raw_leaves: self.raw_leaves,
            only_hash: self.only_hash,
            wrap_with_directory: self.wrap_with_directory,
            shard_split_threshold: self.shard_split_threshold,
            progress: self.progress.clone(),
        }
    }
}

impl fmt::Debug for ResolvedOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedOptions")
            .field("chunker", &self.chunker)
            .field("layout", &self.layout)
            .field("cid_version", &self.cid_version)
            .field("hash_alg", &self.hash_alg)
            .field("raw_leaves", &self.raw_leaves)
            .field("only_hash", &self.only_hash)
            .field("pin", &self.pin)
            .field("preload", &self.preload)
            .field("wrap_with_directory", &self.wrap_with_directory)
            .field("shard_split_threshold", &self.shard_split_threshold)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
