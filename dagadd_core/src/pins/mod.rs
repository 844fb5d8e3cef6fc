pub mod memory;

use cid::Cid;

/// API for pinning and unpinning DAG roots.
///
/// A pin keeps a node, and everything reachable from it, safe from garbage
/// collection.
#[async_trait::async_trait]
pub trait Pins: std::fmt::Debug + Send + Sync {
    /// Adds a pin for `cid`.
    ///
    /// With `options.lock` unset the implementation must not take the gc
    /// lock; callers use this when they already hold it.
    async fn pin_add(&self, cid: Cid, options: PinOptions) -> anyhow::Result<()>;

    /// Removes the pin for `cid`. Returns true if a pin was removed.
    async fn pin_rm(&self, cid: Cid, options: PinOptions) -> anyhow::Result<bool>;

    /// Returns true if `cid` is pinned.
    async fn is_pinned(&self, cid: &Cid) -> anyhow::Result<bool>;

    /// Returns all pinned CIDs, sorted.
    async fn ls(&self) -> anyhow::Result<Vec<Cid>>;
}

/// Per-call pin options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinOptions {
    /// Ask the preloader to announce the pinned node.
    pub preload: bool,
    /// Take the gc read lock for the duration of the call.
    pub lock: bool,
}

impl Default for PinOptions {
    fn default() -> Self {
        Self {
            preload: true,
            lock: true,
        }
    }
}

impl PinOptions {
    /// Options for pinning from inside an operation that already holds the
    /// gc lock and handles preloading itself.
    pub fn reentrant() -> Self {
        Self {
            preload: false,
            lock: false,
        }
    }
}
