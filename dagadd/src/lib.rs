//! Streaming add pipeline for content-addressed DAG stores.
//!
//! An add takes some source (bytes, file objects, a directory tree),
//! chunks it into a DAG through an [`Importer`], writes the blocks to a
//! [`Blockstore`] and yields one [`AddedEntry`] per file and directory.
//! Root entries are preloaded and pinned on the way out. The whole run
//! holds the gc read lock, so garbage collection cannot remove blocks of an
//! add in progress.
//!
//! ```ignore
//! let adder = Adder::new(AddContext::new(store, importer, pins, gc_lock));
//! let mut entries = adder.add_all(source, AddOptions::default())?;
//! while let Some(entry) = entries.next().await {
//!     let entry = entry?;
//!     println!("added {} {}", entry.cid, entry.path);
//! }
//! ```

pub mod add;
pub mod chunker;
mod error;
pub mod options;
pub mod progress;
pub mod stages;

pub use add::AddStream;
pub use chunker::parse_chunker;
pub use error::AddError;
pub use options::{AddOptions, ResolvedOptions};
pub use progress::ProgressAccumulator;
pub use stages::AddedEntry;

use dagadd_core::{
    AddSource, Blockstore, DefaultNormalizer, GcLock, Importer, NoopPreload, Normalizer, Pins,
    Preload,
};
use futures::StreamExt;
use std::sync::Arc;

/// The collaborators an add runs against.
#[derive(Debug, Clone)]
pub struct AddContext {
    pub blockstore: Arc<dyn Blockstore>,
    pub importer: Arc<dyn Importer>,
    pub normalizer: Arc<dyn Normalizer>,
    pub pins: Arc<dyn Pins>,
    pub preload: Arc<dyn Preload>,
    pub gc_lock: Arc<dyn GcLock>,
}

impl AddContext {
    /// Context with the default normalizer and no preloading.
    pub fn new(
        blockstore: Arc<dyn Blockstore>,
        importer: Arc<dyn Importer>,
        pins: Arc<dyn Pins>,
        gc_lock: Arc<dyn GcLock>,
    ) -> Self {
        Self {
            blockstore,
            importer,
            normalizer: Arc::new(DefaultNormalizer),
            pins,
            preload: Arc::new(NoopPreload),
            gc_lock,
        }
    }

    pub fn with_preload(mut self, preload: Arc<dyn Preload>) -> Self {
        self.preload = preload;
        self
    }

    pub fn with_normalizer(mut self, normalizer: Arc<dyn Normalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }
}

/// Entry point for adding content.
#[derive(Debug, Clone)]
pub struct Adder {
    ctx: AddContext,
}

impl Adder {
    pub fn new(ctx: AddContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &AddContext {
        &self.ctx
    }

    /// Starts an add and returns the stream of its entries.
    ///
    /// Options are validated here; an invalid option fails the call before
    /// the lock is requested. Everything else happens while the returned
    /// stream is polled.
    pub fn add_all(
        &self,
        source: impl Into<AddSource>,
        options: AddOptions,
    ) -> Result<AddStream, AddError> {
        let options = options.resolve()?;
        tracing::debug!(?options, "add: starting");
        Ok(AddStream::new(self.ctx.clone(), source.into(), options))
    }

    /// Adds `source` and returns its root, the last entry of the add.
    pub async fn add(
        &self,
        source: impl Into<AddSource>,
        options: AddOptions,
    ) -> Result<AddedEntry, AddError> {
        let mut entries = self.add_all(source, options)?;
        let mut last = None;
        while let Some(entry) = entries.next().await {
            last = Some(entry?);
        }
        last.ok_or(AddError::NothingAdded)
    }
}
