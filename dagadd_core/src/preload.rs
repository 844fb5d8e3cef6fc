//! Best-effort preloading.
//!
//! Preloading asks some availability service to fetch a freshly added root
//! so that it can be served to peers right away. It is a hint: callers never
//! wait for it and failures are only logged.

use cid::Cid;
use std::sync::Arc;

/// Fire-and-forget preload hint.
///
/// Implementations must return without waiting for the preload to happen
/// and must not panic on failure.
pub trait Preload: std::fmt::Debug + Send + Sync {
    fn preload(&self, cid: &Cid);
}

/// Preloader that does nothing. Used when preloading is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPreload;

impl Preload for NoopPreload {
    fn preload(&self, _cid: &Cid) {}
}

/// The asynchronous operation behind a [`TaskPreload`].
#[async_trait::async_trait]
pub trait PreloadFetch: std::fmt::Debug + Send + Sync + 'static {
    async fn fetch(&self, cid: Cid) -> anyhow::Result<()>;
}

/// Preloader that runs every fetch on its own tokio task.
///
/// Must be used from within a tokio runtime.
#[derive(Debug, Clone)]
pub struct TaskPreload {
    fetch: Arc<dyn PreloadFetch>,
}

impl TaskPreload {
    pub fn new(fetch: Arc<dyn PreloadFetch>) -> Self {
        Self { fetch }
    }
}

impl Preload for TaskPreload {
    fn preload(&self, cid: &Cid) {
        let fetch = self.fetch.clone();
        let cid = *cid;
        tokio::spawn(async move {
            match fetch.fetch(cid).await {
                Ok(()) => tracing::debug!(%cid, "preload: done"),
                Err(err) => tracing::warn!(%cid, "preload: failed: {err:#}"),
            }
        });
    }
}
