//! The repository-wide gc lock.
//!
//! Adds take the lock shared, garbage collection and other store-wide
//! writes take it exclusively. Many adds may run side by side; none of them
//! can observe a half-collected store.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A held lock. Released exactly once, either through [`LockGuard::release`]
/// or when the guard is dropped.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct LockGuard {
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl LockGuard {
    /// Wraps the function that gives the lock back.
    pub fn new<F>(release: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Releases the lock now.
    pub fn release(mut self) {
        self.release_inner();
    }

    /// Returns true while the guard still holds its lock.
    pub fn is_held(&self) -> bool {
        self.release.is_some()
    }

    fn release_inner(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.release_inner();
    }
}

impl fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard")
            .field("held", &self.is_held())
            .finish()
    }
}

/// Multi-reader/single-writer lock guarding the block store.
#[async_trait]
pub trait GcLock: fmt::Debug + Send + Sync + 'static {
    /// Acquires the lock shared. Waits while a writer holds it.
    async fn read_lock(&self) -> LockGuard;

    /// Acquires the lock exclusively. Waits for all readers to finish.
    async fn write_lock(&self) -> LockGuard;
}

/// [`GcLock`] over a `tokio::sync::RwLock`.
///
/// The tokio lock is fair: once a writer is queued, new readers wait behind
/// it. Code that already holds a read lock must therefore never ask for a
/// second one.
#[derive(Debug, Clone, Default)]
pub struct RepoLock {
    inner: Arc<RwLock<()>>,
}

impl RepoLock {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GcLock for RepoLock {
    async fn read_lock(&self) -> LockGuard {
        let guard = self.inner.clone().read_owned().await;
        tracing::trace!("gc lock: read acquired");
        LockGuard::new(move || {
            drop(guard);
            tracing::trace!("gc lock: read released");
        })
    }

    async fn write_lock(&self) -> LockGuard {
        let guard = self.inner.clone().write_owned().await;
        tracing::trace!("gc lock: write acquired");
        LockGuard::new(move || {
            drop(guard);
            tracing::trace!("gc lock: write released");
        })
    }
}
