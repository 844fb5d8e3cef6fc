use super::{PinOptions, Pins};
use crate::content_id::to_v1;
use crate::{GcLock, Preload};
use anyhow::Result;
use cid::Cid;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;

/// In-memory `Pins` implementation.
///
/// Pins are keyed by the CIDv1 form, so pinning a CIDv0 and querying with
/// the matching CIDv1 agree. Nothing is persisted.
#[derive(Clone, Debug)]
pub struct MemoryPins {
    pins: Arc<Mutex<BTreeSet<Cid>>>,
    gc_lock: Arc<dyn GcLock>,
    preload: Option<Arc<dyn Preload>>,
}

impl MemoryPins {
    pub fn new(gc_lock: Arc<dyn GcLock>) -> Self {
        Self {
            pins: Arc::new(Mutex::new(BTreeSet::new())),
            gc_lock,
            preload: None,
        }
    }

    /// Announces newly pinned nodes through `preload` when a caller asks for it.
    pub fn with_preload(mut self, preload: Arc<dyn Preload>) -> Self {
        self.preload = Some(preload);
        self
    }
}

#[async_trait::async_trait]
impl Pins for MemoryPins {
    async fn pin_add(&self, cid: Cid, options: PinOptions) -> Result<()> {
        let _guard = if options.lock {
            Some(self.gc_lock.read_lock().await)
        } else {
            None
        };

        let key = to_v1(cid)?;
        let inserted = self.pins.lock().await.insert(key);
        tracing::debug!(%cid, inserted, "pins: pin_add");

        if options.preload
            && let Some(preload) = &self.preload
        {
            preload.preload(&cid);
        }
        Ok(())
    }

    async fn pin_rm(&self, cid: Cid, options: PinOptions) -> Result<bool> {
        let _guard = if options.lock {
            Some(self.gc_lock.read_lock().await)
        } else {
            None
        };

        let key = to_v1(cid)?;
        let removed = self.pins.lock().await.remove(&key);
        tracing::debug!(%cid, removed, "pins: pin_rm");
        Ok(removed)
    }

    async fn is_pinned(&self, cid: &Cid) -> Result<bool> {
        let key = to_v1(*cid)?;
        Ok(self.pins.lock().await.contains(&key))
    }

    async fn ls(&self) -> Result<Vec<Cid>> {
        Ok(self.pins.lock().await.iter().copied().collect())
    }
}
