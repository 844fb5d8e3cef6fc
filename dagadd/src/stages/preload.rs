use super::{AddedEntry, is_preload_root};
use crate::AddError;
use dagadd_core::Preload;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Asks the preloader to announce root entries as they pass through.
///
/// Preloading is fire-and-forget: the entry is yielded right away.
pub struct PreloadStage<S> {
    inner: S,
    preload: Arc<dyn Preload>,
    enabled: bool,
    wrap_with_directory: bool,
}

impl<S> PreloadStage<S> {
    /// `enabled` is false for hash-only adds and when preloading was
    /// switched off.
    pub fn new(inner: S, preload: Arc<dyn Preload>, enabled: bool, wrap_with_directory: bool) -> Self {
        Self {
            inner,
            preload,
            enabled,
            wrap_with_directory,
        }
    }
}

impl<S> Stream for PreloadStage<S>
where
    S: Stream<Item = Result<AddedEntry, AddError>> + Unpin,
{
    type Item = Result<AddedEntry, AddError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_next(cx);
        if let Poll::Ready(Some(Ok(entry))) = &polled
            && this.enabled
            && is_preload_root(&entry.path, this.wrap_with_directory)
        {
            tracing::debug!(cid = %entry.cid, path = %entry.path, "add: preloading root");
            this.preload.preload(&entry.cid);
        }
        polled
    }
}
