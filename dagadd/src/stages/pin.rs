use super::{AddedEntry, is_pin_root};
use crate::AddError;
use dagadd_core::{PinOptions, Pins};
use futures::Stream;
use futures::future::BoxFuture;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

struct PendingPin {
    entry: AddedEntry,
    fut: BoxFuture<'static, anyhow::Result<()>>,
}

/// Pins root entries before handing them on.
///
/// The pin call happens while the add holds the gc read lock, so it never
/// asks for the lock again.
pub struct PinStage<S> {
    inner: S,
    pins: Arc<dyn Pins>,
    enabled: bool,
    pending: Option<PendingPin>,
}

impl<S> PinStage<S> {
    /// `enabled` is false for hash-only adds and when pinning was switched
    /// off.
    pub fn new(inner: S, pins: Arc<dyn Pins>, enabled: bool) -> Self {
        Self {
            inner,
            pins,
            enabled,
            pending: None,
        }
    }
}

impl<S> Stream for PinStage<S>
where
    S: Stream<Item = Result<AddedEntry, AddError>> + Unpin,
{
    type Item = Result<AddedEntry, AddError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if let Some(mut pending) = this.pending.take() {
                return match pending.fut.as_mut().poll(cx) {
                    Poll::Ready(Ok(())) => Poll::Ready(Some(Ok(pending.entry))),
                    Poll::Ready(Err(source)) => Poll::Ready(Some(Err(AddError::Pin {
                        cid: pending.entry.cid,
                        source,
                    }))),
                    Poll::Pending => {
                        this.pending = Some(pending);
                        Poll::Pending
                    }
                };
            }

            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(entry))) if this.enabled && is_pin_root(&entry.path) => {
                    tracing::debug!(cid = %entry.cid, path = %entry.path, "add: pinning root");
                    let pins = this.pins.clone();
                    let cid = entry.cid;
                    this.pending = Some(PendingPin {
                        entry,
                        fut: Box::pin(async move { pins.pin_add(cid, PinOptions::reentrant()).await }),
                    });
                }
                other => return other,
            }
        }
    }
}
