//! The add stream.

use crate::options::ResolvedOptions;
use crate::stages::{AddedEntry, EntryTransform, PinStage, PreloadStage};
use crate::{AddContext, AddError};
use dagadd_core::{AddSource, LockGuard};
use futures::Stream;
use futures::future::BoxFuture;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::Sleep;
use tokio_util::sync::WaitForCancellationFutureOwned;

type Stages = PinStage<PreloadStage<EntryTransform>>;

/// Everything needed to start the pipeline once the lock is held.
struct Pipeline {
    ctx: AddContext,
    source: AddSource,
    options: ResolvedOptions,
}

impl Pipeline {
    fn build(self) -> Stages {
        let Pipeline {
            ctx,
            source,
            options,
        } = self;

        let candidates = ctx.normalizer.normalize(source);
        let nodes = ctx.importer.import(
            candidates,
            ctx.blockstore.clone(),
            options.importer_options(),
        );
        let entries = EntryTransform::new(nodes, options.cid_version, options.wrap_with_directory);
        let preloaded = PreloadStage::new(
            entries,
            ctx.preload,
            options.preload && !options.only_hash,
            options.wrap_with_directory,
        );
        PinStage::new(preloaded, ctx.pins, options.pin && !options.only_hash)
    }
}

enum State {
    Idle(Pipeline),
    Locking {
        pipeline: Pipeline,
        acquire: BoxFuture<'static, LockGuard>,
    },
    // `stages` is declared first so it is dropped before the guard.
    Running {
        stages: Stages,
        guard: LockGuard,
    },
    Done,
}

/// Lazy stream of the entries produced by one add.
///
/// Nothing happens until the stream is first polled. The first poll takes
/// the gc read lock, which is then held until the stream ends, fails, times
/// out, is cancelled or is dropped. After an error the stream ends.
#[must_use = "streams do nothing unless polled"]
pub struct AddStream {
    state: State,
    timeout: Option<Duration>,
    deadline: Option<Pin<Box<Sleep>>>,
    cancelled: Option<Pin<Box<WaitForCancellationFutureOwned>>>,
}

impl AddStream {
    pub(crate) fn new(ctx: AddContext, source: AddSource, options: ResolvedOptions) -> Self {
        let timeout = options.timeout;
        let cancelled = options
            .cancel
            .clone()
            .map(|token| Box::pin(token.cancelled_owned()));
        Self {
            state: State::Idle(Pipeline {
                ctx,
                source,
                options,
            }),
            timeout,
            deadline: None,
            cancelled,
        }
    }

    /// Returns an error if the add was cancelled or ran out of time.
    fn poll_interrupt(&mut self, cx: &mut Context<'_>) -> Option<AddError> {
        if let Some(cancelled) = &mut self.cancelled
            && cancelled.as_mut().poll(cx).is_ready()
        {
            return Some(AddError::Aborted);
        }
        if let Some(deadline) = &mut self.deadline
            && deadline.as_mut().poll(cx).is_ready()
        {
            return Some(AddError::Timeout(self.timeout.unwrap_or_default()));
        }
        None
    }

    /// Tears down the pipeline and gives the lock back.
    fn finish(&mut self) {
        if let State::Running { stages, guard } = std::mem::replace(&mut self.state, State::Done) {
            drop(stages);
            guard.release();
            tracing::trace!("add: released read lock");
        }
        self.deadline = None;
        self.cancelled = None;
    }
}

impl Stream for AddStream {
    type Item = Result<AddedEntry, AddError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            if matches!(this.state, State::Done) {
                return Poll::Ready(None);
            }
            if let Some(err) = this.poll_interrupt(cx) {
                tracing::debug!("add: interrupted: {err}");
                this.finish();
                return Poll::Ready(Some(Err(err)));
            }

            match std::mem::replace(&mut this.state, State::Done) {
                State::Idle(pipeline) => {
                    if let Some(timeout) = this.timeout {
                        this.deadline = Some(Box::pin(tokio::time::sleep(timeout)));
                    }
                    let lock = pipeline.ctx.gc_lock.clone();
                    this.state = State::Locking {
                        pipeline,
                        acquire: Box::pin(async move { lock.read_lock().await }),
                    };
                }
                State::Locking {
                    pipeline,
                    mut acquire,
                } => match acquire.as_mut().poll(cx) {
                    Poll::Ready(guard) => {
                        tracing::trace!("add: acquired read lock");
                        this.state = State::Running {
                            stages: pipeline.build(),
                            guard,
                        };
                    }
                    Poll::Pending => {
                        this.state = State::Locking { pipeline, acquire };
                        return Poll::Pending;
                    }
                },
                State::Running { mut stages, guard } => {
                    let polled = Pin::new(&mut stages).poll_next(cx);
                    this.state = State::Running { stages, guard };
                    match polled {
                        Poll::Ready(Some(Ok(entry))) => {
                            tracing::debug!(cid = %entry.cid, path = %entry.path, "add: entry");
                            return Poll::Ready(Some(Ok(entry)));
                        }
                        Poll::Ready(Some(Err(err))) => {
                            tracing::debug!("add: failed: {err}");
                            this.finish();
                            return Poll::Ready(Some(Err(err)));
                        }
                        Poll::Ready(None) => {
                            this.finish();
                            return Poll::Ready(None);
                        }
                        Poll::Pending => return Poll::Pending,
                    }
                }
                State::Done => return Poll::Ready(None),
            }
        }
    }
}

impl Drop for AddStream {
    fn drop(&mut self) {
        self.finish();
    }
}

impl std::fmt::Debug for AddStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            State::Idle(_) => "idle",
            State::Locking { .. } => "locking",
            State::Running { .. } => "running",
            State::Done => "done",
        };
        f.debug_struct("AddStream")
            .field("state", &state)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
