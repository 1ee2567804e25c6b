//! Quota-enforcing stream filter.
//!
//! # Responsibilities
//! - Pass bytes through unchanged until the cap is reached
//! - Cut the chunk that crosses the cap and end the stream right after it
//! - Release the upstream stream as soon as the stream is finished
//! - Report the final byte count exactly once, including when the consumer
//!   drops the stream early (client disconnect)
//!
//! # Design Decisions
//! - Knows nothing about HTTP: a byte stream in, a byte stream out
//! - Pull-based: upstream is only polled when the consumer asks for more,
//!   so backpressure is inherited from the consumer
//! - Never polls upstream again once `streamed == cap`

use std::pin::Pin;
use std::task::{ready, Context, Poll};

use futures_util::Stream;
use hyper::body::Bytes;

type FinishHook = Box<dyn FnOnce(u64) + Send + 'static>;

/// A byte stream truncated at `cap` bytes.
pub struct QuotaStream<S> {
    inner: Option<S>,
    cap: u64,
    streamed: u64,
    on_finish: Option<FinishHook>,
}

impl<S> QuotaStream<S> {
    /// Wrap `inner`, delivering at most `cap` bytes.
    pub fn new(inner: S, cap: u64) -> Self {
        Self {
            inner: Some(inner),
            cap,
            streamed: 0,
            on_finish: None,
        }
    }

    /// Register a callback receiving the number of bytes delivered.
    ///
    /// Runs once: when the cap is reached, when upstream ends or fails, or
    /// when the stream is dropped unfinished.
    pub fn on_finish<F>(mut self, hook: F) -> Self
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.on_finish = Some(Box::new(hook));
        self
    }

    /// Whether the stream has reached a terminal state.
    pub fn is_finished(&self) -> bool {
        self.inner.is_none()
    }

    fn finish(&mut self) {
        // Dropping upstream here closes its connection instead of leaving it
        // half-read until the response is torn down.
        self.inner = None;
        if let Some(hook) = self.on_finish.take() {
            hook(self.streamed);
        }
    }
}

impl<S, E> Stream for QuotaStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    type Item = Result<Bytes, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if this.streamed >= this.cap {
            this.finish();
            return Poll::Ready(None);
        }

        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(None);
        };

        match ready!(Pin::new(inner).poll_next(cx)) {
            Some(Ok(mut chunk)) => {
                let remaining = this.cap - this.streamed;
                if (chunk.len() as u64) < remaining {
                    this.streamed += chunk.len() as u64;
                    return Poll::Ready(Some(Ok(chunk)));
                }

                // remaining <= chunk.len(), so the cast cannot truncate.
                chunk.truncate(remaining as usize);
                this.streamed += chunk.len() as u64;
                this.finish();
                Poll::Ready(Some(Ok(chunk)))
            }
            Some(Err(e)) => {
                this.finish();
                Poll::Ready(Some(Err(e)))
            }
            None => {
                this.finish();
                Poll::Ready(None)
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match &self.inner {
            Some(inner) => {
                let (_, upper) = inner.size_hint();
                (0, upper)
            }
            None => (0, Some(0)),
        }
    }
}

impl<S> Drop for QuotaStream<S> {
    fn drop(&mut self) {
        if let Some(hook) = self.on_finish.take() {
            tracing::debug!(
                streamed = self.streamed,
                cap = self.cap,
                "Metered stream dropped before completion"
            );
            hook(self.streamed);
        }
    }
}
