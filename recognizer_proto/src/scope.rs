//! Bounded lifetimes for the streams of a single call.
//!
//! A [`StreamScope`] is opened once per streaming call. Every stream passed
//! into or out of the call is registered with it, and closing the scope
//! (explicitly, or by dropping it on any exit path) cancels whatever is still
//! open. A cancelled [`ScopedStream`] drops the stream it wraps and ends.

use crate::Operation;
use futures::Stream;
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

/// Shared between a [`ScopedStream`] and its scope so either side can drop
/// the wrapped stream.
type Slot<S> = Mutex<Option<Pin<Box<S>>>>;

trait Release: Send + Sync {
    fn is_held(&self) -> bool;

    /// Drops the wrapped stream. False if it was already gone.
    fn release(&self) -> bool;
}

impl<S: Send> Release for Slot<S> {
    fn is_held(&self) -> bool {
        self.lock().is_some()
    }

    fn release(&self) -> bool {
        // The guard is gone before the stream is dropped.
        let inner = self.lock().take();
        inner.is_some()
    }
}

pub struct StreamScope {
    operation: Operation,
    root: CancellationToken,
    registrations: Mutex<Vec<Arc<dyn Release>>>,
}

impl StreamScope {
    pub fn new(operation: Operation) -> Self {
        tracing::trace!(%operation, "stream scope opened");
        Self {
            operation,
            root: CancellationToken::new(),
            registrations: Mutex::new(Vec::new()),
        }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Binds `stream` to this scope. On a closed scope the stream is dropped
    /// right away and the returned stream starts out cancelled.
    pub fn register<S>(&self, stream: S) -> ScopedStream<S>
    where
        S: Stream + Send + 'static,
    {
        let token = self.root.child_token();
        let slot: Arc<Slot<S>> = Arc::new(Mutex::new(None));

        {
            let mut registrations = self.registrations.lock();
            if !self.root.is_cancelled() {
                *slot.lock() = Some(Box::pin(stream));
                registrations.push(slot.clone());
            }
        }

        ScopedStream {
            slot,
            cancelled: Box::pin(token.clone().cancelled_owned()),
            token,
            state: StreamState::Open,
        }
    }

    /// Streams registered here that have neither finished nor been cancelled.
    pub fn open_streams(&self) -> usize {
        self.registrations
            .lock()
            .iter()
            .filter(|slot| slot.is_held())
            .count()
    }

    pub fn is_closed(&self) -> bool {
        self.root.is_cancelled()
    }

    /// Closes the scope. Every stream still open is cancelled and dropped
    /// before this returns, each at most once; returns how many were
    /// cancelled by this call.
    pub fn cancel(&self) -> usize {
        let registrations = {
            let mut registrations = self.registrations.lock();
            self.root.cancel();
            std::mem::take(&mut *registrations)
        };

        let cancelled = registrations
            .iter()
            .filter(|slot| slot.release())
            .count();

        if cancelled > 0 {
            tracing::debug!(
                operation = %self.operation,
                cancelled,
                "stream scope closed with open streams"
            );
        }
        cancelled
    }

    /// Ties the scope to an outbound stream: the scope closes when `output`
    /// is dropped, e.g. when the transport releases a response.
    pub fn into_stream<S: Stream>(self, output: S) -> ScopeBoundStream<S> {
        ScopeBoundStream {
            output: Box::pin(output),
            _scope: self,
        }
    }
}

impl Drop for StreamScope {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    Open,
    Completed,
    Cancelled,
}

pub struct ScopedStream<S> {
    slot: Arc<Slot<S>>,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
    token: CancellationToken,
    state: StreamState,
}

impl<S> ScopedStream<S> {
    /// True once the owning scope cancelled this stream before it finished.
    pub fn is_cancelled(&self) -> bool {
        match self.state {
            StreamState::Cancelled => true,
            StreamState::Completed => false,
            StreamState::Open => self.token.is_cancelled(),
        }
    }

    /// True once the wrapped stream ended on its own.
    pub fn is_completed(&self) -> bool {
        self.state == StreamState::Completed
    }

    fn finish(&mut self, state: StreamState) {
        let inner = self.slot.lock().take();
        drop(inner);
        self.state = state;
    }
}

impl<S: Stream> Stream for ScopedStream<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.state != StreamState::Open {
            return Poll::Ready(None);
        }

        if this.cancelled.as_mut().poll(cx).is_ready() {
            this.finish(StreamState::Cancelled);
            return Poll::Ready(None);
        }

        let mut slot = this.slot.lock();
        let Some(inner) = slot.as_mut() else {
            // Released by the scope between the token check and the lock.
            drop(slot);
            this.state = StreamState::Cancelled;
            return Poll::Ready(None);
        };
        match inner.as_mut().poll_next(cx) {
            Poll::Ready(None) => {
                let finished = slot.take();
                drop(slot);
                drop(finished);
                this.state = StreamState::Completed;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

impl<S> Drop for ScopedStream<S> {
    fn drop(&mut self) {
        let inner = self.slot.lock().take();
        drop(inner);
    }
}

/// An outbound stream that owns the scope of the call producing it.
pub struct ScopeBoundStream<S> {
    // Dropped before the scope so registered streams are released first.
    output: Pin<Box<S>>,
    _scope: StreamScope,
}

impl<S: Stream> Stream for ScopeBoundStream<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().output.as_mut().poll_next(cx)
    }
}
