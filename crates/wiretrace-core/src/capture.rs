//! Response body capture.
//!
//! [`TeeBody`] sits between the handler's body and the client. Every frame
//! is forwarded untouched; data frames are also copied into a bounded
//! [`CaptureBuffer`]. When the body ends, fails or is dropped, the response
//! section of the trace is rendered from whatever was captured.

use crate::layer::PendingResponse;
use bytes::{Bytes, BytesMut};
use http_body::{Body, Frame, SizeHint};
use pin_project_lite::pin_project;
use std::fmt;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

/// Bounded copy of a body, plus a count of every byte that went past.
#[derive(Debug, Default)]
pub struct CaptureBuffer {
    bytes: BytesMut,
    cap: usize,
    seen: u64,
}

impl CaptureBuffer {
    /// Keep at most `cap` bytes.
    pub fn new(cap: usize) -> Self {
        Self {
            bytes: BytesMut::new(),
            cap,
            seen: 0,
        }
    }

    /// Count bytes without keeping any.
    pub fn disabled() -> Self {
        Self::new(0)
    }

    /// Record a chunk. Bytes past the cap are counted, not stored.
    pub fn push(&mut self, chunk: &[u8]) {
        self.seen += chunk.len() as u64;
        let room = self.cap.saturating_sub(self.bytes.len());
        if room > 0 {
            self.bytes
                .extend_from_slice(&chunk[..chunk.len().min(room)]);
        }
    }

    /// Total bytes observed, including those not kept.
    pub fn seen(&self) -> u64 {
        self.seen
    }

    /// The kept prefix.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn take(&mut self) -> Captured {
        Captured {
            bytes: std::mem::take(&mut self.bytes).freeze(),
            seen: self.seen,
        }
    }
}

/// A finished capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Captured {
    pub(crate) bytes: Bytes,
    pub(crate) seen: u64,
}

/// How a response body stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Completion {
    /// The stream reached its end.
    Ended,
    /// The handler's body yielded an error.
    Failed(String),
    /// Dropped before the end, usually because the client went away.
    Dropped,
}

pin_project! {
    /// Response body that forwards the handler's body and captures a copy.
    ///
    /// Returned by [`TraceService`](crate::TraceService). Frames, trailers,
    /// errors, size hints and end-of-stream are all passed through as-is.
    pub struct TeeBody<B> {
        #[pin]
        inner: B,
        buffer: CaptureBuffer,
        pending: Option<PendingResponse>,
        ended: bool,
    }

    impl<B> PinnedDrop for TeeBody<B> {
        fn drop(this: Pin<&mut Self>) {
            let this = this.project();
            let completion = if *this.ended {
                Completion::Ended
            } else {
                Completion::Dropped
            };
            complete(this.pending, this.buffer, completion);
        }
    }
}

impl<B: Body> TeeBody<B> {
    pub(crate) fn new(inner: B, buffer: CaptureBuffer, pending: PendingResponse) -> Self {
        let ended = inner.is_end_stream();
        Self {
            inner,
            buffer,
            pending: Some(pending),
            ended,
        }
    }

    /// A body that is forwarded without any tracing.
    pub(crate) fn passthrough(inner: B) -> Self {
        Self {
            inner,
            buffer: CaptureBuffer::disabled(),
            pending: None,
            ended: true,
        }
    }
}

fn complete(pending: &mut Option<PendingResponse>, buffer: &mut CaptureBuffer, how: Completion) {
    if let Some(pending) = pending.take() {
        pending.finish(buffer.take(), how);
    }
}

impl<B> Body for TeeBody<B>
where
    B: Body<Data = Bytes>,
    B::Error: fmt::Display,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let mut this = self.project();
        let frame = ready!(this.inner.as_mut().poll_frame(cx));

        match &frame {
            Some(Ok(frame)) => {
                if let Some(data) = frame.data_ref() {
                    this.buffer.push(data);
                }
                if this.inner.is_end_stream() {
                    *this.ended = true;
                    complete(this.pending, this.buffer, Completion::Ended);
                }
            }
            Some(Err(err)) => {
                complete(this.pending, this.buffer, Completion::Failed(err.to_string()));
            }
            None => {
                *this.ended = true;
                complete(this.pending, this.buffer, Completion::Ended);
            }
        }

        Poll::Ready(frame)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl<B> fmt::Debug for TeeBody<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TeeBody")
            .field("seen", &self.buffer.seen())
            .field("traced", &self.pending.is_some())
            .finish_non_exhaustive()
    }
}
