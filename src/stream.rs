use std::{io, mem};
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::response::{IntoResponse, Response};
use bytes::{Bytes, BytesMut};
use futures::Stream;
use http_body::{Body, Frame, SizeHint};
use pin_project::pin_project;
use tokio::io::ReadBuf;
use tokio_util::sync::CancellationToken;

use crate::ContentSource;

/// Response body stream for one delivery. Implements [`Stream`],
/// [`Body`], and [`IntoResponse`].
///
/// Reads proceed in chunks of at most the configured chunk size, the
/// last read is trimmed to the bytes remaining, and every chunk is
/// handed to the transport as its own frame. A cancellation token, if
/// attached, is checked between chunks so an aborted client stops the
/// transfer cleanly instead of erroring.
#[pin_project]
#[derive(Debug)]
pub struct DeliveryStream<B> {
    state: StreamState,
    chunk_size: usize,
    length: u64,
    sent: u64,
    cancel: Option<CancellationToken>,
    #[pin]
    body: B,
}

impl<B: ContentSource + Send + 'static> DeliveryStream<B> {
    pub(crate) fn new(
        body: B,
        start: u64,
        length: u64,
        chunk_size: usize,
        cancel: Option<CancellationToken>,
    ) -> Self {
        DeliveryStream {
            state: StreamState::Seek { start },
            chunk_size: chunk_size.max(1),
            length,
            sent: 0,
            cancel,
            body,
        }
    }

    /// Bytes yielded so far. Equals the requested length after a
    /// complete transfer, less after a cancelled or failed one.
    pub fn bytes_sent(&self) -> u64 {
        self.sent
    }
}

#[derive(Debug)]
enum StreamState {
    Seek { start: u64 },
    Seeking { remaining: u64 },
    Reading { buffer: BytesMut, remaining: u64 },
}

impl<B: ContentSource + Send + 'static> IntoResponse for DeliveryStream<B> {
    fn into_response(self) -> Response {
        Response::new(axum::body::Body::new(self))
    }
}

impl<B: ContentSource> Body for DeliveryStream<B> {
    type Data = Bytes;
    type Error = io::Error;

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.length)
    }

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<io::Result<Frame<Bytes>>>> {
        self.poll_next(cx)
            .map(|item| item.map(|result| result.map(Frame::data)))
    }
}

impl<B: ContentSource> Stream for DeliveryStream<B> {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<io::Result<Bytes>>> {
        let mut this = self.project();

        // liveness check between chunks: a disconnected peer ends the
        // transfer with whatever was already sent
        if let Some(cancel) = this.cancel {
            if cancel.is_cancelled() {
                tracing::debug!(sent = *this.sent, "transfer cancelled, ending stream");
                return Poll::Ready(None);
            }
        }

        if let StreamState::Seek { start } = *this.state {
            match this.body.as_mut().start_seek(start) {
                Err(e) => {
                    tracing::error!(error = %e, "seek failed before first chunk");
                    return Poll::Ready(Some(Err(e)));
                }
                Ok(()) => {
                    let remaining = *this.length;
                    *this.state = StreamState::Seeking { remaining };
                }
            }
        }

        if let StreamState::Seeking { remaining } = *this.state {
            match this.body.as_mut().poll_complete(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Err(e)) => {
                    tracing::error!(error = %e, "seek failed before first chunk");
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(Ok(())) => {
                    let buffer = allocate_buffer(*this.chunk_size, remaining);
                    *this.state = StreamState::Reading { buffer, remaining };
                }
            }
        }

        if let StreamState::Reading { buffer, remaining } = this.state {
            if *remaining == 0 {
                return Poll::Ready(None);
            }

            let uninit = buffer.spare_capacity_mut();

            // read at most min(chunk_size, remaining) bytes; buffer
            // capacity is already bounded by both
            let nbytes = std::cmp::min(
                uninit.len(),
                usize::try_from(*remaining).unwrap_or(usize::MAX),
            );

            let mut read_buf = ReadBuf::uninit(&mut uninit[0..nbytes]);

            match this.body.as_mut().poll_read(cx, &mut read_buf) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Err(e)) => {
                    // headers are committed by now, the only option is
                    // to abort the body and log it
                    tracing::error!(error = %e, sent = *this.sent, "read failed mid-transfer");
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(Ok(())) => {
                    match read_buf.filled().len() {
                        // source ended before the target, finish with
                        // what was sent
                        0 => return Poll::Ready(None),
                        n => {
                            // SAFETY: poll_read has filled the buffer with `n`
                            // additional bytes. `buffer.len` should always be
                            // 0 here, but include it for rigorous correctness
                            unsafe { buffer.set_len(buffer.len() + n); }

                            // n cannot exceed remaining due to the cmp::min
                            let n = n as u64;
                            *remaining -= n;
                            *this.sent += n;

                            let next = allocate_buffer(*this.chunk_size, *remaining);
                            let chunk = mem::replace(buffer, next);

                            return Poll::Ready(Some(Ok(chunk.freeze())));
                        }
                    }
                }
            }
        }

        unreachable!();
    }
}

fn allocate_buffer(chunk_size: usize, remaining: u64) -> BytesMut {
    let capacity = std::cmp::min(
        chunk_size,
        usize::try_from(remaining).unwrap_or(usize::MAX),
    );
    BytesMut::with_capacity(capacity)
}
