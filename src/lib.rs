//! # axum-deliver
//!
//! Range-aware file delivery responses for [`axum`][1].
//!
//! One call serves one file: byte-range requests are parsed and
//! validated (200 / 206 / 416), a per-media-type policy picks the
//! disposition and chunk size, and the bytes are either streamed by the
//! application in bounded chunks or handed off to the front-end server
//! via an `X-Accel-Redirect` / `X-Sendfile` header.
//!
//! The high-level entry point is [`Deliverer`], a caller-owned
//! configuration store holding instance defaults and the sendfile probe
//! result. For custom sources, [`Delivery`] works over anything
//! implementing [`ContentSource`]; the [`SizedReader`] adapter covers
//! any [`AsyncRead`] + [`AsyncSeekStart`] with a known size.
//!
//! ```
//! use axum::Router;
//! use axum::http::HeaderMap;
//! use axum::http::header::RANGE;
//! use axum::response::IntoResponse;
//! use axum::routing::get;
//!
//! use axum_deliver::{Deliverer, DeliveryOptions};
//!
//! async fn download(headers: HeaderMap) -> impl IntoResponse {
//!     let deliverer = Deliverer::new();
//!     let range = headers.get(RANGE).and_then(|value| value.to_str().ok());
//!     match deliverer.deliver("archive/report.pdf", DeliveryOptions::new(), range).await {
//!         Ok(response) => response,
//!         Err(err) => err.into_response(),
//!     }
//! }
//!
//! let _app: Router = Router::new().route("/report", get(download));
//! ```
//!
//! [1]: https://docs.rs/axum

mod file;
mod headers;
mod options;
pub mod policy;
mod range;
mod sendfile;
mod stream;

use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::http::header::{self, HeaderMap, HeaderValue};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncSeek};
use tokio_util::sync::CancellationToken;

pub use file::SizedReader;
pub use options::{DeliveryOptions, ResolvedOptions, DEFAULT_CHUNK_SIZE};
pub use range::ByteRange;
pub use sendfile::Sendfile;
pub use stream::DeliveryStream;

/// [`AsyncSeek`] narrowed to only allow seeking from start.
pub trait AsyncSeekStart {
    /// Same semantics as [`AsyncSeek::start_seek`], always passing position as the `SeekFrom::Start` variant.
    fn start_seek(self: Pin<&mut Self>, position: u64) -> io::Result<()>;

    /// Same semantics as [`AsyncSeek::poll_complete`], returning `()` instead of the new stream position.
    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>>;
}

impl<T: AsyncSeek> AsyncSeekStart for T {
    fn start_seek(self: Pin<&mut Self>, position: u64) -> io::Result<()> {
        AsyncSeek::start_seek(self, io::SeekFrom::Start(position))
    }

    fn poll_complete(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        AsyncSeek::poll_complete(self, cx).map_ok(|_| ())
    }
}

/// An [`AsyncRead`] and [`AsyncSeekStart`] with a fixed known byte size.
pub trait ContentSource: AsyncRead + AsyncSeekStart {
    /// The total size of the underlying content.
    ///
    /// This should not change for the lifetime of the object once
    /// queried. Behaviour is not guaranteed if it does change.
    fn byte_size(&self) -> u64;
}

/// Why a delivery could not produce a normal response. Implements
/// [`IntoResponse`] with the corresponding status.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Source path missing, unreadable, or not a regular file. 404.
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// A recognized range asked for bytes the file does not have. 416
    /// with `Content-Range: bytes */<size>` and no body.
    #[error("requested range not satisfiable for {size} byte file")]
    RangeNotSatisfiable { size: u64 },
    /// An unexpected I/O failure before any status line was produced.
    /// Open failures that mean "you cannot have this file" (missing,
    /// permission denied) map to [`NotFound`](Self::NotFound) instead. 500.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl IntoResponse for DeliveryError {
    fn into_response(self) -> Response {
        match self {
            DeliveryError::NotFound(path) => {
                tracing::debug!(path = %path.display(), "delivery source missing");
                StatusCode::NOT_FOUND.into_response()
            }
            DeliveryError::RangeNotSatisfiable { size } => {
                let value = HeaderValue::from_str(&format!("bytes */{size}"))
                    .expect("content-range value is always ascii");
                let mut response = StatusCode::RANGE_NOT_SATISFIABLE.into_response();
                response.headers_mut().insert(header::CONTENT_RANGE, value);
                response
            }
            DeliveryError::Io(err) => {
                tracing::error!(error = %err, "delivery failed before a status line was sent");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

/// One self-streamed delivery over any [`ContentSource`].
///
/// Holds the raw `Range` header value (if any), the resolved options,
/// and optionally a cancellation token checked between chunks.
pub struct Delivery<B: ContentSource + Send + 'static> {
    range_header: Option<String>,
    body: B,
    options: ResolvedOptions,
    cancel: Option<CancellationToken>,
}

impl<B: ContentSource + Send + 'static> Delivery<B> {
    pub fn new(range_header: Option<String>, body: B, options: ResolvedOptions) -> Self {
        Delivery { range_header, body, options, cancel: None }
    }

    /// Attach a token polled between chunks; cancelling it ends the
    /// transfer cleanly with the bytes already sent.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Decide between full and partial content and build headers and
    /// body stream. Returns [`DeliveryError::RangeNotSatisfiable`] if a
    /// recognized range fails bounds validation; an unrecognized range
    /// header falls back to full content by design.
    pub fn try_respond(self) -> Result<DeliveryResponse<B>, DeliveryError> {
        let file_size = self.body.byte_size();
        let headers = headers::standard_headers(&self.options);

        let spec = if self.options.enable_range {
            self.range_header.as_deref().and_then(range::parse)
        } else {
            None
        };

        match spec {
            None => Ok(DeliveryResponse::Full {
                content_length: file_size,
                headers,
                stream: DeliveryStream::new(
                    self.body,
                    0,
                    file_size,
                    self.options.chunk_size,
                    self.cancel,
                ),
            }),
            Some(spec) => {
                let range = range::satisfy(spec, file_size)
                    .ok_or(DeliveryError::RangeNotSatisfiable { size: file_size })?;
                Ok(DeliveryResponse::Partial {
                    file_size,
                    headers,
                    stream: DeliveryStream::new(
                        self.body,
                        range.start,
                        range.len(),
                        self.options.chunk_size,
                        self.cancel,
                    ),
                    range,
                })
            }
        }
    }
}

impl<B: ContentSource + Send + 'static> IntoResponse for Delivery<B> {
    fn into_response(self) -> Response {
        match self.try_respond() {
            Ok(response) => response.into_response(),
            Err(err) => err.into_response(),
        }
    }
}

/// Computed headers and body for one delivery. Implements [`IntoResponse`].
#[derive(Debug)]
pub enum DeliveryResponse<B> {
    /// Whole file, status 200.
    Full {
        content_length: u64,
        headers: HeaderMap,
        stream: DeliveryStream<B>,
    },
    /// One validated interval, status 206.
    Partial {
        range: ByteRange,
        file_size: u64,
        headers: HeaderMap,
        stream: DeliveryStream<B>,
    },
}

impl<B: ContentSource + Send + 'static> IntoResponse for DeliveryResponse<B> {
    fn into_response(self) -> Response {
        match self {
            DeliveryResponse::Full { content_length, mut headers, stream } => {
                headers.insert(header::CONTENT_LENGTH, HeaderValue::from(content_length));
                (StatusCode::OK, headers, stream).into_response()
            }
            DeliveryResponse::Partial { range, file_size, mut headers, stream } => {
                let content_range = format!("bytes {}-{}/{}", range.start, range.end, file_size);
                headers.insert(
                    header::CONTENT_RANGE,
                    HeaderValue::from_str(&content_range)
                        .expect("content-range value is always ascii"),
                );
                headers.insert(header::CONTENT_LENGTH, HeaderValue::from(range.len()));
                (StatusCode::PARTIAL_CONTENT, headers, stream).into_response()
            }
        }
    }
}

/// Caller-owned delivery configuration: instance-level option defaults
/// plus the sendfile capability of the hosting environment. Cheap to
/// clone, safe to share across handlers.
#[derive(Debug, Clone, Default)]
pub struct Deliverer {
    defaults: DeliveryOptions,
    sendfile: Sendfile,
}

impl Deliverer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Option defaults applied under per-call overrides.
    pub fn with_defaults(mut self, defaults: DeliveryOptions) -> Self {
        self.defaults = defaults;
        self
    }

    /// Sendfile mechanism advertised by the front-end server.
    pub fn with_sendfile(mut self, sendfile: Sendfile) -> Self {
        self.sendfile = sendfile;
        self
    }

    /// Deliver one file as a complete HTTP response.
    ///
    /// Validates the path, resolves options, and either delegates to
    /// the front-end server or self-streams with range support. The
    /// returned response owns the transfer; nothing may be appended to
    /// it afterwards.
    pub async fn deliver(
        &self,
        path: impl AsRef<Path>,
        overrides: DeliveryOptions,
        range_header: Option<&str>,
    ) -> Result<Response, DeliveryError> {
        self.deliver_with_cancel(path, overrides, range_header, None).await
    }

    /// Same as [`deliver`](Self::deliver) with a cancellation token
    /// checked between chunks of a self-streamed transfer.
    pub async fn deliver_with_cancel(
        &self,
        path: impl AsRef<Path>,
        overrides: DeliveryOptions,
        range_header: Option<&str>,
        cancel: Option<CancellationToken>,
    ) -> Result<Response, DeliveryError> {
        let path = path.as_ref();

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|_| DeliveryError::NotFound(path.to_path_buf()))?;
        if !metadata.is_file() {
            return Err(DeliveryError::NotFound(path.to_path_buf()));
        }

        let options = ResolvedOptions::resolve(path, &self.defaults, &overrides);

        // delegation offloads all I/O to the front-end process, so it
        // is always attempted before self-streaming
        if let Some((name, value)) = self.sendfile.delegation_header(path) {
            tracing::debug!(
                header = %name,
                file = %path.display(),
                "delegating transfer to front-end server",
            );
            let mut response =
                (StatusCode::OK, headers::standard_headers(&options)).into_response();
            response.headers_mut().insert(name, value);
            return Ok(response);
        }

        let file = tokio::fs::File::open(path)
            .await
            .map_err(|err| open_failure(path, err))?;
        let body = SizedReader::with_size(file, metadata.len());

        let mut delivery = Delivery::new(range_header.map(str::to_owned), body, options);
        if let Some(cancel) = cancel {
            delivery = delivery.with_cancellation(cancel);
        }
        Ok(delivery.try_respond()?.into_response())
    }
}

/// An unreadable file at call entry is the same terminal 404 as a
/// missing one; `Io` (500) is reserved for failures past validation.
fn open_failure(path: &Path, err: io::Error) -> DeliveryError {
    match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
            DeliveryError::NotFound(path.to_path_buf())
        }
        _ => DeliveryError::Io(err),
    }
}
