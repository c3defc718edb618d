//! Range header parsing and bounds validation.
//!
//! Only the single-interval form `bytes=<start>-<end>` is understood,
//! with either bound optional (`bytes=500-`, `bytes=-200`). Anything
//! else, multi-range requests included, is deliberately treated as if
//! no `Range` header had been sent. A header that does parse but names
//! bytes outside the file is the only way to get a 416.

/// An inclusive byte interval within a file, already validated against
/// the file size. Only ever produced by [`satisfy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered, `end - start + 1`.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// A parsed but not yet validated range request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RangeSpec {
    /// `bytes=<start>-<end>`
    Bounded(u64, u64),
    /// `bytes=<start>-`
    From(u64),
    /// `bytes=-<n>`, the last `n` bytes
    Suffix(u64),
}

/// Parse a `Range` header value. `None` means "serve the full file",
/// never an error.
pub(crate) fn parse(header: &str) -> Option<RangeSpec> {
    let rest = header.trim().strip_prefix("bytes=")?;
    if rest.contains(',') {
        // multi-range: unsupported, fall back to full content
        return None;
    }
    let (start, end) = rest.split_once('-')?;
    match (start, end) {
        ("", "") => None,
        ("", suffix) => suffix.parse().ok().map(RangeSpec::Suffix),
        (start, "") => start.parse().ok().map(RangeSpec::From),
        (start, end) => Some(RangeSpec::Bounded(start.parse().ok()?, end.parse().ok()?)),
    }
}

/// Check a parsed spec against the file size, returning the interval to
/// transfer. `None` is a 416: the request named bytes the file does not
/// have (`start > end`, `start >= size`, or `end >= size`).
pub(crate) fn satisfy(spec: RangeSpec, file_size: u64) -> Option<ByteRange> {
    match spec {
        RangeSpec::Bounded(start, end) if start <= end && end < file_size => {
            Some(ByteRange { start, end })
        }
        RangeSpec::From(start) if start < file_size => Some(ByteRange {
            start,
            end: file_size - 1,
        }),
        RangeSpec::Suffix(n) if n > 0 && file_size > 0 => Some(ByteRange {
            start: file_size.saturating_sub(n),
            end: file_size - 1,
        }),
        _ => None,
    }
}
