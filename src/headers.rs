//! Response header construction for file delivery.

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

use crate::options::ResolvedOptions;
use crate::policy;

const CONTENT_DESCRIPTION: HeaderName = HeaderName::from_static("content-description");
const CONTENT_TRANSFER_ENCODING: HeaderName = HeaderName::from_static("content-transfer-encoding");
const X_ROBOTS_TAG: HeaderName = HeaderName::from_static("x-robots-tag");

/// Headers set on every delivery response, delegated or self-streamed.
///
/// Caching is disabled, sniffing and indexing are refused, and
/// `Content-Encoding: identity` keeps compression middleware from
/// re-encoding the chunked binary body.
pub(crate) fn standard_headers(options: &ResolvedOptions) -> HeaderMap {
    let mut headers = HeaderMap::new();

    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store, no-cache, must-revalidate"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
    headers.insert(CONTENT_DESCRIPTION, HeaderValue::from_static("File Transfer"));
    headers.insert(CONTENT_TRANSFER_ENCODING, HeaderValue::from_static("binary"));
    headers.insert(header::CONTENT_ENCODING, HeaderValue::from_static("identity"));
    headers.insert(X_ROBOTS_TAG, HeaderValue::from_static("noindex, nofollow"));
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&options.media_type)
            .unwrap_or_else(|_| HeaderValue::from_static(policy::OCTET_STREAM)),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        content_disposition(options.force_download, &options.filename),
    );
    headers.insert(
        header::ACCEPT_RANGES,
        HeaderValue::from_static(if options.enable_range { "bytes" } else { "none" }),
    );

    headers
}

/// Build the `Content-Disposition` value. The plain `filename`
/// parameter is always ASCII; when sanitization changed the name, an
/// RFC 5987 `filename*` parameter carries the original UTF-8 so
/// capable clients keep the real name.
fn content_disposition(force_download: bool, filename: &str) -> HeaderValue {
    let kind = if force_download { "attachment" } else { "inline" };
    let ascii = sanitize_filename(filename);

    let value = if ascii == filename {
        format!("{kind}; filename=\"{ascii}\"")
    } else {
        let encoded = utf8_percent_encode(filename, NON_ALPHANUMERIC);
        format!("{kind}; filename=\"{ascii}\"; filename*=UTF-8''{encoded}")
    };

    // sanitized and percent-encoded parts are ASCII, this cannot fail
    HeaderValue::from_str(&value)
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

/// Replace everything a quoted-string filename cannot safely carry.
pub(crate) fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '"' | '\\' | '/' => '_',
            c if !c.is_ascii() || c.is_ascii_control() => '_',
            c => c,
        })
        .collect()
}
