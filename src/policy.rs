//! Per-media-type delivery policy: disposition and chunk sizing.

use crate::options::DEFAULT_CHUNK_SIZE;

const KIB: usize = 1024;
const MIB: usize = 1024 * KIB;

/// Substituted content type for denied media types.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Media types that are never served with their declared type. Serving
/// these inline would let an upload be executed or rendered by the
/// browser, so they always become `application/octet-stream` with an
/// attachment disposition, no matter what the caller asked for.
const DENY_LIST: &[&str] = &[
    "text/html",
    "text/javascript",
    "application/javascript",
    "application/x-javascript",
    "application/x-httpd-php",
];

const ARCHIVE_TYPES: &[&str] = &[
    "application/zip",
    "application/gzip",
    "application/x-gzip",
    "application/x-tar",
    "application/x-bzip2",
    "application/x-7z-compressed",
    "application/x-rar-compressed",
    "application/octet-stream",
];

/// Recommended delivery settings for one media type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    /// Display in the browser rather than forcing a download.
    pub inline: bool,
    /// Recommended read size for the streaming loop, in bytes.
    pub chunk_size: usize,
}

/// Whether `media_type` is on the executable/script deny list.
///
/// Comparison ignores parameters (`text/html; charset=utf-8` is still
/// denied) and ASCII case.
pub fn is_denied(media_type: &str) -> bool {
    let essence = essence(media_type);
    DENY_LIST.iter().any(|denied| essence.eq_ignore_ascii_case(denied))
}

/// Classify a media type into a recommended [`Policy`].
///
/// Media that clients seek through (video, audio) gets larger chunks to
/// cut down on read calls, archives get the largest since nobody seeks
/// in them, and viewable documents stay inline with smaller chunks.
pub fn classify(media_type: &str) -> Policy {
    let essence = essence(media_type);

    if is_denied(essence) {
        return Policy { inline: false, chunk_size: 4 * MIB };
    }

    if essence.eq_ignore_ascii_case("application/pdf") {
        return Policy { inline: true, chunk_size: MIB };
    }

    let lower = essence.to_ascii_lowercase();
    if lower.starts_with("image/") || lower.starts_with("text/") {
        return Policy { inline: true, chunk_size: 512 * KIB };
    }
    if lower.starts_with("video/") || lower.starts_with("audio/") {
        return Policy { inline: true, chunk_size: 2 * MIB };
    }
    if ARCHIVE_TYPES.contains(&lower.as_str()) {
        return Policy { inline: false, chunk_size: 4 * MIB };
    }

    // anything unrecognized is a download
    Policy { inline: false, chunk_size: DEFAULT_CHUNK_SIZE }
}

fn essence(media_type: &str) -> &str {
    media_type.split(';').next().unwrap_or(media_type).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deny_list() {
        assert!(is_denied("text/html"));
        assert!(is_denied("TEXT/HTML"));
        assert!(is_denied("text/html; charset=utf-8"));
        assert!(is_denied("application/x-httpd-php"));
        assert!(!is_denied("text/plain"));
        assert!(!is_denied("application/pdf"));
    }

    #[test]
    fn test_denied_types_force_download() {
        for denied in ["text/html", "text/javascript", "application/javascript"] {
            assert!(!classify(denied).inline, "{denied} must not be inline");
        }
    }

    #[test]
    fn test_video_policy() {
        let policy = classify("video/mp4");
        assert!(policy.inline);
        assert!(policy.chunk_size >= MIB && policy.chunk_size <= 2 * MIB);
    }

    #[test]
    fn test_document_policies() {
        assert_eq!(Policy { inline: true, chunk_size: MIB }, classify("application/pdf"));
        assert!(classify("image/png").inline);
        assert!(classify("audio/ogg").inline);
    }

    #[test]
    fn test_archive_policy() {
        let policy = classify("application/zip");
        assert!(!policy.inline);
        assert_eq!(4 * MIB, policy.chunk_size);
    }

    #[test]
    fn test_unknown_type_is_download() {
        let policy = classify("application/x-very-custom");
        assert!(!policy.inline);
        assert_eq!(MIB, policy.chunk_size);
    }
}
