//! Delivery options and their resolution order.
//!
//! Callers describe only the fields they care about with
//! [`DeliveryOptions`]; everything left unset is filled in from the
//! instance-level defaults, then from [`policy`](crate::policy) for the
//! resolved media type. The deny-list substitution runs last and cannot
//! be overridden.

use std::path::Path;

use crate::policy;

/// Chunk size used when no caller override applies and the media-type
/// policy has no specific recommendation.
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Per-call (or instance-level) delivery overrides.
///
/// Every field is optional so resolution can tell "caller chose this"
/// apart from "use the default". Built fluently:
///
/// ```
/// use axum_deliver::DeliveryOptions;
///
/// let options = DeliveryOptions::new()
///     .filename("report.pdf")
///     .force_download(true);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryOptions {
    chunk_size: Option<usize>,
    enable_range: Option<bool>,
    filename: Option<String>,
    media_type: Option<String>,
    force_download: Option<bool>,
}

impl DeliveryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read size for the streaming loop. Values below one byte are
    /// clamped up to keep the loop well-formed.
    pub fn chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = Some(bytes.max(1));
        self
    }

    /// Honor `Range` request headers. Defaults to true.
    pub fn enable_range(mut self, enabled: bool) -> Self {
        self.enable_range = Some(enabled);
        self
    }

    /// Filename advertised in `Content-Disposition`. Defaults to the
    /// basename of the source path.
    pub fn filename(mut self, name: impl Into<String>) -> Self {
        self.filename = Some(name.into());
        self
    }

    /// Media type sent as `Content-Type`. Defaults to a guess from the
    /// path extension.
    pub fn media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    /// Force an `attachment` disposition instead of the policy choice.
    pub fn force_download(mut self, forced: bool) -> Self {
        self.force_download = Some(forced);
        self
    }

    /// Field-wise overlay: any field set in `self` wins over `base`.
    fn merged_over(&self, base: &DeliveryOptions) -> DeliveryOptions {
        DeliveryOptions {
            chunk_size: self.chunk_size.or(base.chunk_size),
            enable_range: self.enable_range.or(base.enable_range),
            filename: self.filename.clone().or_else(|| base.filename.clone()),
            media_type: self.media_type.clone().or_else(|| base.media_type.clone()),
            force_download: self.force_download.or(base.force_download),
        }
    }
}

/// Options after resolution. Fixed for the remainder of the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOptions {
    pub chunk_size: usize,
    pub enable_range: bool,
    pub filename: String,
    pub media_type: String,
    pub force_download: bool,
}

impl ResolvedOptions {
    /// Merge `overrides` over `configured`, fill remaining gaps from
    /// the media-type policy, then apply the deny-list substitution.
    ///
    /// Each field resolves independently: a caller may pin only the
    /// filename and still get the policy's chunk size and disposition.
    pub fn resolve(
        path: &Path,
        configured: &DeliveryOptions,
        overrides: &DeliveryOptions,
    ) -> ResolvedOptions {
        let merged = overrides.merged_over(configured);

        let media_type = merged.media_type.unwrap_or_else(|| {
            mime_guess::from_path(path)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        });
        let policy = policy::classify(&media_type);

        let mut resolved = ResolvedOptions {
            chunk_size: merged.chunk_size.unwrap_or(policy.chunk_size).max(1),
            enable_range: merged.enable_range.unwrap_or(true),
            filename: merged.filename.unwrap_or_else(|| basename(path)),
            force_download: merged.force_download.unwrap_or(!policy.inline),
            media_type,
        };

        // Security rule, applied after every override so nothing can
        // opt back in to serving script content.
        if policy::is_denied(&resolved.media_type) {
            resolved.media_type = policy::OCTET_STREAM.to_string();
            resolved.force_download = true;
        }

        resolved
    }
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "download".to_string())
}
