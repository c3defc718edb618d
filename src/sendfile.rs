//! Delegated delivery via front-end sendfile headers.
//!
//! When the front-end server advertises an X-Sendfile style mechanism,
//! the application emits one header naming the file and writes no body;
//! the front end performs all of the I/O. The delivery headers
//! (disposition, content type, security set) are still the
//! application's job and are attached alongside the delegation header.

use std::path::Path;

use axum::http::header::{HeaderName, HeaderValue};

const X_ACCEL_REDIRECT: HeaderName = HeaderName::from_static("x-accel-redirect");
const X_SENDFILE: HeaderName = HeaderName::from_static("x-sendfile");

/// Which sendfile mechanism, if any, the hosting environment supports.
///
/// This is the probe result for the serving environment, configured
/// once per [`Deliverer`](crate::Deliverer).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Sendfile {
    /// No delegation, the application streams the bytes itself.
    #[default]
    Disabled,
    /// nginx-style internal redirect. The header value is the internal,
    /// non-routable location prefix joined with the file's basename.
    AccelRedirect { internal_prefix: String },
    /// Apache mod_xsendfile style. The header value is the absolute
    /// filesystem path.
    XSendfile,
}

impl Sendfile {
    /// Internal-redirect mode with the given location prefix. A missing
    /// trailing slash is added.
    pub fn accel_redirect(internal_prefix: impl Into<String>) -> Self {
        let mut internal_prefix = internal_prefix.into();
        if !internal_prefix.ends_with('/') {
            internal_prefix.push('/');
        }
        Sendfile::AccelRedirect { internal_prefix }
    }

    /// The delegation header for `path`, or `None` when delegation is
    /// disabled or the path cannot be carried in a header value (the
    /// caller then falls back to self-streaming).
    pub(crate) fn delegation_header(&self, path: &Path) -> Option<(HeaderName, HeaderValue)> {
        match self {
            Sendfile::Disabled => None,
            Sendfile::AccelRedirect { internal_prefix } => {
                let basename = path.file_name()?.to_string_lossy();
                let location = format!("{internal_prefix}{basename}");
                match HeaderValue::from_str(&location) {
                    Ok(value) => Some((X_ACCEL_REDIRECT, value)),
                    Err(_) => {
                        tracing::warn!(%location, "internal location not header-safe, self-streaming");
                        None
                    }
                }
            }
            Sendfile::XSendfile => {
                let path = path.to_string_lossy();
                match HeaderValue::from_str(&path) {
                    Ok(value) => Some((X_SENDFILE, value)),
                    Err(_) => {
                        tracing::warn!(%path, "path not header-safe, self-streaming");
                        None
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::Sendfile;

    #[test]
    fn test_disabled_yields_no_header() {
        assert!(Sendfile::Disabled.delegation_header(Path::new("/srv/files/a.bin")).is_none());
    }

    #[test]
    fn test_accel_redirect_uses_basename() {
        let mode = Sendfile::accel_redirect("/protected");
        let (name, value) = mode.delegation_header(Path::new("/srv/files/a.bin")).unwrap();
        assert_eq!("x-accel-redirect", name.as_str());
        assert_eq!("/protected/a.bin", value.to_str().unwrap());
    }

    #[test]
    fn test_accel_redirect_keeps_existing_slash() {
        let mode = Sendfile::accel_redirect("/protected/");
        let (_, value) = mode.delegation_header(Path::new("clip.mp4")).unwrap();
        assert_eq!("/protected/clip.mp4", value.to_str().unwrap());
    }

    #[test]
    fn test_xsendfile_uses_full_path() {
        let (name, value) = Sendfile::XSendfile
            .delegation_header(Path::new("/srv/files/a.bin"))
            .unwrap();
        assert_eq!("x-sendfile", name.as_str());
        assert_eq!("/srv/files/a.bin", value.to_str().unwrap());
    }

    #[test]
    fn test_unencodable_path_falls_back() {
        let mode = Sendfile::accel_redirect("/protected");
        assert!(mode.delegation_header(Path::new("/srv/gemälde.png")).is_none());
    }
}
