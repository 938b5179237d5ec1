//! URL canonicalization for stable cache keys.

/// Error type for URL canonicalization failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("relative URL without a base: {0}")]
    Relative(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl From<UrlError> for sparkcache_core::Error {
    fn from(err: UrlError) -> Self {
        sparkcache_core::Error::InvalidUrl(err.to_string())
    }
}

/// Canonicalize a URL string, resolving relative references against `base`.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Resolve against `base` when the input has no scheme
/// 3. Lowercase the host
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
///
/// Two requests for the same resource produce the same string, so the
/// result is what the cache key is computed from.
pub fn canonicalize(input: &str, base: Option<&url::Url>) -> Result<url::Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = match url::Url::parse(trimmed) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => match base {
            Some(base) => base.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?,
            None => return Err(UrlError::Relative(trimmed.to_string())),
        },
        Err(e) => return Err(UrlError::InvalidUrl(e.to_string())),
    };

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if let Some(host) = parsed.host_str() {
        let lowered = host.to_lowercase();
        if lowered != host {
            parsed
                .set_host(Some(&lowered))
                .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
        }
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

/// Whether two URLs share scheme, host and port.
pub fn same_origin(a: &url::Url, b: &url::Url) -> bool {
    a.origin() == b.origin()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> url::Url {
        url::Url::parse("https://harnessthespark.com").unwrap()
    }

    #[test]
    fn test_canonicalize_absolute() {
        let url = canonicalize("https://example.com/styles.css", None).unwrap();
        assert_eq!(url.as_str(), "https://example.com/styles.css");
    }

    #[test]
    fn test_canonicalize_relative_against_base() {
        let url = canonicalize("/index.html", Some(&base())).unwrap();
        assert_eq!(url.as_str(), "https://harnessthespark.com/index.html");
    }

    #[test]
    fn test_canonicalize_root() {
        let url = canonicalize("/", Some(&base())).unwrap();
        assert_eq!(url.as_str(), "https://harnessthespark.com/");
    }

    #[test]
    fn test_canonicalize_relative_without_base() {
        let result = canonicalize("/index.html", None);
        assert!(matches!(result, Err(UrlError::Relative(_))));
    }

    #[test]
    fn test_canonicalize_lowercase_host() {
        let url = canonicalize("https://FONTS.GoogleAPIs.com/css", None).unwrap();
        assert_eq!(url.host_str(), Some("fonts.googleapis.com"));
    }

    #[test]
    fn test_canonicalize_remove_fragment_keep_query() {
        let url = canonicalize("https://example.com/app.js?v=2&b=1#top", None).unwrap();
        assert_eq!(url.fragment(), None);
        assert_eq!(url.query(), Some("v=2&b=1"));
    }

    #[test]
    fn test_canonicalize_trim_whitespace() {
        let url = canonicalize("  https://example.com  ", None).unwrap();
        assert_eq!(url.as_str(), "https://example.com/");
    }

    #[test]
    fn test_canonicalize_unsupported_scheme() {
        let result = canonicalize("file:///etc/passwd", None);
        assert!(matches!(result, Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_canonicalize_empty() {
        assert!(matches!(canonicalize("   ", Some(&base())), Err(UrlError::Empty)));
    }

    #[test]
    fn test_same_origin() {
        let site = base();
        let page = canonicalize("/about", Some(&site)).unwrap();
        let font = canonicalize("https://fonts.gstatic.com/s/a.woff2", None).unwrap();
        let other_port = canonicalize("https://harnessthespark.com:8443/", None).unwrap();

        assert!(same_origin(&site, &page));
        assert!(!same_origin(&site, &font));
        assert!(!same_origin(&site, &other_port));
    }
}
