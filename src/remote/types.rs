//! Remote metadata types

use reqwest::header::{HeaderMap, HeaderName, ETAG, LAST_MODIFIED};

/// Change-detection headers reported for a remote file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteMetadata {
    /// Entity tag with quote characters stripped
    pub etag: Option<String>,
    /// `Last-Modified` value as sent by the server
    pub last_modified: Option<String>,
}

impl RemoteMetadata {
    pub fn with_etag(etag: impl Into<String>) -> Self {
        Self {
            etag: Some(etag.into()),
            last_modified: None,
        }
    }

    pub fn with_last_modified(last_modified: impl Into<String>) -> Self {
        Self {
            etag: None,
            last_modified: Some(last_modified.into()),
        }
    }

    /// Extract metadata from response headers
    ///
    /// Empty or non-UTF-8 header values count as missing.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        Self {
            etag: header(ETAG).map(strip_quotes).filter(|v| !v.is_empty()),
            last_modified: header(LAST_MODIFIED).map(str::to_string),
        }
    }
}

/// Remove every single and double quote character
fn strip_quotes(value: &str) -> String {
    value.chars().filter(|c| *c != '"' && *c != '\'').collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(ETAG, HeaderValue::from_static("\"5f3-abc\""));
        headers.insert(
            LAST_MODIFIED,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );

        let meta = RemoteMetadata::from_headers(&headers);
        assert_eq!(meta.etag.as_deref(), Some("5f3-abc"));
        assert_eq!(
            meta.last_modified.as_deref(),
            Some("Wed, 21 Oct 2015 07:28:00 GMT")
        );
    }

    #[test]
    fn test_weak_etag_keeps_prefix() {
        let mut headers = HeaderMap::new();
        headers.insert(ETAG, HeaderValue::from_static("W/\"abc\""));

        let meta = RemoteMetadata::from_headers(&headers);
        assert_eq!(meta.etag.as_deref(), Some("W/abc"));
    }

    #[test]
    fn test_missing_and_empty_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(ETAG, HeaderValue::from_static("\"\""));

        let meta = RemoteMetadata::from_headers(&headers);
        assert_eq!(meta, RemoteMetadata::default());
    }
}
