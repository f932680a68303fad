//! Response headers for event streams

use crate::broker::BrokerConfig;

/// Request header carrying the client's resume token
pub const LAST_EVENT_ID: &str = "Last-Event-ID";

/// Content type of an event stream
pub const CONTENT_TYPE: &str = "text/event-stream; charset=utf-8";

/// Encoding applied to the response body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyEncoding {
    /// Frames are written as-is
    #[default]
    Identity,
    /// Frames are gzip-compressed and flushed one by one
    Gzip,
}

impl BodyEncoding {
    /// Pick the body encoding for a client
    pub fn negotiate(config: &BrokerConfig, accept_encoding: Option<&str>) -> Self {
        if accepts_gzip(config, accept_encoding) {
            BodyEncoding::Gzip
        } else {
            BodyEncoding::Identity
        }
    }

    /// Value of the `Content-Encoding` header, if one is sent
    pub fn content_encoding(self) -> Option<&'static str> {
        match self {
            BodyEncoding::Identity => None,
            BodyEncoding::Gzip => Some("gzip"),
        }
    }
}

/// Check if the stream should be gzip-encoded for this client
pub fn accepts_gzip(config: &BrokerConfig, accept_encoding: Option<&str>) -> bool {
    config.gzip
        && accept_encoding.is_some_and(|value| {
            value
                .split(',')
                .filter_map(|coding| coding.split(';').next())
                .any(|coding| coding.trim().eq_ignore_ascii_case("gzip"))
        })
}

/// Headers to send before the first frame
///
/// The body must then be written with the same [`BodyEncoding`] that
/// [`BodyEncoding::negotiate`] returns for these arguments.
pub fn response_headers(
    config: &BrokerConfig,
    accept_encoding: Option<&str>,
) -> Vec<(&'static str, &'static str)> {
    let mut headers = vec![
        ("Content-Type", CONTENT_TYPE),
        ("Cache-Control", "no-cache, no-store, must-revalidate"),
        ("Connection", "keep-alive"),
    ];

    if config.allow_cors {
        headers.push(("Access-Control-Allow-Origin", "*"));
    }
    if let Some(coding) = BodyEncoding::negotiate(config, accept_encoding).content_encoding() {
        headers.push(("Content-Encoding", coding));
    }

    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find(headers: &[(&'static str, &'static str)], name: &str) -> Option<&'static str> {
        headers.iter().find(|(n, _)| *n == name).map(|(_, v)| *v)
    }

    #[test]
    fn test_default_headers() {
        let headers = response_headers(&BrokerConfig::default(), Some("gzip"));

        assert_eq!(find(&headers, "Content-Type"), Some(CONTENT_TYPE));
        assert_eq!(
            find(&headers, "Cache-Control"),
            Some("no-cache, no-store, must-revalidate")
        );
        assert_eq!(find(&headers, "Connection"), Some("keep-alive"));
        assert_eq!(find(&headers, "Access-Control-Allow-Origin"), None);
        assert_eq!(find(&headers, "Content-Encoding"), None);
    }

    #[test]
    fn test_cors_header() {
        let config = BrokerConfig::default().allow_cors(true);
        let headers = response_headers(&config, None);

        assert_eq!(find(&headers, "Access-Control-Allow-Origin"), Some("*"));
    }

    #[test]
    fn test_gzip_negotiation() {
        let config = BrokerConfig::default().gzip(true);

        assert!(accepts_gzip(&config, Some("gzip")));
        assert!(accepts_gzip(&config, Some("deflate, GZIP;q=0.8")));
        assert!(!accepts_gzip(&config, Some("deflate, br")));
        assert!(!accepts_gzip(&config, None));
        assert!(!accepts_gzip(&BrokerConfig::default(), Some("gzip")));

        let headers = response_headers(&config, Some("gzip, br"));
        assert_eq!(find(&headers, "Content-Encoding"), Some("gzip"));
    }

    #[test]
    fn test_negotiated_encoding_matches_header() {
        let config = BrokerConfig::default().gzip(true);

        for accept in [Some("gzip"), Some("br"), None] {
            let encoding = BodyEncoding::negotiate(&config, accept);
            let headers = response_headers(&config, accept);
            assert_eq!(find(&headers, "Content-Encoding"), encoding.content_encoding());
        }
        assert_eq!(BodyEncoding::negotiate(&config, Some("gzip")), BodyEncoding::Gzip);
        assert_eq!(BodyEncoding::negotiate(&config, None), BodyEncoding::Identity);
    }
}
