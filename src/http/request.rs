//! Request handling.
//!
//! # Responsibilities
//! - Name the request ID header set by the middleware stack
//! - Split the user path into link segment and format token
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Empty path segments are ignored, so `alice//clash/` equals `alice/clash`

use axum::http::{HeaderMap, HeaderName};

/// Header carrying the per-request UUID.
pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// The parts of `/{secret}/{user_path}` the service needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPath {
    pub link_segment: String,
    /// Empty when the client named no format.
    pub format_token: String,
}

impl UserPath {
    /// First non-empty segment is the user, the second the format. Further
    /// segments are ignored. `None` when there is no user segment.
    pub fn parse(user_path: &str) -> Option<Self> {
        let mut segments = user_path.split('/').filter(|s| !s.is_empty());
        let link_segment = segments.next()?.to_string();
        let format_token = segments.next().unwrap_or_default().to_string();
        Some(Self {
            link_segment,
            format_token,
        })
    }
}

/// Request ID set by the middleware, or `"unknown"`.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// The `User-Agent` header, or an empty string.
pub fn user_agent(headers: &HeaderMap) -> &str {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_user_path() {
        assert_eq!(
            UserPath::parse("alice/clash"),
            Some(UserPath {
                link_segment: "alice".into(),
                format_token: "clash".into()
            })
        );
        assert_eq!(UserPath::parse("alice").unwrap().format_token, "");
        assert_eq!(UserPath::parse("//alice//v2ray/extra").unwrap().format_token, "v2ray");
        assert_eq!(UserPath::parse(""), None);
        assert_eq!(UserPath::parse("///"), None);
    }

    #[test]
    fn test_header_helpers() {
        let mut headers = HeaderMap::new();
        assert_eq!(request_id(&headers), "unknown");
        assert_eq!(user_agent(&headers), "");
        headers.insert(&X_REQUEST_ID, "abc".parse().unwrap());
        headers.insert(axum::http::header::USER_AGENT, "Happ/1.2.3".parse().unwrap());
        assert_eq!(request_id(&headers), "abc");
        assert_eq!(user_agent(&headers), "Happ/1.2.3");
    }
}
