//! Rate-limit header parsing.
//!
//! A 429 response is turned into a [`RateLimitError`] carrying the server's
//! requested wait and quota counters. All three headers are optional and parsed
//! best-effort: a missing or malformed value never fails the call.

use http::HeaderMap;
use std::str::FromStr;
use std::time::{Duration, SystemTime};

/// Wait used when a 429 response carries no usable `Retry-After` header.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Typed error for HTTP 429 Too Many Requests.
///
/// # Examples
///
/// ```
/// use controlplane_client::rate_limit::RateLimitError;
/// use http::HeaderMap;
/// use std::time::Duration;
///
/// let mut headers = HeaderMap::new();
/// headers.insert("retry-after", "30".parse().unwrap());
/// headers.insert("x-ratelimit-limit", "100".parse().unwrap());
///
/// let limit = RateLimitError::from_headers(&headers);
/// assert_eq!(limit.retry_after, Duration::from_secs(30));
/// assert_eq!(limit.limit, 100);
/// assert_eq!(limit.remaining, 0);
/// ```
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "Rate limited: retry after {}s (limit {limit}, remaining {remaining})",
    .retry_after.as_secs()
)]
pub struct RateLimitError {
    /// How long the server asked us to wait (`Retry-After`, default 60s).
    pub retry_after: Duration,

    /// Requests allowed in the current window (`X-RateLimit-Limit`, default 0).
    pub limit: u64,

    /// Requests left in the current window (`X-RateLimit-Remaining`, default 0).
    pub remaining: u64,
}

impl RateLimitError {
    /// Extracts rate-limit details from response headers.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            retry_after: parse_retry_after(headers).unwrap_or(DEFAULT_RETRY_AFTER),
            limit: parse_or_default(headers, "x-ratelimit-limit"),
            remaining: parse_or_default(headers, "x-ratelimit-remaining"),
        }
    }
}

/// Parses a header into `T`, yielding `T::default()` when the header is
/// missing, not valid UTF-8, or does not parse.
pub fn parse_or_default<T>(headers: &HeaderMap, name: &str) -> T
where
    T: FromStr + Default,
{
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or_default()
}

/// Parses the Retry-After header.
///
/// Supports both delay-seconds (integer) and HTTP-date formats. A date in the
/// past yields a zero wait.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let header = headers.get("retry-after")?.to_str().ok()?.trim();

    if let Ok(seconds) = header.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let date_time = httpdate::parse_http_date(header).ok()?;
    Some(
        date_time
            .duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_parse_retry_after_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("60"));

        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_parse_retry_after_http_date() {
        let mut headers = HeaderMap::new();
        let future = SystemTime::now() + Duration::from_secs(120);
        headers.insert(
            "retry-after",
            HeaderValue::from_str(&httpdate::fmt_http_date(future)).unwrap(),
        );

        let delay = parse_retry_after(&headers).unwrap();
        // HTTP dates have whole-second resolution
        assert!(
            delay >= Duration::from_secs(118) && delay <= Duration::from_secs(120),
            "unexpected delay {:?}",
            delay
        );
    }

    #[test]
    fn test_missing_headers_use_defaults() {
        let limit = RateLimitError::from_headers(&HeaderMap::new());

        assert_eq!(limit.retry_after, DEFAULT_RETRY_AFTER);
        assert_eq!(limit.limit, 0);
        assert_eq!(limit.remaining, 0);
    }

    #[test]
    fn test_malformed_headers_fall_back_to_zero() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("soon"));
        headers.insert("x-ratelimit-limit", HeaderValue::from_static("lots"));
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("-3"));

        let limit = RateLimitError::from_headers(&headers);
        assert_eq!(limit.retry_after, DEFAULT_RETRY_AFTER);
        assert_eq!(limit.limit, 0);
        assert_eq!(limit.remaining, 0);
    }

    #[test]
    fn test_all_headers_present() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("60"));
        headers.insert("x-ratelimit-limit", HeaderValue::from_static("100"));
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static(" 7 "));

        let limit = RateLimitError::from_headers(&headers);
        assert_eq!(
            limit,
            RateLimitError {
                retry_after: Duration::from_secs(60),
                limit: 100,
                remaining: 7,
            }
        );
        assert_eq!(
            limit.to_string(),
            "Rate limited: retry after 60s (limit 100, remaining 7)"
        );
    }
}
