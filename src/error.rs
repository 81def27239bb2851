//! Error types for control-plane API calls.
//!
//! Every failure path of a call ends in one of these variants. Callers are
//! expected to branch on the variant: back off longer on [`Error::RateLimited`],
//! do not retry [`Error::Api`] client errors, and treat [`Error::Decode`] as a
//! contract mismatch between this client and the server.

use crate::rate_limit::RateLimitError;
use http::StatusCode;

/// The main error type for control-plane API calls.
///
/// # Examples
///
/// ```no_run
/// use controlplane_client::{Client, Error};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com/v1")?
///     .build()?;
///
/// match client.get::<serde_json::Value>("apps", &CancellationToken::new()).await {
///     Ok(response) => println!("Apps: {:?}", response.data),
///     Err(Error::RateLimited(limit)) => {
///         eprintln!("Slow down, retry in {:?}", limit.retry_after);
///     }
///     Err(Error::Api(api)) => eprintln!("API error {}: {}", api.status, api.message),
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The relative path could not be resolved against the base address.
    #[error("Invalid request path {path:?}: {source}")]
    RequestConstruction {
        /// The offending path as given by the caller
        path: String,
        /// The URL parser error
        #[source]
        source: url::ParseError,
    },

    /// The request body could not be serialized to JSON.
    #[error("Failed to serialize request body: {0}")]
    Serialization(#[source] serde_json::Error),

    /// A network-level error occurred (connect, DNS, TLS, timeout, redirect loop).
    ///
    /// No response was obtained for the attempt.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered 429 Too Many Requests.
    #[error(transparent)]
    RateLimited(RateLimitError),

    /// The server answered with a non-2xx status other than 429.
    #[error(transparent)]
    Api(ApiError),

    /// A 2xx body could not be decoded into the expected shape.
    ///
    /// This signals a client/server contract mismatch and is never retried.
    #[error("Failed to decode response (status {status}): {source}")]
    Decode {
        /// The HTTP status code
        status: StatusCode,
        /// The raw response body that failed to decode
        raw_response: String,
        /// The serde error
        #[source]
        source: serde_json::Error,
    },

    /// Streaming a body into a raw byte sink failed.
    #[error("Failed to write response body: {0}")]
    BodyWrite(#[source] std::io::Error),

    /// The caller's cancellation signal fired.
    #[error("Request cancelled")]
    Cancelled,

    /// Every allowed attempt ended in a retryable failure.
    #[error("Retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// The number of attempts made, including the first one
        attempts: usize,
        /// The failure of the final attempt
        #[source]
        last_error: Box<Error>,
    },

    /// Invalid client configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An invalid base URL was provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// A non-2xx response that is not a rate limit.
#[derive(thiserror::Error, Debug, Clone)]
#[error("API error {status}: {message}")]
pub struct ApiError {
    /// The HTTP status
    pub status: StatusCode,
    /// Message taken from the error body, the raw body text, or the status phrase
    pub message: String,
    /// The `status` field of a structured error body, when one was sent
    pub api_status: Option<String>,
    /// The raw response body
    pub raw_response: String,
}

impl Error {
    /// Returns `true` if the failure is transient by default policy.
    ///
    /// Network errors, rate limits and 5xx API errors are retryable; the
    /// remaining variants are not.
    ///
    /// # Examples
    ///
    /// ```
    /// use controlplane_client::{ApiError, Error};
    /// use http::StatusCode;
    ///
    /// let err = Error::Api(ApiError {
    ///     status: StatusCode::SERVICE_UNAVAILABLE,
    ///     message: "try later".to_string(),
    ///     api_status: None,
    ///     raw_response: String::new(),
    /// });
    /// assert!(err.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network(_) => true,
            Error::RateLimited(_) => true,
            Error::Api(api) => api.status.is_server_error(),
            Error::RequestConstruction { .. }
            | Error::Serialization(_)
            | Error::Decode { .. }
            | Error::BodyWrite(_)
            | Error::Cancelled
            | Error::RetriesExhausted { .. }
            | Error::Configuration(_)
            | Error::InvalidUrl(_) => false,
        }
    }

    /// Returns the HTTP status code if a response was obtained.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::RateLimited(_) => Some(StatusCode::TOO_MANY_REQUESTS),
            Error::Api(api) => Some(api.status),
            Error::Decode { status, .. } => Some(*status),
            Error::RetriesExhausted { last_error, .. } => last_error.status(),
            _ => None,
        }
    }

    /// Returns the rate-limit details, looking through exhausted retries.
    pub fn rate_limit(&self) -> Option<&RateLimitError> {
        match self {
            Error::RateLimited(limit) => Some(limit),
            Error::RetriesExhausted { last_error, .. } => last_error.rate_limit(),
            _ => None,
        }
    }

    /// Returns `true` if the call ended because the caller cancelled it.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

/// A specialized `Result` type for control-plane API calls.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn api(status: StatusCode) -> Error {
        Error::Api(ApiError {
            status,
            message: "boom".to_string(),
            api_status: None,
            raw_response: String::new(),
        })
    }

    #[test]
    fn test_retryable_classes() {
        assert!(api(StatusCode::BAD_GATEWAY).is_retryable());
        assert!(!api(StatusCode::NOT_FOUND).is_retryable());
        assert!(!Error::Cancelled.is_retryable());
        assert!(!Error::Configuration("bad".into()).is_retryable());
    }

    #[test]
    fn test_rate_limit_seen_through_exhaustion() {
        let err = Error::RetriesExhausted {
            attempts: 4,
            last_error: Box::new(Error::RateLimited(RateLimitError {
                retry_after: Duration::from_secs(5),
                limit: 10,
                remaining: 0,
            })),
        };
        assert_eq!(err.rate_limit().map(|l| l.limit), Some(10));
        assert_eq!(err.status(), Some(StatusCode::TOO_MANY_REQUESTS));
    }

    #[test]
    fn test_api_error_display_uses_status_line() {
        assert_eq!(
            api(StatusCode::BAD_REQUEST).to_string(),
            "API error 400 Bad Request: boom"
        );
    }
}
