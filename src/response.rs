//! Response metadata returned by every call.
//!
//! [`Response`] pairs the decoded data with details of the HTTP exchange:
//! status, headers, total latency and the number of attempts it took.
//! [`Client::execute`](crate::Client::execute) decodes into a caller-owned
//! target and returns the metadata alone as [`ResponseMeta`].

use http::{HeaderMap, StatusCode};
use std::time::Duration;

/// A successful response together with its exchange metadata.
///
/// # Examples
///
/// ```no_run
/// use controlplane_client::Client;
/// use serde::Deserialize;
/// use tokio_util::sync::CancellationToken;
///
/// #[derive(Default, Deserialize)]
/// struct App {
///     id: String,
///     name: String,
/// }
///
/// # async fn example() -> Result<(), controlplane_client::Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com/v1")?
///     .build()?;
///
/// let response = client.get::<App>("apps/web", &CancellationToken::new()).await?;
///
/// println!("App: {}", response.data.name);
/// println!("Request took {:?}", response.latency);
/// println!("Attempts: {}", response.attempts);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Response<T> {
    /// The decoded response data.
    pub data: T,

    /// The HTTP status code of the final attempt.
    pub status: StatusCode,

    /// The response headers of the final attempt.
    pub headers: HeaderMap,

    /// Time from the first attempt until the body was fully consumed,
    /// including every backoff wait in between.
    pub latency: Duration,

    /// The number of attempts made. `1` when no retry was needed.
    pub attempts: usize,
}

/// Metadata of a call whose body went into a caller-supplied target.
pub type ResponseMeta = Response<()>;

impl<T> Response<T> {
    /// Creates a new `Response`.
    pub fn new(
        data: T,
        status: StatusCode,
        headers: HeaderMap,
        latency: Duration,
        attempts: usize,
    ) -> Self {
        Self {
            data,
            status,
            headers,
            latency,
            attempts,
        }
    }

    /// Maps the response data to a different type, keeping the metadata.
    ///
    /// # Examples
    ///
    /// ```
    /// # use controlplane_client::Response;
    /// # use http::{HeaderMap, StatusCode};
    /// # use std::time::Duration;
    /// let response = Response::new(
    ///     42,
    ///     StatusCode::OK,
    ///     HeaderMap::new(),
    ///     Duration::from_millis(100),
    ///     1,
    /// );
    ///
    /// let string_response = response.map(|n| n.to_string());
    /// assert_eq!(string_response.data, "42");
    /// ```
    pub fn map<U, F>(self, f: F) -> Response<U>
    where
        F: FnOnce(T) -> U,
    {
        Response {
            data: f(self.data),
            status: self.status,
            headers: self.headers,
            latency: self.latency,
            attempts: self.attempts,
        }
    }

    /// Returns `true` if the request required retries.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns a header value by name, if present and valid UTF-8.
    ///
    /// # Examples
    ///
    /// ```
    /// # use controlplane_client::Response;
    /// # use http::{HeaderMap, HeaderValue, StatusCode};
    /// # use std::time::Duration;
    /// let mut headers = HeaderMap::new();
    /// headers.insert("x-request-id", HeaderValue::from_static("req-7"));
    ///
    /// let response = Response::new((), StatusCode::OK, headers, Duration::ZERO, 1);
    /// assert_eq!(response.header("x-request-id"), Some("req-7"));
    /// ```
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}
