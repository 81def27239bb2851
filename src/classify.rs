//! Response classification and body decoding.
//!
//! Once the retry loop settles on a final response, it lands here: 2xx bodies
//! go into the caller's [`Target`], 429 becomes a rate-limit error and every
//! other status becomes an [`ApiError`].

use crate::error::ApiError;
use crate::rate_limit::RateLimitError;
use crate::{Error, Result};
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::io::Write;
use tokio_util::sync::CancellationToken;

/// Where a successful response body goes.
///
/// # Examples
///
/// ```no_run
/// use controlplane_client::{Client, Target};
/// use http::Method;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), controlplane_client::Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com/v1")?
///     .build()?;
/// let cancel = CancellationToken::new();
///
/// // Stream a log bundle verbatim instead of decoding it.
/// let mut bundle = Vec::new();
/// client
///     .execute::<(), ()>(Method::GET, "apps/web/logs", None, Target::raw(&mut bundle), &cancel)
///     .await?;
/// # Ok(())
/// # }
/// ```
pub enum Target<'a, T> {
    /// Read and drop the body.
    Discard,
    /// JSON-decode the body into the value. An empty body leaves it untouched.
    Json(&'a mut T),
    /// Copy the body bytes verbatim into the sink.
    Raw(&'a mut (dyn Write + Send)),
}

impl Target<'static, ()> {
    /// A target that ignores the body.
    pub fn discard() -> Self {
        Target::Discard
    }
}

impl<'a> Target<'a, ()> {
    /// A target that streams the body into `sink`.
    pub fn raw(sink: &'a mut (dyn Write + Send)) -> Self {
        Target::Raw(sink)
    }
}

impl<'a, T> Target<'a, T> {
    /// A target that decodes JSON into `value`.
    pub fn json(value: &'a mut T) -> Self {
        Target::Json(value)
    }
}

/// Structured error body some endpoints send.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Turns a final response into success or a typed error.
pub(crate) async fn classify<T>(
    mut response: reqwest::Response,
    target: &mut Target<'_, T>,
    cancel: &CancellationToken,
) -> Result<()>
where
    T: DeserializeOwned,
{
    let status = response.status();

    if !status.is_success() {
        let headers = response.headers().clone();
        let body = match read_body(response, cancel).await {
            Ok(body) => body,
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            // Best effort: the status alone still classifies the failure
            Err(_) => Bytes::new(),
        };
        return Err(error_for_status(status, &headers, &body));
    }

    match target {
        Target::Discard => {
            read_body(response, cancel).await?;
        }
        Target::Json(value) => {
            let body = read_body(response, cancel).await?;
            if body.iter().all(u8::is_ascii_whitespace) {
                return Ok(());
            }
            **value = serde_json::from_slice(&body).map_err(|source| Error::Decode {
                status,
                raw_response: String::from_utf8_lossy(&body).into_owned(),
                source,
            })?;
        }
        Target::Raw(sink) => {
            loop {
                let chunk = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    chunk = response.chunk() => chunk?,
                };
                match chunk {
                    Some(bytes) => sink.write_all(&bytes).map_err(Error::BodyWrite)?,
                    None => break,
                }
            }
            sink.flush().map_err(Error::BodyWrite)?;
        }
    }

    Ok(())
}

/// Reads the whole body unless `cancel` fires first.
pub(crate) async fn read_body(
    response: reqwest::Response,
    cancel: &CancellationToken,
) -> Result<Bytes> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        body = response.bytes() => body.map_err(Error::Network),
    }
}

/// Builds the typed error for a non-2xx status.
pub(crate) fn error_for_status(status: StatusCode, headers: &HeaderMap, body: &[u8]) -> Error {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Error::RateLimited(RateLimitError::from_headers(headers));
    }

    let structured = serde_json::from_slice::<ErrorBody>(body).ok();
    let raw_response = String::from_utf8_lossy(body).into_owned();
    let message = structured
        .as_ref()
        .and_then(|parsed| parsed.message.as_deref())
        .map(str::trim)
        .filter(|message| !message.is_empty())
        .or_else(|| Some(raw_response.trim()).filter(|text| !text.is_empty()))
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown status"))
        .to_string();

    Error::Api(ApiError {
        status,
        message,
        api_status: structured.and_then(|parsed| parsed.status),
        raw_response,
    })
}
