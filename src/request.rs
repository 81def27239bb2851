//! Request options and outbound request construction.
//!
//! A call's request is built exactly once, before any network activity. The
//! serialized body is held as [`Bytes`] so every retry attempt gets a fresh,
//! cheap copy without serializing again.

use crate::{Error, Result};
use bytes::Bytes;
use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::Serialize;
use std::time::Duration;
use url::Url;

const APPLICATION_JSON: &str = "application/json";

/// Per-request options: method, path, query parameters and extra headers.
///
/// # Examples
///
/// ```
/// use controlplane_client::RequestOptions;
/// use http::Method;
///
/// let options = RequestOptions::new(Method::GET, "apps")
///     .with_query_param("page", "2")
///     .with_query_param("per_page", "50");
/// assert_eq!(options.query.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// The HTTP method (GET, POST, etc.).
    pub method: Method,

    /// Path relative to the base address, or an absolute URL.
    pub path: String,

    /// Extra headers for this request. They override client-wide headers.
    pub headers: HeaderMap,

    /// Query parameters, encoded in insertion order.
    pub query: Vec<(String, String)>,
}

impl RequestOptions {
    /// Creates options for `method` on `path`.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            query: Vec::new(),
        }
    }

    /// Adds a header to the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::Configuration(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::Configuration(format!("Invalid header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Appends a query parameter.
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Appends several query parameters.
    pub fn with_query_params(mut self, params: impl IntoIterator<Item = (String, String)>) -> Self {
        self.query.extend(params);
        self
    }
}

/// A fully resolved request, ready to be sent any number of times.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    /// The HTTP method.
    pub method: Method,
    /// The absolute URL.
    pub url: Url,
    /// Every header sent with the request.
    pub headers: HeaderMap,
    /// The serialized JSON body, if any.
    pub body: Option<Bytes>,
}

impl OutboundRequest {
    /// Materializes an independent `reqwest::Request` for one attempt.
    pub(crate) fn to_attempt(&self, timeout: Duration) -> reqwest::Request {
        let mut request = reqwest::Request::new(self.method.clone(), self.url.clone());
        *request.headers_mut() = self.headers.clone();
        *request.timeout_mut() = Some(timeout);
        if let Some(body) = &self.body {
            *request.body_mut() = Some(body.clone().into());
        }
        request
    }
}

/// Client-wide state the builder reads for every request.
pub(crate) struct RequestDefaults<'a> {
    pub base_url: &'a Url,
    pub user_agent: &'a HeaderValue,
    pub default_headers: &'a HeaderMap,
    pub token: Option<&'a str>,
}

/// Builds the outbound request for a call.
///
/// Performs no I/O. Fails on an unresolvable path, an unserializable body, or
/// a bearer token that is not a valid header value.
pub(crate) fn build<B>(
    defaults: &RequestDefaults<'_>,
    options: &RequestOptions,
    body: Option<&B>,
) -> Result<OutboundRequest>
where
    B: Serialize + ?Sized,
{
    let mut url = defaults
        .base_url
        .join(&options.path)
        .map_err(|source| Error::RequestConstruction {
            path: options.path.clone(),
            source,
        })?;
    if !options.query.is_empty() {
        url.query_pairs_mut().extend_pairs(&options.query);
    }

    let mut headers = defaults.default_headers.clone();
    headers.insert(ACCEPT, HeaderValue::from_static(APPLICATION_JSON));
    headers.insert(USER_AGENT, defaults.user_agent.clone());

    // serde_json leaves <, > and & unescaped, so bodies round-trip verbatim
    let body = match body {
        Some(value) => {
            let json = serde_json::to_vec(value).map_err(Error::Serialization)?;
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
            Some(Bytes::from(json))
        }
        None => None,
    };

    if let Some(token) = defaults.token.filter(|token| !token.is_empty()) {
        let mut value = HeaderValue::try_from(format!("Bearer {}", token)).map_err(|_| {
            Error::Configuration("bearer token is not a valid header value".to_string())
        })?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    for (name, value) in &options.headers {
        headers.insert(name, value.clone());
    }

    Ok(OutboundRequest {
        method: options.method.clone(),
        url,
        headers,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use std::collections::HashMap;

    struct Fixture {
        base_url: Url,
        user_agent: HeaderValue,
        default_headers: HeaderMap,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                base_url: Url::parse("https://api.example.com/v1/").unwrap(),
                user_agent: HeaderValue::from_static("test-agent/1.0"),
                default_headers: HeaderMap::new(),
            }
        }

        fn defaults<'a>(&'a self, token: Option<&'a str>) -> RequestDefaults<'a> {
            RequestDefaults {
                base_url: &self.base_url,
                user_agent: &self.user_agent,
                default_headers: &self.default_headers,
                token,
            }
        }
    }

    #[derive(Serialize)]
    struct Note {
        text: String,
    }

    #[test]
    fn test_relative_path_resolves_under_base() {
        let fixture = Fixture::new();
        let options = RequestOptions::new(Method::GET, "apps/42");

        let request = build::<()>(&fixture.defaults(None), &options, None).unwrap();

        assert_eq!(request.url.as_str(), "https://api.example.com/v1/apps/42");
        assert!(request.body.is_none());
        assert!(request.headers.get(CONTENT_TYPE).is_none());
        assert_eq!(request.headers[ACCEPT], "application/json");
        assert_eq!(request.headers[USER_AGENT], "test-agent/1.0");
    }

    #[test]
    fn test_absolute_url_is_used_as_is() {
        let fixture = Fixture::new();
        let options = RequestOptions::new(Method::GET, "https://other.example.com/x?y=1");

        let request = build::<()>(&fixture.defaults(None), &options, None).unwrap();

        assert_eq!(request.url.as_str(), "https://other.example.com/x?y=1");
    }

    #[test]
    fn test_malformed_path_names_the_path() {
        let fixture = Fixture::new();
        let options = RequestOptions::new(Method::GET, "http://[::1/apps");

        match build::<()>(&fixture.defaults(None), &options, None) {
            Err(Error::RequestConstruction { path, .. }) => assert_eq!(path, "http://[::1/apps"),
            other => panic!("Expected RequestConstruction, got {:?}", other),
        }
    }

    #[test]
    fn test_bearer_token_only_when_present() {
        let fixture = Fixture::new();
        let options = RequestOptions::new(Method::GET, "apps");

        let with = build::<()>(&fixture.defaults(Some("s3cret")), &options, None).unwrap();
        assert_eq!(with.headers[AUTHORIZATION], "Bearer s3cret");
        assert!(with.headers[AUTHORIZATION].is_sensitive());

        let without = build::<()>(&fixture.defaults(None), &options, None).unwrap();
        assert!(without.headers.get(AUTHORIZATION).is_none());

        let empty = build::<()>(&fixture.defaults(Some("")), &options, None).unwrap();
        assert!(empty.headers.get(AUTHORIZATION).is_none());
    }

    #[test]
    fn test_body_is_json_without_html_escaping() {
        let fixture = Fixture::new();
        let options = RequestOptions::new(Method::POST, "notes");
        let note = Note {
            text: "<b>fish & chips</b>".to_string(),
        };

        let request = build(&fixture.defaults(None), &options, Some(&note)).unwrap();

        assert_eq!(request.headers[CONTENT_TYPE], "application/json");
        assert_eq!(
            request.body.as_deref(),
            Some(br#"{"text":"<b>fish & chips</b>"}"#.as_slice())
        );
    }

    #[test]
    fn test_unserializable_body() {
        let fixture = Fixture::new();
        let options = RequestOptions::new(Method::POST, "things");
        let mut body = HashMap::new();
        body.insert((1u8, 2u8), "tuple keys are not valid JSON object keys");

        let result = build(&fixture.defaults(None), &options, Some(&body));

        assert!(matches!(result, Err(Error::Serialization(_))));
    }

    #[test]
    fn test_query_and_override_headers() {
        let fixture = Fixture::new();
        let options = RequestOptions::new(Method::GET, "apps")
            .with_query_param("page", "2")
            .with_query_param("name", "a b&c")
            .with_header("accept", "text/plain")
            .unwrap();

        let request = build::<()>(&fixture.defaults(None), &options, None).unwrap();

        assert_eq!(
            request.url.as_str(),
            "https://api.example.com/v1/apps?page=2&name=a+b%26c"
        );
        assert_eq!(request.headers[ACCEPT], "text/plain");
    }

    #[test]
    fn test_attempts_get_independent_bodies() {
        let fixture = Fixture::new();
        let options = RequestOptions::new(Method::PUT, "notes/1");
        let note = Note {
            text: "again".to_string(),
        };
        let request = build(&fixture.defaults(None), &options, Some(&note)).unwrap();

        let first = request.to_attempt(Duration::from_secs(1));
        let second = request.to_attempt(Duration::from_secs(1));

        let first_body = first.body().and_then(|b| b.as_bytes()).unwrap();
        let second_body = second.body().and_then(|b| b.as_bytes()).unwrap();
        assert_eq!(first_body, second_body);
        assert_eq!(first.timeout(), Some(&Duration::from_secs(1)));
        assert_eq!(second.method(), &Method::PUT);
    }
}
