//! Control-plane client with retry logic and typed error classification.
//!
//! The [`Client`] type is the entry point every endpoint wrapper calls into.
//! Use [`ClientBuilder`] to configure and create clients.

use crate::{
    classify::{self, Target},
    logger::{Logger, TracingLogger},
    request::{self, OutboundRequest, RequestDefaults, RequestOptions},
    response::ResponseMeta,
    retry::{self, AttemptOutcome, RetryConfig, RetryDecision, RetryOn},
    transport::{Transport, TransportConfig},
    Error, Response, Result,
};
use arc_swap::ArcSwapOption;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use url::Url;

/// User-Agent sent when none is configured.
pub const DEFAULT_USER_AGENT: &str = concat!("controlplane-client/", env!("CARGO_PKG_VERSION"));

/// A client for the control-plane API.
///
/// The client is cheap to clone and meant to be shared: every clone uses the
/// same connection pool, configuration and bearer token.
///
/// # Examples
///
/// ```no_run
/// use controlplane_client::Client;
/// use serde::{Deserialize, Serialize};
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
///
/// #[derive(Serialize)]
/// struct CreateApp {
///     name: String,
/// }
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
///     .token("my-api-token")
///     .timeout(Duration::from_secs(30))
///     .max_retries(3)
///     .build()?;
///
/// let cancel = CancellationToken::new();
/// let request = CreateApp { name: "web".to_string() };
/// let created = client.post::<_, App>("apps", &request, &cancel).await?;
/// println!("Created app {}", created.data.id);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    transport: Transport,
    base_url: Url,
    user_agent: HeaderValue,
    default_headers: HeaderMap,
    token: ArcSwapOption<String>,
    retry: RetryConfig,
    logger: Arc<dyn Logger>,
}

impl Client {
    /// Creates a new `ClientBuilder` for configuring a client.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Returns the base address every relative path is resolved against.
    ///
    /// It always ends with `/`.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Replaces the bearer token used by subsequent calls.
    ///
    /// Calls already in flight keep the token they started with. An empty
    /// token clears authentication.
    pub fn set_token(&self, token: impl Into<String>) {
        let token = token.into();
        if token.is_empty() {
            self.inner.token.store(None);
        } else {
            self.inner.token.store(Some(Arc::new(token)));
        }
    }

    /// Removes the bearer token; subsequent calls are unauthenticated.
    pub fn clear_token(&self) {
        self.inner.token.store(None);
    }

    /// Returns a snapshot of the current bearer token.
    pub fn token(&self) -> Option<Arc<String>> {
        self.inner.token.load_full()
    }

    /// Executes a call: builds the request, retries transient failures and
    /// classifies the final response.
    ///
    /// A 2xx body is written into `target`. The returned metadata describes the
    /// final attempt. Cancelling `cancel` stops the call at the next network
    /// read or backoff wait with [`Error::Cancelled`].
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use controlplane_client::{Client, Target};
    /// use http::Method;
    /// use serde::Deserialize;
    /// use tokio_util::sync::CancellationToken;
    ///
    /// #[derive(Default, Deserialize)]
    /// struct Deployment { id: String, state: String }
    ///
    /// # async fn example() -> Result<(), controlplane_client::Error> {
    /// let client = Client::builder()
    ///     .base_url("https://api.example.com/v1")?
    ///     .build()?;
    ///
    /// let mut deployment = Deployment::default();
    /// let meta = client
    ///     .execute::<(), _>(
    ///         Method::POST,
    ///         "apps/web/deployments",
    ///         None,
    ///         Target::json(&mut deployment),
    ///         &CancellationToken::new(),
    ///     )
    ///     .await?;
    /// println!("{} after {} attempts", deployment.state, meta.attempts);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn execute<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        target: Target<'_, T>,
        cancel: &CancellationToken,
    ) -> Result<ResponseMeta>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let options = RequestOptions::new(method, path);
        self.send(&options, body, target, cancel).await
    }

    /// Like [`execute`](Self::execute), with query parameters and extra headers.
    pub async fn send<B, T>(
        &self,
        options: &RequestOptions,
        body: Option<&B>,
        mut target: Target<'_, T>,
        cancel: &CancellationToken,
    ) -> Result<ResponseMeta>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let inner = &self.inner;
        let token = inner.token.load_full();
        let defaults = RequestDefaults {
            base_url: &inner.base_url,
            user_agent: &inner.user_agent,
            default_headers: &inner.default_headers,
            token: token.as_deref().map(String::as_str),
        };
        let request = request::build(&defaults, options, body)?;

        let start_time = Instant::now();
        let mut retries = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let attempts = retries + 1;

            inner.logger.debug(format_args!(
                "{} {} attempt {}",
                request.method, request.url, attempts
            ));

            let result = match inner.transport.execute(&request, cancel).await {
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                other => other,
            };
            // A cancel that lands after the attempt settles still wins
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let outcome = match &result {
                Ok(response) => AttemptOutcome::Status(response.status().as_u16()),
                Err(_) => AttemptOutcome::NetworkError,
            };

            match inner.retry.decide(outcome, retries) {
                RetryDecision::Stop => {
                    let response = result.inspect_err(|e| {
                        inner.logger.error(format_args!(
                            "{} {} failed: {}",
                            request.method, request.url, e
                        ));
                    })?;
                    return self
                        .finish(&request, response, &mut target, start_time, attempts, cancel)
                        .await;
                }
                RetryDecision::Retry(delay) => {
                    match result {
                        Ok(response) => {
                            let status = response.status();
                            // Drain so the connection returns to the pool
                            let _ = classify::read_body(response, cancel).await;
                            inner.logger.warn(format_args!(
                                "{} {} returned {} (attempt {})",
                                request.method, request.url, status, attempts
                            ));
                        }
                        Err(e) => {
                            inner.logger.warn(format_args!(
                                "{} {} failed: {} (attempt {})",
                                request.method, request.url, e, attempts
                            ));
                        }
                    }
                    inner.logger.info(format_args!(
                        "{} {} retrying in {:?}",
                        request.method, request.url, delay
                    ));
                    retry::wait(delay, cancel).await?;
                    retries += 1;
                }
                RetryDecision::Exhausted => {
                    let result = match result {
                        Ok(response) => {
                            self.finish(&request, response, &mut target, start_time, attempts, cancel)
                                .await
                        }
                        Err(e) => Err(e),
                    };
                    return result.map_err(|e| match e {
                        Error::Network(_) | Error::Api(_) => {
                            inner.logger.error(format_args!(
                                "{} {} giving up after {} attempts: {}",
                                request.method, request.url, attempts, e
                            ));
                            Error::RetriesExhausted {
                                attempts,
                                last_error: Box::new(e),
                            }
                        }
                        other => other,
                    });
                }
            }
        }
    }

    /// Classifies the final response and assembles the call metadata.
    async fn finish<T>(
        &self,
        request: &OutboundRequest,
        response: reqwest::Response,
        target: &mut Target<'_, T>,
        start_time: Instant,
        attempts: usize,
        cancel: &CancellationToken,
    ) -> Result<ResponseMeta>
    where
        T: DeserializeOwned,
    {
        let status = response.status();
        let headers = response.headers().clone();

        self.inner.logger.debug(format_args!(
            "{} {} received {} after {:?} ({} attempts)",
            request.method,
            request.url,
            status,
            start_time.elapsed(),
            attempts
        ));

        classify::classify(response, target, cancel)
            .await
            .inspect_err(|e| {
                if !e.is_cancelled() {
                    self.inner.logger.warn(format_args!(
                        "{} {} failed: {}",
                        request.method, request.url, e
                    ));
                }
            })?;

        Ok(Response::new(
            (),
            status,
            headers,
            start_time.elapsed(),
            attempts,
        ))
    }

    /// Runs a call that decodes its body into a fresh `T`.
    async fn call<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        cancel: &CancellationToken,
    ) -> Result<Response<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned + Default,
    {
        let mut data = T::default();
        let meta = self
            .execute(method, path, body, Target::json(&mut data), cancel)
            .await?;
        Ok(meta.map(|()| data))
    }

    /// Makes a GET request. An empty success body yields `T::default()`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use controlplane_client::Client;
    /// use serde::Deserialize;
    /// use tokio_util::sync::CancellationToken;
    ///
    /// #[derive(Default, Deserialize)]
    /// struct Account { email: String }
    ///
    /// # async fn example() -> Result<(), controlplane_client::Error> {
    /// let client = Client::builder()
    ///     .base_url("https://api.example.com/v1")?
    ///     .build()?;
    ///
    /// let account = client.get::<Account>("account", &CancellationToken::new()).await?;
    /// println!("Signed in as {}", account.data.email);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn get<T>(&self, path: &str, cancel: &CancellationToken) -> Result<Response<T>>
    where
        T: DeserializeOwned + Default,
    {
        self.call::<(), T>(Method::GET, path, None, cancel).await
    }

    /// Makes a POST request with a JSON body.
    pub async fn post<B, T>(
        &self,
        path: &str,
        body: &B,
        cancel: &CancellationToken,
    ) -> Result<Response<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned + Default,
    {
        self.call(Method::POST, path, Some(body), cancel).await
    }

    /// Makes a PUT request with a JSON body.
    pub async fn put<B, T>(
        &self,
        path: &str,
        body: &B,
        cancel: &CancellationToken,
    ) -> Result<Response<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned + Default,
    {
        self.call(Method::PUT, path, Some(body), cancel).await
    }

    /// Makes a PATCH request with a JSON body.
    pub async fn patch<B, T>(
        &self,
        path: &str,
        body: &B,
        cancel: &CancellationToken,
    ) -> Result<Response<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned + Default,
    {
        self.call(Method::PATCH, path, Some(body), cancel).await
    }

    /// Makes a DELETE request.
    pub async fn delete<T>(&self, path: &str, cancel: &CancellationToken) -> Result<Response<T>>
    where
        T: DeserializeOwned + Default,
    {
        self.call::<(), T>(Method::DELETE, path, None, cancel).await
    }
}

/// Builder for configuring and creating a [`Client`].
///
/// # Examples
///
/// ```no_run
/// use controlplane_client::{ClientBuilder, NoopLogger};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), controlplane_client::Error> {
/// let client = ClientBuilder::new()
///     .base_url("https://api.example.com/v1")?
///     .user_agent("deploy-bot/2.1")
///     .timeout(Duration::from_secs(15))
///     .max_retries(5)
///     .wait_min(Duration::from_millis(250))
///     .wait_max(Duration::from_secs(10))
///     .logger(Arc::new(NoopLogger))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ClientBuilder {
    base_url: Option<Url>,
    user_agent: Option<String>,
    default_headers: HeaderMap,
    token: Option<String>,
    retry: RetryConfig,
    transport: TransportConfig,
    http_client: Option<reqwest::Client>,
    logger: Option<Arc<dyn Logger>>,
}

impl ClientBuilder {
    /// Creates a new `ClientBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            base_url: None,
            user_agent: None,
            default_headers: HeaderMap::new(),
            token: None,
            retry: RetryConfig::default(),
            transport: TransportConfig::default(),
            http_client: None,
            logger: None,
        }
    }

    /// Sets the base address. A trailing `/` is appended when missing so
    /// relative paths resolve beneath it.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        self.base_url = Some(Url::parse(url.as_ref())?);
        Ok(self)
    }

    /// Sets the User-Agent header. Defaults to [`DEFAULT_USER_AGENT`].
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Adds a header sent with every request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::Configuration(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::Configuration(format!("Invalid header value: {}", e)))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Sets the initial bearer token.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Sets the per-attempt timeout (default 30s).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.transport.timeout = timeout;
        self
    }

    /// Sets the retries allowed after the first attempt (default 3).
    pub fn max_retries(mut self, max_retries: usize) -> Self {
        self.retry.max_retries = max_retries;
        self
    }

    /// Sets the delay before the first retry (default 100ms).
    pub fn wait_min(mut self, wait: Duration) -> Self {
        self.retry.backoff.min_wait = wait;
        self
    }

    /// Sets the cap on the pre-jitter backoff delay (default 5s).
    pub fn wait_max(mut self, wait: Duration) -> Self {
        self.retry.backoff.max_wait = wait;
        self
    }

    /// Sets the jitter fraction applied to each delay (default 0.1).
    pub fn jitter(mut self, jitter: f64) -> Self {
        self.retry.backoff.jitter = jitter;
        self
    }

    /// Sets which attempt outcomes are retried.
    pub fn retry_on(mut self, retry_on: RetryOn) -> Self {
        self.retry.retry_on = retry_on;
        self
    }

    /// Replaces the whole retry configuration.
    pub fn retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets connection pool and timeout tuning.
    pub fn transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    /// Uses a pre-built `reqwest::Client` instead of building one from the
    /// transport configuration. The per-attempt timeout still applies.
    pub fn http_client(mut self, http_client: reqwest::Client) -> Self {
        self.http_client = Some(http_client);
        self
    }

    /// Sets the logger. Defaults to [`TracingLogger`].
    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Builds the configured `Client`.
    ///
    /// # Errors
    ///
    /// Returns an error if no base URL was provided, the base URL cannot hold
    /// relative paths, the retry waits are inverted, or the HTTP client cannot
    /// be built.
    pub fn build(self) -> Result<Client> {
        let mut base_url = self
            .base_url
            .ok_or_else(|| Error::Configuration("Base URL is required".to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::Configuration(format!(
                "Base URL {} cannot hold relative paths",
                base_url
            )));
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        self.retry.validate()?;

        let user_agent = self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT);
        let user_agent = HeaderValue::try_from(user_agent)
            .map_err(|e| Error::Configuration(format!("Invalid user agent: {}", e)))?;

        let http_client = match self.http_client {
            Some(http_client) => http_client,
            None => self.transport.build_client()?,
        };

        let token = self
            .token
            .filter(|token| !token.is_empty())
            .map(Arc::new);

        Ok(Client {
            inner: Arc::new(ClientInner {
                transport: Transport::new(http_client, self.transport.timeout),
                base_url,
                user_agent,
                default_headers: self.default_headers,
                token: ArcSwapOption::new(token),
                retry: self.retry,
                logger: self.logger.unwrap_or_else(|| Arc::new(TracingLogger)),
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let client = Client::builder()
            .base_url("https://api.example.com/v1")
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(client.base_url().as_str(), "https://api.example.com/v1/");
    }

    #[test]
    fn test_base_url_required() {
        assert!(matches!(
            Client::builder().build(),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_inverted_waits_rejected() {
        let result = Client::builder()
            .base_url("https://api.example.com")
            .unwrap()
            .wait_min(Duration::from_secs(10))
            .wait_max(Duration::from_secs(1))
            .build();

        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_token_snapshot_and_rotation() {
        let client = Client::builder()
            .base_url("https://api.example.com")
            .unwrap()
            .token("first")
            .build()
            .unwrap();

        let before = client.token().unwrap();
        client.set_token("second");

        assert_eq!(before.as_str(), "first");
        assert_eq!(client.token().unwrap().as_str(), "second");

        client.set_token("");
        assert!(client.token().is_none());

        client.set_token("third");
        client.clear_token();
        assert!(client.token().is_none());
    }

    #[test]
    fn test_clones_share_token() {
        let client = Client::builder()
            .base_url("https://api.example.com")
            .unwrap()
            .build()
            .unwrap();
        let clone = client.clone();

        client.set_token("shared");

        assert_eq!(clone.token().unwrap().as_str(), "shared");
    }
}
