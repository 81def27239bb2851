//! # controlplane-client - transport core for a typed control-plane API client
//!
//! Every endpoint wrapper of the control-plane API goes through one call path:
//! build the request, send it with bounded retries, and classify the answer
//! into decoded data or a typed error. This crate is that call path, built on
//! top of `reqwest`.
//!
//! ## Quick Start
//!
//! ```no_run
//! use controlplane_client::Client;
//! use serde::{Deserialize, Serialize};
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! #[derive(Serialize)]
//! struct Scale {
//!     replicas: u32,
//! }
//!
//! #[derive(Debug, Default, Deserialize)]
//! struct App {
//!     id: String,
//!     replicas: u32,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), controlplane_client::Error> {
//!     let client = Client::builder()
//!         .base_url("https://api.example.com/v1")?
//!         .token(std::env::var("API_TOKEN").unwrap_or_default())
//!         .timeout(Duration::from_secs(30))
//!         .max_retries(3)
//!         .build()?;
//!
//!     let cancel = CancellationToken::new();
//!
//!     let app = client.get::<App>("apps/web", &cancel).await?;
//!     println!("App {} has {} replicas", app.data.id, app.data.replicas);
//!
//!     let scaled = client
//!         .patch::<_, App>("apps/web", &Scale { replicas: 3 }, &cancel)
//!         .await?;
//!     println!("Scaled after {} attempts", scaled.attempts);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Retries
//!
//! Network errors and statuses 0, 429 and 5xx are retried up to
//! `max_retries` times (default 3) with exponential backoff: `min_wait *
//! 2^(n-1)` capped at `max_wait`, perturbed by +/-10% jitter. Other 4xx
//! responses are returned immediately. The outcome set is pluggable through
//! [`RetryOn`].
//!
//! ## Error Handling
//!
//! ```no_run
//! use controlplane_client::{Client, Error};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Error> {
//! # let client = Client::builder().base_url("https://api.example.com")?.build()?;
//! match client.get::<serde_json::Value>("apps", &CancellationToken::new()).await {
//!     Ok(response) => println!("Apps: {}", response.data),
//!     Err(Error::RateLimited(limit)) => {
//!         eprintln!("Rate limited, retry in {:?}", limit.retry_after);
//!     }
//!     Err(Error::Api(api)) => eprintln!("API error {}: {}", api.status, api.message),
//!     Err(Error::Decode { raw_response, .. }) => {
//!         eprintln!("Unexpected response shape: {}", raw_response);
//!     }
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! # Ok(())
//! # }
//! ```

mod classify;
mod client;
mod error;
pub mod logger;
pub mod rate_limit;
mod request;
mod response;
pub mod retry;
mod transport;

pub use classify::Target;
pub use client::{Client, ClientBuilder, DEFAULT_USER_AGENT};
pub use error::{ApiError, Error, Result};
pub use logger::{Logger, NoopLogger, TracingLogger};
pub use rate_limit::RateLimitError;
pub use request::{OutboundRequest, RequestOptions};
pub use response::{Response, ResponseMeta};
pub use retry::{Backoff, RetryConfig, RetryOn, RetryPredicate};
pub use transport::TransportConfig;
