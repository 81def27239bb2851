//! Example demonstrating custom retry policies.
//!
//! This example shows how to:
//! - Tune the retry budget and backoff window
//! - Retry on an extra status through a custom predicate
//! - Combine policies
//!
//! Run with: `cargo run --example custom_retry`

use controlplane_client::retry::{AttemptOutcome, RetryPredicate};
use controlplane_client::{Client, Error, RetryOn};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Deploys can briefly answer 409 while a previous rollout finishes.
struct RetryOnRolloutConflict {
    max_attempt: usize,
}

impl RetryPredicate for RetryOnRolloutConflict {
    fn should_retry(&self, outcome: AttemptOutcome, attempt: usize) -> bool {
        outcome == AttemptOutcome::Status(409) && attempt <= self.max_attempt
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("controlplane_client=info,custom_retry=info")
        .init();

    let client = Client::builder()
        .base_url("https://api.example.com/v1")?
        .max_retries(5)
        .wait_min(Duration::from_millis(250))
        .wait_max(Duration::from_secs(10))
        .retry_on(RetryOn::Any(vec![
            RetryOn::transient(),
            RetryOn::Custom(Arc::new(RetryOnRolloutConflict { max_attempt: 3 })),
        ]))
        .build()?;

    let cancel = CancellationToken::new();
    match client
        .post::<_, serde_json::Value>("apps/web/deploy", &serde_json::json!({}), &cancel)
        .await
    {
        Ok(response) => println!(
            "Deploy accepted after {} attempts: {}",
            response.attempts, response.data
        ),
        Err(e) => println!("Deploy failed: {}", e),
    }

    Ok(())
}
