//! Example demonstrating how callers branch on the typed errors.
//!
//! This example shows how to:
//! - Back off on rate limits using the server's Retry-After
//! - Report API errors with their status and message
//! - Spot response-shape mismatches
//! - Cancel a call from another task
//!
//! Run with: `cargo run --example error_handling`

use controlplane_client::{Client, Error};
use serde::Deserialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default, Deserialize)]
#[allow(dead_code)]
struct App {
    id: String,
    name: String,
}

fn report(result: Result<controlplane_client::Response<App>, Error>) {
    match result {
        Ok(response) => println!("Success: {:?}", response.data),
        Err(Error::RateLimited(limit)) => {
            println!("Rate limited!");
            println!("  Retry after: {:?}", limit.retry_after);
            println!("  Quota: {}/{}", limit.remaining, limit.limit);
        }
        Err(Error::Api(api)) => {
            println!("API error!");
            println!("  Status: {}", api.status);
            println!("  Message: {}", api.message);
            println!("  Is client error (4xx): {}", api.status.is_client_error());
        }
        Err(Error::Decode {
            status,
            raw_response,
            source,
        }) => {
            println!("Response did not match the expected shape (status {})", status);
            println!("  Serde error: {}", source);
            println!(
                "  Raw response (first 200 chars): {}",
                raw_response.chars().take(200).collect::<String>()
            );
        }
        Err(Error::RetriesExhausted {
            attempts,
            last_error,
        }) => {
            println!("Gave up after {} attempts: {}", attempts, last_error);
        }
        Err(Error::Cancelled) => println!("Cancelled by the caller"),
        Err(e) => println!("Other error: {}", e),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("controlplane_client=info")
        .init();

    let client = Client::builder()
        .base_url("https://api.example.com/v1")?
        .max_retries(2)
        .build()?;

    println!("=== Example 1: Missing resource ===");
    let cancel = CancellationToken::new();
    report(client.get::<App>("apps/does-not-exist", &cancel).await);
    println!();

    println!("=== Example 2: Cancelling a slow call ===");
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });
    report(client.get::<App>("apps/web", &cancel).await);

    Ok(())
}
