//! Basic example: list and create apps on the control plane.
//!
//! This example shows how to:
//! - Create a client with a base address and bearer token
//! - Make typed GET and POST requests
//! - Access response metadata
//!
//! Run with: `API_URL=https://api.example.com/v1 API_TOKEN=... cargo run --example basic_call`

use controlplane_client::{Client, Error};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default, Deserialize)]
#[allow(dead_code)]
struct App {
    id: String,
    name: String,
    region: String,
}

#[derive(Debug, Serialize)]
struct NewApp {
    name: String,
    region: String,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("controlplane_client=debug,basic_call=info")
        .init();

    let base_url =
        std::env::var("API_URL").unwrap_or_else(|_| "https://api.example.com/v1".to_string());
    let client = Client::builder()
        .base_url(base_url)?
        .token(std::env::var("API_TOKEN").unwrap_or_default())
        .build()?;

    let cancel = CancellationToken::new();

    println!("=== GET Request Example ===");
    let response = client.get::<Vec<App>>("apps", &cancel).await?;

    for app in &response.data {
        println!("{} ({}) in {}", app.name, app.id, app.region);
    }
    println!("Request latency: {:?}", response.latency);
    println!("Status code: {}", response.status);
    println!();

    println!("=== POST Request Example ===");
    let new_app = NewApp {
        name: "hello-world".to_string(),
        region: "fra".to_string(),
    };

    let response = client.post::<_, App>("apps", &new_app, &cancel).await?;

    println!("Created app ID: {}", response.data.id);
    println!("Content-Type: {:?}", response.header("content-type"));
    println!("Was retried: {}", response.was_retried());

    Ok(())
}
