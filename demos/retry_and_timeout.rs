//! Example demonstrating retries, timeouts and cancellation.
//!
//! This example shows how to:
//! - Retry retryable statuses with exponential backoff
//! - Honour `Retry-After` headers
//! - Bound each attempt with a timeout
//! - Cancel a request from another task
//!
//! Run with: `cargo run --example retry_and_timeout`

use hookfetch::{AbortController, ErrorKind, Fetch, FetchError, FetchOptions, RetryDelay};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), FetchError> {
    // Initialize tracing to see retry attempts
    tracing_subscriber::fmt()
        .with_env_filter("hookfetch=info,retry_and_timeout=info")
        .init();

    let fetch = Fetch::new().create(FetchOptions::new().base_url("https://httpbin.org"));

    println!("=== Exponential Backoff ===");
    println!("Delays: 100ms, 200ms, 400ms (with jitter)");
    let result = fetch
        .fetch(
            "/status/503",
            FetchOptions::new()
                .retry(3)
                .retry_delay(RetryDelay::ExponentialBackoff {
                    initial_delay: Duration::from_millis(100),
                    max_delay: Duration::from_secs(5),
                    jitter: true,
                }),
        )
        .await;
    match result {
        Ok(_) => println!("Unexpected success"),
        Err(e) => println!(
            "Gave up after {:?} attempts: {}",
            e.response().map(|r| r.attempts),
            e
        ),
    }
    println!();

    println!("=== Retry-After ===");
    let result = fetch
        .fetch(
            "/status/429",
            FetchOptions::new().retry(1).retry_delay(RetryDelay::RetryAfter {
                fallback: Duration::from_millis(500),
                max_wait: Duration::from_secs(10),
            }),
        )
        .await;
    if let Err(e) = result {
        println!("Still rate limited: {}", e);
    }
    println!();

    println!("=== Timeout ===");
    let result = fetch
        .fetch(
            "/delay/5",
            FetchOptions::new()
                .timeout(Duration::from_millis(500))
                .no_retry(),
        )
        .await;
    match result {
        Err(e) if e.kind() == ErrorKind::Timeout => println!("Timed out: {}", e),
        Err(e) => println!("Other error: {}", e),
        Ok(_) => println!("Unexpected success"),
    }
    println!();

    println!("=== Cancellation ===");
    let controller = AbortController::new();
    let aborter = controller.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        aborter.abort();
    });
    match fetch
        .fetch(
            "/delay/5",
            FetchOptions::new().retry(3).signal(controller.signal()),
        )
        .await
    {
        Err(e) if e.is_aborted() => println!("Aborted without retrying: {}", e),
        Err(e) => println!("Other error: {}", e),
        Ok(_) => println!("Unexpected success"),
    }

    Ok(())
}
