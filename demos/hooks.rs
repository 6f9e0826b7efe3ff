//! Example demonstrating lifecycle hooks.
//!
//! This example shows how to:
//! - Add default hooks to a client and call-site hooks to a request
//! - Wrap the rest of a hook chain with a middleware-style hook
//! - Inspect error responses from a response-error hook
//!
//! Run with: `cargo run --example hooks`

use hookfetch::hooks::from_fn;
use hookfetch::{Fetch, FetchContext, FetchError, FetchOptions, Hook, Next};
use std::time::Instant;

/// Logs how long the remaining response hooks take.
struct Timed;

#[async_trait::async_trait]
impl Hook for Timed {
    async fn call(&self, ctx: &mut FetchContext, next: Next<'_>) {
        let started = Instant::now();
        next.run(ctx).await;
        println!("  [timed] remaining response hooks took {:?}", started.elapsed());
    }
}

#[tokio::main]
async fn main() -> Result<(), FetchError> {
    tracing_subscriber::fmt()
        .with_env_filter("hookfetch=info,hooks=info")
        .init();

    let api = Fetch::new().create(
        FetchOptions::new()
            .base_url("https://jsonplaceholder.typicode.com")
            .on_request(from_fn(|ctx: &mut FetchContext| {
                println!("  [default] -> {} {}", ctx.method(), ctx.request);
                if let Ok(value) = "hookfetch-demo".parse() {
                    ctx.options.headers_mut().insert("x-client", value);
                }
            }))
            .on_response(from_fn(|ctx: &mut FetchContext| {
                if let Some(response) = &ctx.response {
                    println!("  [default] <- {} in {:?}", response.status, response.latency);
                }
            }))
            .on_response_error(from_fn(|ctx: &mut FetchContext| {
                if let Some(response) = &ctx.response {
                    println!("  [default] error body: {:?}", response.data);
                }
            })),
    );

    println!("=== Default and call-site hooks ===");
    api.fetch(
        "/todos/1",
        FetchOptions::new()
            .on_request(from_fn(|_: &mut FetchContext| println!("  [call] runs first")))
            .on_response(Timed),
    )
    .await?;
    println!();

    println!("=== Response-error hook ===");
    match api.fetch("/todos/does-not-exist", FetchOptions::new()).await {
        Ok(_) => println!("Unexpected success"),
        Err(e) => println!("Failed: {}", e),
    }

    Ok(())
}
