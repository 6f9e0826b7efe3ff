//! Basic example demonstrating simple GET and POST requests.
//!
//! This example shows how to:
//! - Derive a client with a base URL
//! - Fetch parsed data and typed JSON
//! - Send a JSON body
//! - Access the full response and its metadata
//!
//! Run with: `cargo run --example basic_fetch`

use hookfetch::{Fetch, FetchError, FetchOptions};
use http::Method;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Post {
    #[serde(rename = "userId")]
    user_id: u32,
    id: u32,
    title: String,
    body: String,
}

#[derive(Debug, Serialize)]
struct NewPost {
    title: String,
    body: String,
    #[serde(rename = "userId")]
    user_id: u32,
}

#[tokio::main]
async fn main() -> Result<(), FetchError> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter("hookfetch=debug,basic_fetch=info")
        .init();

    let api = Fetch::new()
        .create(FetchOptions::new().base_url("https://jsonplaceholder.typicode.com"));

    println!("=== Typed GET ===");
    let post: Post = api.json("/posts/1", FetchOptions::new()).await?;
    println!("Post ID: {}", post.id);
    println!("Title: {}", post.title);
    println!();

    println!("=== Untyped GET with query ===");
    let data = api
        .fetch("/comments", FetchOptions::new().query("postId", 1))
        .await?;
    if let Some(comments) = data.as_ref().and_then(|d| d.as_json()) {
        println!("Comments: {}", comments.as_array().map_or(0, Vec::len));
    }
    println!();

    println!("=== POST with JSON body ===");
    let new_post = NewPost {
        title: "My New Post".to_string(),
        body: "This is the content of my new post!".to_string(),
        user_id: 1,
    };
    let response = api
        .raw(
            "/posts",
            FetchOptions::new().method(Method::POST).json(&new_post)?,
        )
        .await?;

    println!("Status: {} {}", response.status.as_u16(), response.status_text);
    println!("Request latency: {:?}", response.latency);
    println!("Content-Type: {:?}", response.content_type());
    println!("Was retried: {}", response.was_retried());
    if let Some(created) = response.data.as_ref().and_then(|d| d.as_json()) {
        println!("Created post ID: {}", created["id"]);
    }

    Ok(())
}
