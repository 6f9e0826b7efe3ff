//! # hookfetch - A hookable HTTP fetch client
//!
//! hookfetch is an HTTP client built on top of `reqwest` that layers option
//! merging, lifecycle hooks, automatic retries and timeouts over a single
//! raw-send primitive. Response bodies are parsed according to their content
//! type, and every failure surfaces as one structured [`FetchError`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use hookfetch::{Fetch, FetchOptions};
//! use http::Method;
//! use serde::Deserialize;
//! use std::time::Duration;
//!
//! #[derive(Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), hookfetch::FetchError> {
//!     let api = Fetch::new().create(
//!         FetchOptions::new()
//!             .base_url("https://api.example.com")
//!             .timeout(Duration::from_secs(30))
//!             .retry(2),
//!     );
//!
//!     // GET with typed JSON decoding
//!     let user: User = api.json("/users/123", FetchOptions::new()).await?;
//!     println!("User: {}", user.name);
//!
//!     // POST a JSON body and keep the full response
//!     let created = api
//!         .raw(
//!             "/users",
//!             FetchOptions::new()
//!                 .method(Method::POST)
//!                 .json(&serde_json::json!({ "name": "Alice" }))?,
//!         )
//!         .await?;
//!     println!("Created with status {} in {:?}", created.status, created.latency);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Mergeable options** - Per-call options layered over client defaults, with nested clients via [`Fetch::create`]
//! - **Lifecycle hooks** - Request, request-error, response and response-error chains composed as middleware
//! - **Retries** - Per-method retry budgets, retryable status sets and pluggable delay strategies
//! - **Timeouts and cancellation** - Per-attempt timeouts and caller [`AbortController`]s
//! - **Response type detection** - JSON, text, blob, array buffer or stream, picked from the content type
//! - **Rich errors** - Every failure keeps the request, options, response and parsed error body
//! - **Pluggable transport** - Swap `reqwest` for any [`Transport`] implementation
//!
//! ## Error Handling
//!
//! ```no_run
//! use hookfetch::{ErrorKind, Fetch, FetchOptions};
//!
//! # async fn example() {
//! let fetch = Fetch::new();
//! match fetch.fetch("https://api.example.com/missing", FetchOptions::new()).await {
//!     Ok(data) => println!("Success: {:?}", data),
//!     Err(e) if e.kind() == ErrorKind::Http => {
//!         eprintln!("{}", e);
//!         eprintln!("  Error body: {:?}", e.data());
//!     }
//!     Err(e) if e.is_timeout() => eprintln!("Timed out: {}", e),
//!     Err(e) => eprintln!("Other error: {}", e),
//! }
//! # }
//! ```
//!
//! ## Hooks and Retries
//!
//! ```no_run
//! use hookfetch::{hooks::from_fn, Fetch, FetchContext, FetchOptions, RetryDelay};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), hookfetch::FetchError> {
//! let api = Fetch::new().create(
//!     FetchOptions::new()
//!         .base_url("https://api.example.com")
//!         .on_request(from_fn(|ctx: &mut FetchContext| {
//!             ctx.options
//!                 .headers_mut()
//!                 .insert("x-request-attempt", ctx.attempt.into());
//!         }))
//!         .retry(3)
//!         .retry_delay(RetryDelay::ExponentialBackoff {
//!             initial_delay: Duration::from_millis(100),
//!             max_delay: Duration::from_secs(5),
//!             jitter: true,
//!         }),
//! );
//! let data = api.fetch("/flaky", FetchOptions::new()).await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod context;
mod error;
pub mod hooks;
mod options;
pub mod query;
mod response;
mod response_type;
pub mod retry;
mod signal;
mod transport;

pub use client::{Fetch, FetchBuilder};
pub use context::FetchContext;
pub use error::{BoxError, ErrorKind, FetchError, ParseError, Result, TransportError};
pub use hooks::{Hook, HookChain, HookSlot, Hooks, Next};
pub use options::{Duplex, FetchOptions, RequestBody, StreamBody};
pub use response::{Blob, ByteStream, FetchResponse, ResponseBody, ResponseData};
pub use response_type::{ResponseType, ResponseTypeDetector};
pub use retry::RetryDelay;
pub use signal::{AbortController, AbortReason, AbortSignal, TimeoutGuard};
pub use transport::{RawRequest, RawResponse, ReqwestTransport, Transport, TransportBody};
