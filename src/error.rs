//! Error types for fetch calls.
//!
//! Every failed call surfaces as a single [`FetchError`]. It keeps the request
//! target, the effective options, the response (with its parsed data) when one
//! was received, and the underlying cause, so callers can branch on
//! [`ErrorKind`] and still inspect everything the server sent back.

use crate::context::FetchContext;
use crate::options::FetchOptions;
use crate::response::{FetchResponse, ResponseData};
use crate::retry::DEFAULT_RETRY_STATUS_CODES;
use http::{Method, StatusCode};

/// A boxed error that can cross threads.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure reported by a [`Transport`](crate::Transport) instead of a response.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    /// The exchange failed below HTTP (connection refused, DNS, TLS, reset...).
    #[error("Network error: {0}")]
    Network(#[source] BoxError),

    /// The caller aborted the request.
    #[error("The operation was aborted")]
    Aborted,

    /// The per-attempt timeout elapsed before a response arrived.
    #[error("The operation was aborted due to timeout")]
    Timeout,

    /// The request could not be built (bad URL, consumed body stream, ...).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl TransportError {
    /// Wraps any error as a network failure.
    pub fn network(error: impl Into<BoxError>) -> Self {
        TransportError::Network(error.into())
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TransportError::Timeout
        } else if error.is_builder() {
            TransportError::InvalidRequest(error.to_string())
        } else {
            TransportError::Network(Box::new(error))
        }
    }
}

/// The response body could not be parsed.
#[derive(thiserror::Error, Debug)]
#[error("Failed to parse response: {0}")]
pub struct ParseError(#[source] pub BoxError);

/// Broad category of a [`FetchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The transport failed without a response.
    Network,
    /// The per-attempt timeout elapsed, on the last allowed attempt.
    Timeout,
    /// The caller aborted the request.
    Aborted,
    /// The server answered with an error status.
    Http,
    /// A hook flagged an otherwise successful response as failed.
    Hook,
    /// The body could not be parsed into the requested shape.
    Parse,
    /// The request could not be built or the options were invalid.
    InvalidRequest,
}

/// The error returned by every failing call.
///
/// The message follows the form `[METHOD] "url": <status> <status text>`,
/// followed by the message of the error recorded on the context, if any.
///
/// # Examples
///
/// ```no_run
/// use hookfetch::{ErrorKind, Fetch, FetchOptions};
///
/// # async fn example() {
/// let fetch = Fetch::new();
///
/// match fetch.fetch("https://api.example.com/missing", FetchOptions::new()).await {
///     Ok(data) => println!("Success: {:?}", data),
///     Err(e) if e.kind() == ErrorKind::Http => {
///         eprintln!("HTTP {:?}: {:?}", e.status(), e.data());
///     }
///     Err(e) if e.is_timeout() => eprintln!("Timed out: {}", e),
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
#[error("{message}")]
pub struct FetchError {
    kind: ErrorKind,
    message: String,
    request: String,
    method: Method,
    options: Box<FetchOptions>,
    response: Option<Box<FetchResponse>>,
    #[source]
    cause: Option<BoxError>,
}

impl FetchError {
    /// Builds the error for a failed attempt from its context.
    ///
    /// This is the default error factory; it can be replaced per client or call
    /// with [`FetchOptions::create_fetch_error`].
    pub fn from_context(ctx: FetchContext) -> Self {
        let kind = classify(&ctx);
        let method = ctx.method();

        let status = match &ctx.response {
            Some(response) => format!("{} {}", response.status.as_u16(), response.status_text)
                .trim_end()
                .to_string(),
            None => "<no response>".to_string(),
        };
        let target = serde_json::Value::String(ctx.request.clone());
        let mut message = format!("[{}] {}: {}", method, target, status);
        if let Some(error) = &ctx.error {
            message.push(' ');
            message.push_str(&error.to_string());
        }

        Self {
            kind,
            message,
            request: ctx.request,
            method,
            options: Box::new(ctx.options),
            response: ctx.response.map(Box::new),
            cause: ctx.error,
        }
    }

    /// An error for options that could not be applied, raised before any request.
    pub fn invalid_options(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            kind: ErrorKind::InvalidRequest,
            cause: Some(Box::new(TransportError::InvalidRequest(message.clone()))),
            message,
            request: String::new(),
            method: Method::GET,
            options: Box::default(),
            response: None,
        }
    }

    /// Returns the error category.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the formatted message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the request target, after base-URL and query composition.
    pub fn request(&self) -> &str {
        &self.request
    }

    /// Returns the request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the effective options of the failed call.
    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    /// Returns the response, if one was received.
    pub fn response(&self) -> Option<&FetchResponse> {
        self.response.as_deref()
    }

    /// Takes the response out of the error.
    pub fn into_response(self) -> Option<FetchResponse> {
        self.response.map(|response| *response)
    }

    /// Returns the parsed response body, if one was received.
    pub fn data(&self) -> Option<&ResponseData> {
        self.response()?.data.as_ref()
    }

    /// Returns the HTTP status code if a response was received.
    pub fn status(&self) -> Option<StatusCode> {
        self.response().map(|response| response.status)
    }

    /// Returns the status reason phrase if a response was received.
    pub fn status_text(&self) -> Option<&str> {
        self.response().map(|response| response.status_text.as_str())
    }

    /// Returns `true` if the last attempt timed out.
    pub fn is_timeout(&self) -> bool {
        self.kind == ErrorKind::Timeout
    }

    /// Returns `true` if the caller aborted the request.
    pub fn is_aborted(&self) -> bool {
        self.kind == ErrorKind::Aborted
    }

    /// Returns `true` if this failure would be retried under the default policy.
    ///
    /// Network errors, timeouts and the default retryable statuses qualify.
    pub fn is_retryable(&self) -> bool {
        match self.kind {
            ErrorKind::Network | ErrorKind::Timeout => true,
            ErrorKind::Http => self
                .status()
                .is_some_and(|status| DEFAULT_RETRY_STATUS_CODES.contains(&status.as_u16())),
            ErrorKind::Aborted | ErrorKind::Hook | ErrorKind::Parse | ErrorKind::InvalidRequest => {
                false
            }
        }
    }
}

fn classify(ctx: &FetchContext) -> ErrorKind {
    let cause = ctx.error.as_deref();

    if let Some(error) = cause.and_then(|e| e.downcast_ref::<TransportError>()) {
        return match error {
            TransportError::Network(_) => ErrorKind::Network,
            TransportError::Aborted => ErrorKind::Aborted,
            TransportError::Timeout => ErrorKind::Timeout,
            TransportError::InvalidRequest(_) => ErrorKind::InvalidRequest,
        };
    }
    if cause.is_some_and(|e| e.is::<ParseError>()) {
        return ErrorKind::Parse;
    }

    match &ctx.response {
        Some(response) if response.status.is_client_error() || response.status.is_server_error() => {
            ErrorKind::Http
        }
        Some(_) if cause.is_some() => ErrorKind::Hook,
        Some(_) => ErrorKind::Http,
        None => ErrorKind::Network,
    }
}

/// A specialized `Result` type for fetch calls.
pub type Result<T> = std::result::Result<T, FetchError>;
