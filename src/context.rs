//! Per-attempt state threaded through hooks.

use crate::error::BoxError;
use crate::options::FetchOptions;
use crate::response::FetchResponse;
use http::Method;

/// The mutable state of one attempt.
///
/// Hooks receive the context and may rewrite the target, adjust options,
/// replace the response, or record an error. An error recorded by a
/// non-error hook stops the remaining request and response hooks of the
/// attempt and is reported in the final [`FetchError`](crate::FetchError)
/// message, but never triggers a retry on its own.
#[derive(Debug)]
pub struct FetchContext {
    /// The request target. After the build step this is the full URL.
    pub request: String,

    /// The effective options of this attempt.
    pub options: FetchOptions,

    /// The response, once received.
    pub response: Option<FetchResponse>,

    /// The transport failure or hook-recorded error, if any.
    pub error: Option<BoxError>,

    /// The attempt number, starting at 1.
    pub attempt: usize,
}

impl FetchContext {
    /// Creates the context for an attempt.
    pub fn new(request: impl Into<String>, options: FetchOptions, attempt: usize) -> Self {
        Self {
            request: request.into(),
            options,
            response: None,
            error: None,
            attempt,
        }
    }

    /// The request method, `GET` unless configured.
    pub fn method(&self) -> Method {
        self.options.method_or_default()
    }

    /// Records an error on the context.
    pub fn set_error(&mut self, error: impl Into<BoxError>) {
        self.error = Some(error.into());
    }
}
