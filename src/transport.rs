//! The raw-send capability the pipeline is built on.
//!
//! A [`Transport`] performs exactly one HTTP exchange. It knows nothing about
//! hooks, retries or response parsing. [`ReqwestTransport`] is the default
//! implementation; tests and embedders can provide their own.

use crate::error::TransportError;
use crate::options::Duplex;
use crate::response::{ByteStream, ResponseBody};
use crate::signal::{AbortReason, AbortSignal};
use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use url::Url;

/// A fully built request, ready to send.
#[derive(Debug)]
pub struct RawRequest {
    /// The request method.
    pub method: Method,
    /// The absolute request URL.
    pub url: Url,
    /// The request headers.
    pub headers: HeaderMap,
    /// The encoded body.
    pub body: Option<TransportBody>,
    /// The duplex mode, set for streaming bodies.
    pub duplex: Option<Duplex>,
}

/// An encoded request body.
#[derive(Debug)]
pub enum TransportBody {
    /// A body held in memory.
    Bytes(Bytes),
    /// A streamed body.
    Stream(ByteStream),
}

/// What a transport hands back for a completed exchange.
#[derive(Debug)]
pub struct RawResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The reason phrase sent by the server, when the transport knows it.
    pub status_text: Option<String>,
    /// The response headers.
    pub headers: HeaderMap,
    /// The final URL, after redirects.
    pub url: Url,
    /// The unread body.
    pub body: ResponseBody,
}

impl RawResponse {
    /// Creates a response with no headers and an empty body.
    pub fn new(status: StatusCode, url: Url) -> Self {
        Self {
            status,
            status_text: None,
            headers: HeaderMap::new(),
            url,
            body: ResponseBody::Bytes(Bytes::new()),
        }
    }

    /// Adds a header.
    pub fn with_header(mut self, name: &'static str, value: &'static str) -> Self {
        self.headers.append(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
        self
    }

    /// Sets the body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = ResponseBody::Bytes(body.into());
        self
    }

    /// Sets a JSON body and the matching `content-type`.
    pub fn with_json(self, value: &serde_json::Value) -> Self {
        self.with_header("content-type", "application/json")
            .with_body(value.to_string())
    }
}

/// Sends one request.
///
/// Implementations should return [`TransportError::Aborted`] or
/// [`TransportError::Timeout`] when `signal` fires, though the pipeline also
/// drops the pending send itself once the signal fires.
///
/// # Examples
///
/// ```
/// use hookfetch::{AbortSignal, RawRequest, RawResponse, Transport, TransportError};
/// use http::StatusCode;
///
/// struct AlwaysTeapot;
///
/// #[async_trait::async_trait]
/// impl Transport for AlwaysTeapot {
///     async fn send(
///         &self,
///         request: RawRequest,
///         _signal: AbortSignal,
///     ) -> Result<RawResponse, TransportError> {
///         Ok(RawResponse::new(StatusCode::IM_A_TEAPOT, request.url).with_body("short and stout"))
///     }
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs the exchange.
    async fn send(
        &self,
        request: RawRequest,
        signal: AbortSignal,
    ) -> Result<RawResponse, TransportError>;
}

/// A [`Transport`] backed by a `reqwest::Client`.
///
/// Response bodies are handed on as streams and read only when parsed.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport with a default `reqwest::Client`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport that sends through `client`.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        request: RawRequest,
        signal: AbortSignal,
    ) -> Result<RawResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);

        if let Some(body) = request.body {
            builder = builder.body(match body {
                TransportBody::Bytes(bytes) => reqwest::Body::from(bytes),
                TransportBody::Stream(stream) => reqwest::Body::wrap_stream(stream),
            });
        }

        let response = tokio::select! {
            reason = signal.aborted() => {
                return Err(match reason {
                    AbortReason::Caller => TransportError::Aborted,
                    AbortReason::Timeout => TransportError::Timeout,
                });
            }
            result = builder.send() => result?,
        };

        Ok(RawResponse {
            status: response.status(),
            status_text: None,
            headers: response.headers().clone(),
            url: response.url().clone(),
            body: ResponseBody::Stream(ByteStream::new(response.bytes_stream())),
        })
    }
}
