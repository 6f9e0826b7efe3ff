//! Response wrapper that keeps the parsed data next to the raw exchange details.
//!
//! A [`FetchResponse`] starts out with an unread [`ResponseBody`]. The pipeline
//! materializes the body according to the resolved [`ResponseType`] and stores
//! the result in [`FetchResponse::data`]; hooks may also replace it.

use crate::error::BoxError;
use crate::response_type::ResponseType;
use crate::transport::RawResponse;
use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt, TryStreamExt};
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use std::fmt;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;
use url::Url;

type DynByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, BoxError>> + Send>>;

/// A stream of body chunks.
///
/// Used both for streaming request bodies and for responses read with
/// [`ResponseType::Stream`].
pub struct ByteStream {
    inner: Mutex<DynByteStream>,
}

impl ByteStream {
    /// Wraps any fallible stream of byte chunks.
    pub fn new<S, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        let stream = stream.map_err(Into::<BoxError>::into);
        Self {
            inner: Mutex::new(Box::pin(stream)),
        }
    }

    /// A stream yielding `bytes` as a single chunk.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        Self::new(futures::stream::once(async move { Ok::<_, BoxError>(bytes) }))
    }

    /// Reads the whole stream into one buffer.
    pub async fn collect_bytes(mut self) -> Result<Bytes, BoxError> {
        let mut buffer = BytesMut::new();
        while let Some(chunk) = self.next().await {
            buffer.extend_from_slice(&chunk?);
        }
        Ok(buffer.freeze())
    }
}

impl Stream for ByteStream {
    type Item = Result<Bytes, BoxError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let inner = self
            .get_mut()
            .inner
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        inner.as_mut().poll_next(cx)
    }
}

impl fmt::Debug for ByteStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ByteStream")
    }
}

/// A response body that has not been read yet.
#[derive(Debug)]
pub enum ResponseBody {
    /// A body already held in memory.
    Bytes(Bytes),
    /// A body still arriving from the transport.
    Stream(ByteStream),
}

impl ResponseBody {
    /// Reads the body to completion.
    pub async fn bytes(self) -> Result<Bytes, BoxError> {
        match self {
            ResponseBody::Bytes(bytes) => Ok(bytes),
            ResponseBody::Stream(stream) => stream.collect_bytes().await,
        }
    }

    /// Returns the body as a chunk stream without reading it.
    pub fn into_stream(self) -> ByteStream {
        match self {
            ResponseBody::Bytes(bytes) => ByteStream::from_bytes(bytes),
            ResponseBody::Stream(stream) => stream,
        }
    }
}

impl From<Bytes> for ResponseBody {
    fn from(bytes: Bytes) -> Self {
        ResponseBody::Bytes(bytes)
    }
}

/// Binary content together with its declared media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    /// The raw bytes.
    pub bytes: Bytes,
    /// The response `content-type`, if any.
    pub content_type: Option<String>,
}

/// A materialized response body.
#[derive(Debug)]
pub enum ResponseData {
    /// A decoded JSON document.
    Json(serde_json::Value),
    /// UTF-8 text.
    Text(String),
    /// Raw bytes with their content type.
    Blob(Blob),
    /// Raw bytes.
    ArrayBuffer(Bytes),
    /// The unread body stream.
    Stream(ByteStream),
}

impl ResponseData {
    /// Returns the JSON value if this is JSON data.
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            ResponseData::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the text if this is text data.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseData::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Returns the raw bytes for blob and array-buffer data.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            ResponseData::Blob(blob) => Some(&blob.bytes),
            ResponseData::ArrayBuffer(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Deserializes JSON or text data into `T`.
    ///
    /// Text data is parsed as JSON, so a string body that was not valid JSON
    /// fails here with the serde error.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        match self {
            ResponseData::Json(value) => T::deserialize(value),
            ResponseData::Text(text) => serde_json::from_str(text),
            ResponseData::Blob(Blob { bytes, .. }) | ResponseData::ArrayBuffer(bytes) => {
                serde_json::from_slice(bytes)
            }
            ResponseData::Stream(_) => Err(serde::de::Error::custom(
                "cannot deserialize an unread response stream",
            )),
        }
    }
}

impl From<serde_json::Value> for ResponseData {
    fn from(value: serde_json::Value) -> Self {
        ResponseData::Json(value)
    }
}

impl From<String> for ResponseData {
    fn from(text: String) -> Self {
        ResponseData::Text(text)
    }
}

/// A completed HTTP exchange.
///
/// # Examples
///
/// ```no_run
/// use hookfetch::{Fetch, FetchOptions};
///
/// # async fn example() -> Result<(), hookfetch::FetchError> {
/// let fetch = Fetch::new();
/// let response = fetch.raw("https://api.example.com/users/1", FetchOptions::new()).await?;
///
/// println!("Status: {} {}", response.status.as_u16(), response.status_text);
/// println!("Took {:?} over {} attempt(s)", response.latency, response.attempts);
/// if let Some(user) = response.data.as_ref().and_then(|d| d.as_json()) {
///     println!("User: {}", user["name"]);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FetchResponse {
    /// The HTTP status code.
    pub status: StatusCode,

    /// The status reason phrase.
    pub status_text: String,

    /// The response headers.
    pub headers: HeaderMap,

    /// The final URL of the exchange.
    pub url: Url,

    /// Time from the first attempt until this response was received.
    pub latency: Duration,

    /// Number of attempts made, including this one.
    pub attempts: usize,

    /// The parsed body. `None` for no-content responses or before parsing.
    pub data: Option<ResponseData>,

    body: Option<ResponseBody>,
}

impl FetchResponse {
    /// Creates a response with an unread body.
    pub fn new(
        status: StatusCode,
        headers: HeaderMap,
        url: Url,
        body: Option<ResponseBody>,
    ) -> Self {
        Self {
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            status,
            headers,
            url,
            latency: Duration::ZERO,
            attempts: 1,
            data: None,
            body,
        }
    }

    pub(crate) fn from_raw(raw: RawResponse) -> Self {
        let mut response = Self::new(raw.status, raw.headers, raw.url, Some(raw.body));
        if let Some(status_text) = raw.status_text {
            response.status_text = status_text;
        }
        response
    }

    /// Returns `true` for 2xx statuses.
    pub fn ok(&self) -> bool {
        self.status.is_success()
    }

    /// Returns `true` if the request required retries.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns a header value by name, if it is valid text.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// Returns the `content-type` header.
    pub fn content_type(&self) -> Option<&str> {
        self.header(http::header::CONTENT_TYPE.as_str())
    }

    /// Returns `true` while the body has not been consumed.
    pub fn has_unread_body(&self) -> bool {
        self.body.is_some()
    }

    /// Takes the unread body, leaving nothing behind.
    pub fn take_body(&mut self) -> Option<ResponseBody> {
        self.body.take()
    }

    /// Reads the unread body into memory. An already consumed body reads as empty.
    pub async fn bytes(&mut self) -> Result<Bytes, BoxError> {
        match self.body.take() {
            Some(body) => body.bytes().await,
            None => Ok(Bytes::new()),
        }
    }

    /// Reads the unread body as lossy UTF-8 text.
    pub async fn text(&mut self) -> Result<String, BoxError> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Materializes the body as `response_type`.
    ///
    /// JSON that fails to decode, including an empty body, is kept as text.
    pub async fn read_as(&mut self, response_type: ResponseType) -> Result<ResponseData, BoxError> {
        let data = match response_type {
            ResponseType::Stream => {
                let body = self
                    .body
                    .take()
                    .unwrap_or(ResponseBody::Bytes(Bytes::new()));
                ResponseData::Stream(body.into_stream())
            }
            ResponseType::Json => {
                let bytes = self.bytes().await?;
                match serde_json::from_slice(&bytes) {
                    Ok(value) => ResponseData::Json(value),
                    Err(_) => ResponseData::Text(String::from_utf8_lossy(&bytes).into_owned()),
                }
            }
            ResponseType::Text => ResponseData::Text(self.text().await?),
            ResponseType::Blob => {
                let content_type = self.content_type().map(str::to_string);
                ResponseData::Blob(Blob {
                    bytes: self.bytes().await?,
                    content_type,
                })
            }
            ResponseType::ArrayBuffer => ResponseData::ArrayBuffer(self.bytes().await?),
        };
        Ok(data)
    }
}
