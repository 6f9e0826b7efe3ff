//! Request options and their merge rules.
//!
//! A [`FetchOptions`] value is a set of optional settings. Unset settings
//! inherit from the client's defaults when the two are merged with
//! [`FetchOptions::merge`].

use crate::context::FetchContext;
use crate::error::{BoxError, FetchError, Result};
use crate::hooks::{Hook, HookSlot, Hooks};
use crate::query::{self, QueryMap, QuerySerializer};
use crate::response::{ByteStream, ResponseData};
use crate::response_type::{ResponseType, ResponseTypeDetector};
use crate::retry::RetryDelay;
use crate::signal::AbortSignal;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Custom body parser for JSON-typed responses; receives the body text.
pub type ParseResponse = Arc<dyn Fn(&str) -> std::result::Result<ResponseData, BoxError> + Send + Sync>;

/// Decides whether a response carries a body worth parsing.
pub type HasBody = Arc<dyn Fn(&FetchContext) -> bool + Send + Sync>;

/// Replaces the default error factory.
pub type CreateFetchError = Arc<dyn Fn(FetchContext) -> FetchError + Send + Sync>;

/// Request duplex mode for streaming bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Duplex {
    /// The request body is streamed before the response is read.
    Half,
}

/// A streaming request body. It can be sent only once.
#[derive(Clone)]
pub struct StreamBody {
    stream: Arc<Mutex<Option<ByteStream>>>,
}

impl StreamBody {
    /// Takes the stream, leaving the body consumed.
    pub fn take(&self) -> Option<ByteStream> {
        self.stream
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl fmt::Debug for StreamBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StreamBody")
    }
}

/// A request body.
#[derive(Debug, Clone)]
pub enum RequestBody {
    /// Raw bytes, sent unchanged.
    Bytes(Bytes),
    /// Text, sent unchanged.
    Text(String),
    /// A JSON document, serialized before sending.
    Json(serde_json::Value),
    /// Form fields, encoded with the query serializer.
    Form(QueryMap),
    /// A chunk stream, sent unchanged.
    Stream(StreamBody),
}

impl RequestBody {
    /// Serializes `value` into a JSON body.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> std::result::Result<Self, serde_json::Error> {
        serde_json::to_value(value).map(RequestBody::Json)
    }

    /// Builds a form body from key/value pairs.
    pub fn form<K, V>(fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<serde_json::Value>,
    {
        RequestBody::Form(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Wraps a chunk stream.
    pub fn stream(stream: ByteStream) -> Self {
        RequestBody::Stream(StreamBody {
            stream: Arc::new(Mutex::new(Some(stream))),
        })
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        RequestBody::Bytes(bytes)
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(bytes: Vec<u8>) -> Self {
        RequestBody::Bytes(bytes.into())
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        RequestBody::Text(text)
    }
}

impl From<&str> for RequestBody {
    fn from(text: &str) -> Self {
        RequestBody::Text(text.to_string())
    }
}

impl From<serde_json::Value> for RequestBody {
    fn from(value: serde_json::Value) -> Self {
        RequestBody::Json(value)
    }
}

impl From<ByteStream> for RequestBody {
    fn from(stream: ByteStream) -> Self {
        RequestBody::stream(stream)
    }
}

/// Options for a fetch call or the defaults of a client.
///
/// # Examples
///
/// ```
/// use hookfetch::{FetchOptions, RetryDelay};
/// use http::Method;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), hookfetch::FetchError> {
/// let options = FetchOptions::new()
///     .method(Method::POST)
///     .base_url("https://api.example.com")
///     .header("x-api-key", "secret")?
///     .json(&serde_json::json!({ "name": "Alice" }))?
///     .query("verbose", true)
///     .timeout(Duration::from_secs(5))
///     .retry(2)
///     .retry_delay(Duration::from_millis(250));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct FetchOptions {
    pub(crate) method: Option<Method>,
    pub(crate) base_url: Option<String>,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Option<RequestBody>,
    pub(crate) query: Option<QueryMap>,
    pub(crate) params: Option<QueryMap>,
    pub(crate) response_type: Option<ResponseType>,
    pub(crate) response_type_detector: Option<ResponseTypeDetector>,
    pub(crate) parse_response: Option<ParseResponse>,
    pub(crate) ignore_response_error: Option<bool>,
    pub(crate) duplex: Option<Duplex>,
    pub(crate) timeout: Option<Duration>,
    pub(crate) retry: Option<usize>,
    pub(crate) retry_delay: Option<RetryDelay>,
    pub(crate) retry_status_codes: Option<Vec<StatusCode>>,
    pub(crate) signal: Option<AbortSignal>,
    pub(crate) query_serializer: Option<Arc<dyn QuerySerializer>>,
    pub(crate) has_body: Option<HasBody>,
    pub(crate) create_fetch_error: Option<CreateFetchError>,
    pub(crate) hooks: Hooks,
}

impl FetchOptions {
    /// Creates an empty option set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges these call-site options over `defaults`.
    ///
    /// Call-site values win per setting. `query` and `params` are merged key
    /// by key and headers name by name (case-insensitively), keeping entries
    /// from both sides. Hook chains are composed so call-site hooks run first
    /// and continue into the default hooks through `next`. Neither input is
    /// modified.
    pub fn merge(&self, defaults: &FetchOptions) -> FetchOptions {
        FetchOptions {
            method: self.method.clone().or_else(|| defaults.method.clone()),
            base_url: self.base_url.clone().or_else(|| defaults.base_url.clone()),
            headers: merge_headers(&self.headers, &defaults.headers),
            body: self.body.clone().or_else(|| defaults.body.clone()),
            query: merge_query(&self.query, &defaults.query),
            params: merge_query(&self.params, &defaults.params),
            response_type: self.response_type.or(defaults.response_type),
            response_type_detector: self
                .response_type_detector
                .clone()
                .or_else(|| defaults.response_type_detector.clone()),
            parse_response: self
                .parse_response
                .clone()
                .or_else(|| defaults.parse_response.clone()),
            ignore_response_error: self.ignore_response_error.or(defaults.ignore_response_error),
            duplex: self.duplex.or(defaults.duplex),
            timeout: self.timeout.or(defaults.timeout),
            retry: self.retry.or(defaults.retry),
            retry_delay: self.retry_delay.clone().or_else(|| defaults.retry_delay.clone()),
            retry_status_codes: self
                .retry_status_codes
                .clone()
                .or_else(|| defaults.retry_status_codes.clone()),
            signal: self.signal.clone().or_else(|| defaults.signal.clone()),
            query_serializer: self
                .query_serializer
                .clone()
                .or_else(|| defaults.query_serializer.clone()),
            has_body: self.has_body.clone().or_else(|| defaults.has_body.clone()),
            create_fetch_error: self
                .create_fetch_error
                .clone()
                .or_else(|| defaults.create_fetch_error.clone()),
            hooks: Hooks::merge(&self.hooks, &defaults.hooks),
        }
    }

    /// Sets the request method.
    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Sets the base URL that relative targets are joined onto.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets a header, replacing earlier values of the same name.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| FetchError::invalid_options(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| FetchError::invalid_options(format!("Invalid header value: {}", e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Adds all headers of `headers`, replacing earlier values of the same names.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = merge_headers(&headers, &self.headers);
        self
    }

    /// Sets the request body.
    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serializes `value` as the JSON request body.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` cannot be represented as JSON.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self> {
        let body = RequestBody::json(value).map_err(|e| {
            FetchError::invalid_options(format!("Failed to serialize request: {}", e))
        })?;
        self.body = Some(body);
        Ok(self)
    }

    /// Sets one query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.query
            .get_or_insert_with(QueryMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Sets several query parameters at once.
    pub fn query_map(mut self, query: QueryMap) -> Self {
        let merged = query::merge_maps(&self.query.take().unwrap_or_default(), &query);
        self.query = Some(merged);
        self
    }

    /// Sets one parameter. Parameters are appended to the URL like the query,
    /// with `query` taking precedence for shared keys.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.params
            .get_or_insert_with(QueryMap::new)
            .insert(key.into(), value.into());
        self
    }

    /// Sets several parameters at once.
    pub fn params(mut self, params: QueryMap) -> Self {
        let merged = query::merge_maps(&self.params.take().unwrap_or_default(), &params);
        self.params = Some(merged);
        self
    }

    /// Forces the response type instead of detecting it.
    pub fn response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = Some(response_type);
        self
    }

    /// Replaces the content-type detection rules.
    pub fn response_type_detector(mut self, detector: ResponseTypeDetector) -> Self {
        self.response_type_detector = Some(detector);
        self
    }

    /// Parses JSON-typed bodies with `parser` instead of the JSON decoder.
    pub fn parse_response<F>(mut self, parser: F) -> Self
    where
        F: Fn(&str) -> std::result::Result<ResponseData, BoxError> + Send + Sync + 'static,
    {
        self.parse_response = Some(Arc::new(parser));
        self
    }

    /// Returns error-status responses as successes instead of errors.
    pub fn ignore_response_error(mut self, ignore: bool) -> Self {
        self.ignore_response_error = Some(ignore);
        self
    }

    /// Sets the duplex mode. Stream bodies default to [`Duplex::Half`].
    pub fn duplex(mut self, duplex: Duplex) -> Self {
        self.duplex = Some(duplex);
        self
    }

    /// Aborts each attempt that takes longer than `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the number of retries after the first attempt.
    pub fn retry(mut self, retries: usize) -> Self {
        self.retry = Some(retries);
        self
    }

    /// Disables retries.
    pub fn no_retry(self) -> Self {
        self.retry(0)
    }

    /// Sets the delay between attempts.
    pub fn retry_delay(mut self, delay: impl Into<RetryDelay>) -> Self {
        self.retry_delay = Some(delay.into());
        self
    }

    /// Sets which response statuses are retried.
    ///
    /// # Errors
    ///
    /// Returns an error if a code is not a valid HTTP status.
    pub fn retry_status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Result<Self> {
        let codes = codes
            .into_iter()
            .map(|code| {
                StatusCode::from_u16(code).map_err(|e| {
                    FetchError::invalid_options(format!("Invalid status code {}: {}", code, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        self.retry_status_codes = Some(codes);
        Ok(self)
    }

    /// Attaches a caller cancellation signal.
    pub fn signal(mut self, signal: AbortSignal) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Replaces the query-string codec.
    pub fn query_serializer(mut self, serializer: impl QuerySerializer + 'static) -> Self {
        self.query_serializer = Some(Arc::new(serializer));
        self
    }

    /// Replaces the rule deciding whether a response has a body to parse.
    pub fn has_body<F>(mut self, has_body: F) -> Self
    where
        F: Fn(&FetchContext) -> bool + Send + Sync + 'static,
    {
        self.has_body = Some(Arc::new(has_body));
        self
    }

    /// Replaces the error factory.
    pub fn create_fetch_error<F>(mut self, factory: F) -> Self
    where
        F: Fn(FetchContext) -> FetchError + Send + Sync + 'static,
    {
        self.create_fetch_error = Some(Arc::new(factory));
        self
    }

    /// Appends a hook to the request slot.
    pub fn on_request(self, hook: impl Hook + 'static) -> Self {
        self.hook(HookSlot::Request, hook)
    }

    /// Appends a hook to the request-error slot.
    pub fn on_request_error(self, hook: impl Hook + 'static) -> Self {
        self.hook(HookSlot::RequestError, hook)
    }

    /// Appends a hook to the response slot.
    pub fn on_response(self, hook: impl Hook + 'static) -> Self {
        self.hook(HookSlot::Response, hook)
    }

    /// Appends a hook to the response-error slot.
    pub fn on_response_error(self, hook: impl Hook + 'static) -> Self {
        self.hook(HookSlot::ResponseError, hook)
    }

    /// Appends a hook to `slot`.
    pub fn hook(mut self, slot: HookSlot, hook: impl Hook + 'static) -> Self {
        self.hooks.slot_mut(slot).push(hook);
        self
    }

    /// The configured method, `GET` when unset.
    pub fn method_or_default(&self) -> Method {
        self.method.clone().unwrap_or(Method::GET)
    }

    /// The configured base URL.
    pub fn get_base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// The configured headers.
    pub fn get_headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The configured headers, for modification from hooks.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// The request body.
    pub fn get_body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    /// Replaces the request body from a hook.
    pub fn set_body(&mut self, body: Option<RequestBody>) {
        self.body = body;
    }

    /// The query parameters.
    pub fn get_query(&self) -> Option<&QueryMap> {
        self.query.as_ref()
    }

    /// The parameters.
    pub fn get_params(&self) -> Option<&QueryMap> {
        self.params.as_ref()
    }

    /// The forced response type.
    pub fn get_response_type(&self) -> Option<ResponseType> {
        self.response_type
    }

    /// The configured timeout.
    pub fn get_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// The configured retry count.
    pub fn get_retry(&self) -> Option<usize> {
        self.retry
    }

    /// The configured duplex mode.
    pub fn get_duplex(&self) -> Option<Duplex> {
        self.duplex
    }

    /// The configured hooks.
    pub fn get_hooks(&self) -> &Hooks {
        &self.hooks
    }

    /// The configured hooks, for modification.
    pub fn hooks_mut(&mut self) -> &mut Hooks {
        &mut self.hooks
    }

    /// Whether error-status responses are returned as successes.
    pub fn ignores_response_error(&self) -> bool {
        self.ignore_response_error.unwrap_or(false)
    }

    /// Returns `true` if `status` is in the retryable set.
    pub fn is_retry_status(&self, status: StatusCode) -> bool {
        match &self.retry_status_codes {
            Some(codes) => codes.contains(&status),
            None => crate::retry::DEFAULT_RETRY_STATUS_CODES.contains(&status.as_u16()),
        }
    }
}

fn merge_query(call: &Option<QueryMap>, defaults: &Option<QueryMap>) -> Option<QueryMap> {
    match (call, defaults) {
        (Some(call), Some(defaults)) => Some(query::merge_maps(defaults, call)),
        (Some(only), None) | (None, Some(only)) => Some(only.clone()),
        (None, None) => None,
    }
}

/// Keeps every header of `defaults` whose name `call` does not set, plus all
/// of `call`'s values.
fn merge_headers(call: &HeaderMap, defaults: &HeaderMap) -> HeaderMap {
    let mut merged = defaults.clone();
    for name in call.keys() {
        merged.remove(name);
        for value in call.get_all(name) {
            merged.append(name.clone(), value.clone());
        }
    }
    merged
}

impl fmt::Debug for FetchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchOptions")
            .field("method", &self.method)
            .field("base_url", &self.base_url)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .field("query", &self.query)
            .field("params", &self.params)
            .field("response_type", &self.response_type)
            .field("ignore_response_error", &self.ignore_response_error)
            .field("duplex", &self.duplex)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("retry_delay", &self.retry_delay)
            .field("retry_status_codes", &self.retry_status_codes)
            .field("signal", &self.signal)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}
