//! The fetch client and its request pipeline.
//!
//! [`Fetch`] is the main entry point. Each call merges the call-site options
//! over the client's defaults and then runs attempts until one succeeds, a
//! terminal failure occurs, or the retry budget is spent:
//!
//! 1. build the target URL and encode the body,
//! 2. run the request hooks and send through the [`Transport`],
//! 3. classify the outcome, parse the body and run the response hooks,
//! 4. wait and retry, or return.

use crate::{
    context::FetchContext,
    error::{BoxError, FetchError, ParseError, Result, TransportError},
    hooks::{run_hooks, HookSlot},
    options::{Duplex, FetchOptions, RequestBody},
    query::{self, QuerySerializer, UrlQuery},
    response::{FetchResponse, ResponseData},
    response_type::{ResponseType, ResponseTypeDetector},
    retry,
    signal::{AbortReason, AbortSignal},
    transport::{RawRequest, ReqwestTransport, Transport, TransportBody},
};
use http::{header, HeaderValue, Method, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// An HTTP client with mergeable defaults, lifecycle hooks, retries and timeouts.
///
/// The client is cheap to clone and is meant to be reused. Derive clients with
/// more specific defaults through [`Fetch::create`].
///
/// # Examples
///
/// ```no_run
/// use hookfetch::{Fetch, FetchOptions};
/// use serde::Deserialize;
/// use std::time::Duration;
///
/// #[derive(Deserialize)]
/// struct User {
///     id: u64,
///     name: String,
/// }
///
/// # async fn example() -> Result<(), hookfetch::FetchError> {
/// let api = Fetch::new().create(
///     FetchOptions::new()
///         .base_url("https://api.example.com")
///         .header("authorization", "Bearer token")?
///         .timeout(Duration::from_secs(10)),
/// );
///
/// // Parsed data only
/// let user: User = api.json("/users/123", FetchOptions::new()).await?;
/// println!("User {}: {}", user.id, user.name);
///
/// // Full response
/// let response = api.raw("/users/123", FetchOptions::new()).await?;
/// println!("Status {} after {:?}", response.status, response.latency);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Fetch {
    inner: Arc<FetchInner>,
}

struct FetchInner {
    transport: Arc<dyn Transport>,
    defaults: FetchOptions,
}

enum Outcome {
    Success,
    Retry,
    Fail,
}

impl Fetch {
    /// Creates a client that sends through a default `reqwest::Client`.
    pub fn new() -> Self {
        Self::with_transport(ReqwestTransport::new())
    }

    /// Creates a client that sends through `transport`.
    pub fn with_transport(transport: impl Transport + 'static) -> Self {
        Self {
            inner: Arc::new(FetchInner {
                transport: Arc::new(transport),
                defaults: FetchOptions::new(),
            }),
        }
    }

    /// Creates a new `FetchBuilder` for configuring a client.
    pub fn builder() -> FetchBuilder {
        FetchBuilder::new()
    }

    /// Derives a client whose defaults are `defaults` merged over this
    /// client's defaults. The transport is shared.
    pub fn create(&self, defaults: FetchOptions) -> Fetch {
        Fetch {
            inner: Arc::new(FetchInner {
                transport: self.inner.transport.clone(),
                defaults: defaults.merge(&self.inner.defaults),
            }),
        }
    }

    /// Returns this client's default options.
    pub fn defaults(&self) -> &FetchOptions {
        &self.inner.defaults
    }

    /// Returns the underlying transport, for sends without any processing.
    pub fn native(&self) -> Arc<dyn Transport> {
        self.inner.transport.clone()
    }

    /// Fetches `target` and returns the parsed body.
    ///
    /// Returns `Ok(None)` for responses without content (`HEAD`, 101, 204, 205, 304).
    pub async fn fetch(
        &self,
        target: impl AsRef<str>,
        options: FetchOptions,
    ) -> Result<Option<ResponseData>> {
        Ok(self.raw(target, options).await?.data)
    }

    /// Fetches `target` and returns the full response with its parsed body.
    pub async fn raw(&self, target: impl AsRef<str>, options: FetchOptions) -> Result<FetchResponse> {
        let mut ctx = self.execute(target.as_ref(), options).await?;
        match ctx.response.take() {
            Some(response) => Ok(response),
            None => Err(FetchError::from_context(ctx)),
        }
    }

    /// Fetches `target` and deserializes the parsed body into `T`.
    ///
    /// A response without content deserializes from JSON `null`, so use an
    /// `Option` or `()` target type for endpoints that may answer with 204.
    pub async fn json<T: DeserializeOwned>(
        &self,
        target: impl AsRef<str>,
        options: FetchOptions,
    ) -> Result<T> {
        let mut ctx = self.execute(target.as_ref(), options).await?;
        let decoded = match ctx.response.as_ref().and_then(|r| r.data.as_ref()) {
            Some(data) => data.deserialize::<T>(),
            None => T::deserialize(serde_json::Value::Null),
        };

        match decoded {
            Ok(value) => Ok(value),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    url = %ctx.request,
                    "Failed to deserialize response"
                );
                ctx.error = Some(Box::new(ParseError(Box::new(e))));
                Err(FetchError::from_context(ctx))
            }
        }
    }

    /// Runs attempts until success, terminal failure or budget exhaustion.
    async fn execute(&self, target: &str, options: FetchOptions) -> Result<FetchContext> {
        let options = options.merge(&self.inner.defaults);
        let method = options.method_or_default();
        let mut retries_left = options
            .retry
            .unwrap_or_else(|| retry::default_retries(&method));
        let caller_signal = options.signal.clone();
        let start_time = Instant::now();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let mut ctx = FetchContext::new(target, options.clone(), attempt);

            match self.attempt(&mut ctx, start_time).await {
                Outcome::Success => return Ok(ctx),
                Outcome::Fail => return Err(build_error(ctx)),
                Outcome::Retry => {
                    tracing::warn!(
                        error = %ctx.error.as_ref().map(|e| e.to_string()).unwrap_or_default(),
                        status = ?ctx.response.as_ref().map(|r| r.status.as_u16()),
                        attempt = attempt,
                        method = %method,
                        url = %ctx.request,
                        "Request failed"
                    );

                    if retries_left == 0 {
                        return Err(build_error(ctx));
                    }
                    retries_left -= 1;

                    let delay = ctx
                        .options
                        .retry_delay
                        .as_ref()
                        .map(|strategy| strategy.delay_for(&ctx))
                        .unwrap_or(Duration::ZERO);

                    tracing::info!(
                        delay_ms = delay.as_millis(),
                        attempt = attempt,
                        retries_left = retries_left,
                        "Retrying request after delay"
                    );

                    let waited = match &caller_signal {
                        Some(signal) => tokio::select! {
                            _ = signal.aborted() => false,
                            _ = wait(delay) => true,
                        },
                        None => {
                            wait(delay).await;
                            true
                        }
                    };
                    if !waited {
                        ctx.error = Some(Box::new(TransportError::Aborted));
                        return Err(build_error(ctx));
                    }
                }
            }
        }
    }

    /// Runs one attempt, leaving its result on the context.
    async fn attempt(&self, ctx: &mut FetchContext, start_time: Instant) -> Outcome {
        if let Err(e) = prepare_request(ctx) {
            ctx.error = Some(Box::new(e));
            return Outcome::Fail;
        }

        run_hooks(HookSlot::Request, ctx).await;

        let request = match raw_request(ctx) {
            Ok(request) => request,
            Err(e) => {
                ctx.error = Some(Box::new(e));
                run_hooks(HookSlot::RequestError, ctx).await;
                return Outcome::Fail;
            }
        };

        tracing::debug!(
            method = %request.method,
            url = %request.url,
            attempt = ctx.attempt,
            "Executing HTTP request"
        );

        let caller_signal = ctx.options.signal.clone().unwrap_or_default();
        let (signal, timer) = match ctx.options.timeout {
            Some(timeout) => {
                let (timeout_signal, guard) = AbortSignal::timeout(timeout);
                (AbortSignal::any([caller_signal, timeout_signal]), Some(guard))
            }
            None => (caller_signal, None),
        };

        let result = tokio::select! {
            biased;
            reason = signal.aborted() => Err(match reason {
                AbortReason::Caller => TransportError::Aborted,
                AbortReason::Timeout => TransportError::Timeout,
            }),
            result = self.inner.transport.send(request, signal.clone()) => result,
        };
        drop(timer);

        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                let outcome = match e {
                    TransportError::Network(_) | TransportError::Timeout => Outcome::Retry,
                    TransportError::Aborted | TransportError::InvalidRequest(_) => Outcome::Fail,
                };
                ctx.error = Some(Box::new(e));
                run_hooks(HookSlot::RequestError, ctx).await;
                return outcome;
            }
        };

        let mut response = FetchResponse::from_raw(raw);
        response.latency = start_time.elapsed();
        response.attempts = ctx.attempt;
        tracing::info!(
            status = response.status.as_u16(),
            latency_ms = response.latency.as_millis(),
            attempt = ctx.attempt,
            "Received HTTP response"
        );
        ctx.response = Some(response);

        let has_body = match ctx.options.has_body.clone() {
            Some(has_body) => has_body(&*ctx),
            None => default_has_body(ctx),
        };
        if has_body {
            if let Err(e) = parse_body(ctx).await {
                ctx.error = Some(Box::new(ParseError(e)));
                return Outcome::Fail;
            }
        } else if let Some(response) = ctx.response.as_mut() {
            response.take_body();
        }

        run_hooks(HookSlot::Response, ctx).await;

        let status = ctx
            .response
            .as_ref()
            .map_or(StatusCode::OK, |response| response.status);

        if !ctx.options.ignores_response_error()
            && (status.is_client_error() || status.is_server_error())
        {
            if status.is_client_error() {
                tracing::error!(status = status.as_u16(), "Client error (4xx)");
            } else {
                tracing::warn!(status = status.as_u16(), "Server error (5xx)");
            }

            run_hooks(HookSlot::ResponseError, ctx).await;
            return if ctx.options.is_retry_status(status) {
                Outcome::Retry
            } else {
                Outcome::Fail
            };
        }

        if ctx.error.is_some() {
            return Outcome::Fail;
        }
        Outcome::Success
    }
}

impl Default for Fetch {
    fn default() -> Self {
        Self::new()
    }
}

fn build_error(ctx: FetchContext) -> FetchError {
    match ctx.options.create_fetch_error.clone() {
        Some(factory) => factory(ctx),
        None => FetchError::from_context(ctx),
    }
}

/// A zero delay still yields once so other tasks get to run.
async fn wait(delay: Duration) {
    if delay.is_zero() {
        tokio::task::yield_now().await;
    } else {
        tokio::time::sleep(delay).await;
    }
}

fn query_serializer(options: &FetchOptions) -> Arc<dyn QuerySerializer> {
    options
        .query_serializer
        .clone()
        .unwrap_or_else(|| Arc::new(UrlQuery))
}

/// Composes the target URL and encodes the body.
fn prepare_request(ctx: &mut FetchContext) -> std::result::Result<(), TransportError> {
    let serializer = query_serializer(&ctx.options);

    if let Some(base_url) = &ctx.options.base_url {
        ctx.request = query::with_base(&ctx.request, base_url);
    }

    let mut query_map = ctx.options.params.clone().unwrap_or_default();
    if let Some(query) = &ctx.options.query {
        query_map = query::merge_maps(&query_map, query);
    }
    if !query_map.is_empty() {
        ctx.request = query::with_query(&ctx.request, &query_map, serializer.as_ref());
    }

    let Some(body) = ctx.options.body.take() else {
        return Ok(());
    };
    let headers = &mut ctx.options.headers;
    let body = match body {
        RequestBody::Json(value) => {
            let encoded = serde_json::to_vec(&value).map_err(|e| {
                TransportError::InvalidRequest(format!("Failed to serialize request: {}", e))
            })?;
            if !headers.contains_key(header::CONTENT_TYPE) {
                headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
            }
            if !headers.contains_key(header::ACCEPT) {
                headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
            }
            RequestBody::Bytes(encoded.into())
        }
        RequestBody::Form(fields) => {
            if !headers.contains_key(header::CONTENT_TYPE) {
                headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/x-www-form-urlencoded"),
                );
            }
            RequestBody::Text(serializer.stringify(&fields))
        }
        RequestBody::Stream(stream) => {
            ctx.options.duplex.get_or_insert(Duplex::Half);
            RequestBody::Stream(stream)
        }
        other => other,
    };
    ctx.options.body = Some(body);
    Ok(())
}

/// Turns the context into the request handed to the transport.
fn raw_request(ctx: &FetchContext) -> std::result::Result<RawRequest, TransportError> {
    let url = Url::parse(&ctx.request).map_err(|e| {
        TransportError::InvalidRequest(format!("Invalid URL {:?}: {}", ctx.request, e))
    })?;

    let body = match &ctx.options.body {
        None => None,
        Some(RequestBody::Bytes(bytes)) => Some(TransportBody::Bytes(bytes.clone())),
        Some(RequestBody::Text(text)) => Some(TransportBody::Bytes(text.clone().into())),
        Some(RequestBody::Json(value)) => Some(TransportBody::Bytes(value.to_string().into())),
        Some(RequestBody::Form(fields)) => Some(TransportBody::Bytes(
            query_serializer(&ctx.options).stringify(fields).into(),
        )),
        Some(RequestBody::Stream(stream)) => match stream.take() {
            Some(stream) => Some(TransportBody::Stream(stream)),
            None => {
                return Err(TransportError::InvalidRequest(
                    "request body stream was already consumed by a previous attempt".to_string(),
                ))
            }
        },
    };

    Ok(RawRequest {
        method: ctx.method(),
        url,
        headers: ctx.options.headers.clone(),
        body,
        duplex: ctx.options.duplex,
    })
}

/// `HEAD` requests and 101/204/205/304 responses carry nothing to parse.
fn default_has_body(ctx: &FetchContext) -> bool {
    let no_content = ctx.response.as_ref().is_some_and(|response| {
        matches!(
            response.status,
            StatusCode::SWITCHING_PROTOCOLS
                | StatusCode::NO_CONTENT
                | StatusCode::RESET_CONTENT
                | StatusCode::NOT_MODIFIED
        )
    });
    ctx.method() != Method::HEAD && !no_content
}

/// Resolves the response type and stores the parsed body on the response.
async fn parse_body(ctx: &mut FetchContext) -> std::result::Result<(), BoxError> {
    let detector = ctx
        .options
        .response_type_detector
        .clone()
        .unwrap_or_default();
    let parser = ctx.options.parse_response.clone();
    let hint = ctx.options.response_type;

    let Some(response) = ctx.response.as_mut() else {
        return Ok(());
    };
    let response_type = resolve_type(&detector, hint, response);

    let data = match (response_type, parser) {
        (ResponseType::Json, Some(parser)) => {
            let text = response.text().await?;
            parser(&text)?
        }
        (response_type, _) => response.read_as(response_type).await?,
    };
    response.data = Some(data);
    Ok(())
}

fn resolve_type(
    detector: &ResponseTypeDetector,
    hint: Option<ResponseType>,
    response: &FetchResponse,
) -> ResponseType {
    detector.resolve(hint, response.content_type())
}

/// Builder for configuring and creating a [`Fetch`] client.
///
/// # Examples
///
/// ```no_run
/// use hookfetch::{Fetch, FetchOptions};
/// use std::time::Duration;
///
/// # fn example() -> Result<(), hookfetch::FetchError> {
/// let fetch = Fetch::builder()
///     .defaults(
///         FetchOptions::new()
///             .base_url("https://api.example.com")
///             .header("user-agent", "my-app/1.0")?
///             .retry(3)
///             .retry_delay(Duration::from_millis(200)),
///     )
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct FetchBuilder {
    transport: Option<Arc<dyn Transport>>,
    reqwest_client: Option<reqwest::Client>,
    defaults: FetchOptions,
}

impl FetchBuilder {
    /// Creates a new `FetchBuilder` with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends through a custom transport.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Sends through a preconfigured `reqwest::Client`.
    pub fn reqwest_client(mut self, client: reqwest::Client) -> Self {
        self.reqwest_client = Some(client);
        self
    }

    /// Sets the client's default options.
    pub fn defaults(mut self, defaults: FetchOptions) -> Self {
        self.defaults = defaults;
        self
    }

    /// Builds the configured `Fetch`.
    ///
    /// # Errors
    ///
    /// Returns an error if the default HTTP client cannot be constructed.
    pub fn build(self) -> Result<Fetch> {
        let transport: Arc<dyn Transport> = match (self.transport, self.reqwest_client) {
            (Some(transport), _) => transport,
            (None, Some(client)) => Arc::new(ReqwestTransport::from_client(client)),
            (None, None) => {
                let client = reqwest::Client::builder().build().map_err(|e| {
                    FetchError::invalid_options(format!("Failed to build HTTP client: {}", e))
                })?;
                Arc::new(ReqwestTransport::from_client(client))
            }
        };

        Ok(Fetch {
            inner: Arc::new(FetchInner {
                transport,
                defaults: self.defaults,
            }),
        })
    }
}
