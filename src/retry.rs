//! Retry budget defaults and delay strategies.
//!
//! Whether an attempt is retried is decided by the pipeline: network failures
//! and timeouts always qualify, responses qualify when their status is in the
//! retryable set. This module decides how many retries a call gets by default
//! and how long to wait before each one.

use crate::context::FetchContext;
use http::Method;
use rand::Rng;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Statuses retried when no explicit set is configured.
pub const DEFAULT_RETRY_STATUS_CODES: [u16; 8] = [408, 409, 425, 429, 500, 502, 503, 504];

/// Returns `true` for methods whose requests carry a payload.
pub fn is_payload_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::PATCH | Method::POST | Method::PUT | Method::DELETE
    )
}

/// The retry budget used when none is configured: one retry for methods
/// without a payload, none for payload methods.
pub fn default_retries(method: &Method) -> usize {
    if is_payload_method(method) {
        0
    } else {
        1
    }
}

/// Computes the wait before a retry from the context of the failed attempt.
///
/// Any `Fn(&FetchContext) -> Duration` closure implements this trait.
pub trait DelayStrategy: Send + Sync {
    /// Returns how long to wait before retrying.
    fn compute_delay(&self, ctx: &FetchContext) -> Duration;
}

impl<F> DelayStrategy for F
where
    F: Fn(&FetchContext) -> Duration + Send + Sync,
{
    fn compute_delay(&self, ctx: &FetchContext) -> Duration {
        self(ctx)
    }
}

/// How long to wait between attempts.
///
/// # Examples
///
/// ```
/// use hookfetch::RetryDelay;
/// use std::time::Duration;
///
/// // Retry immediately
/// let immediate = RetryDelay::None;
///
/// // 500ms between attempts
/// let fixed = RetryDelay::Fixed(Duration::from_millis(500));
///
/// // 100ms, 200ms, 400ms... capped at 10s
/// let exponential = RetryDelay::ExponentialBackoff {
///     initial_delay: Duration::from_millis(100),
///     max_delay: Duration::from_secs(10),
///     jitter: true,
/// };
///
/// // Adaptive: derive the delay from the failed attempt
/// let adaptive = RetryDelay::custom(|ctx: &hookfetch::FetchContext| {
///     Duration::from_millis(50 * ctx.attempt as u64)
/// });
/// ```
#[derive(Clone, Default)]
pub enum RetryDelay {
    /// Retry on the next scheduler tick.
    #[default]
    None,

    /// Wait the same duration before every retry.
    Fixed(Duration),

    /// Wait `initial_delay * 2^(attempt - 1)`, capped at `max_delay`.
    ///
    /// Optional jitter scales each delay by a random factor in `[0.5, 1.0]`.
    ExponentialBackoff {
        /// The delay before the first retry.
        initial_delay: Duration,
        /// The maximum delay between retries.
        max_delay: Duration,
        /// Whether to add random jitter to delays.
        jitter: bool,
    },

    /// Honour the `Retry-After` header of the failed response.
    ///
    /// Both delay-seconds and HTTP-date forms are understood. Without a usable
    /// header, `fallback` is used.
    RetryAfter {
        /// Delay used when the header is missing or unparseable.
        fallback: Duration,
        /// Upper bound on the honoured delay.
        max_wait: Duration,
    },

    /// A caller-provided strategy.
    Custom(Arc<dyn DelayStrategy>),
}

impl RetryDelay {
    /// Wraps a strategy, typically a closure over the failed attempt's context.
    pub fn custom(strategy: impl DelayStrategy + 'static) -> Self {
        RetryDelay::Custom(Arc::new(strategy))
    }

    /// Returns the delay before retrying the attempt described by `ctx`.
    pub fn delay_for(&self, ctx: &FetchContext) -> Duration {
        match self {
            RetryDelay::None => Duration::ZERO,
            RetryDelay::Fixed(delay) => *delay,
            RetryDelay::ExponentialBackoff {
                initial_delay,
                max_delay,
                jitter,
            } => {
                let multiplier = 2u32.saturating_pow(ctx.attempt.saturating_sub(1) as u32);
                let delay = initial_delay.saturating_mul(multiplier).min(*max_delay);

                if *jitter {
                    let jitter_factor = rand::thread_rng().gen_range(0.5..=1.0);
                    delay.mul_f64(jitter_factor)
                } else {
                    delay
                }
            }
            RetryDelay::RetryAfter { fallback, max_wait } => ctx
                .response
                .as_ref()
                .and_then(|response| response.header("retry-after"))
                .and_then(parse_retry_after)
                .map_or(*fallback, |delay| delay.min(*max_wait)),
            RetryDelay::Custom(strategy) => strategy.compute_delay(ctx),
        }
    }
}

impl From<Duration> for RetryDelay {
    fn from(delay: Duration) -> Self {
        RetryDelay::Fixed(delay)
    }
}

impl fmt::Debug for RetryDelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryDelay::None => f.write_str("None"),
            RetryDelay::Fixed(delay) => f.debug_tuple("Fixed").field(delay).finish(),
            RetryDelay::ExponentialBackoff {
                initial_delay,
                max_delay,
                jitter,
            } => f
                .debug_struct("ExponentialBackoff")
                .field("initial_delay", initial_delay)
                .field("max_delay", max_delay)
                .field("jitter", jitter)
                .finish(),
            RetryDelay::RetryAfter { fallback, max_wait } => f
                .debug_struct("RetryAfter")
                .field("fallback", fallback)
                .field("max_wait", max_wait)
                .finish(),
            RetryDelay::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Parses a `Retry-After` value given as seconds or as an HTTP date.
fn parse_retry_after(value: &str) -> Option<Duration> {
    if let Ok(seconds) = value.trim().parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    let date = httpdate::parse_http_date(value).ok()?;
    Some(date.duration_since(SystemTime::now()).unwrap_or(Duration::ZERO))
}
