//! Cancellation signals for in-flight sends.
//!
//! An [`AbortSignal`] aggregates any number of upstream cancellation tokens and
//! reports aborted as soon as one of them fires. The pipeline links the
//! caller's signal with a per-attempt timeout signal this way, so the transport
//! only ever sees one signal.

use futures::future::select_all;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Why a signal fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// The caller aborted through an [`AbortController`].
    Caller,
    /// The per-attempt timeout elapsed.
    Timeout,
}

/// Caller-side handle used to cancel a request.
///
/// # Examples
///
/// ```
/// use hookfetch::{AbortController, AbortReason};
///
/// let controller = AbortController::new();
/// let signal = controller.signal();
/// assert!(!signal.is_aborted());
///
/// controller.abort();
/// assert_eq!(signal.reason(), Some(AbortReason::Caller));
/// ```
#[derive(Debug, Clone, Default)]
pub struct AbortController {
    token: CancellationToken,
}

impl AbortController {
    /// Creates a controller that has not been aborted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a signal that fires when [`abort`](Self::abort) is called.
    pub fn signal(&self) -> AbortSignal {
        AbortSignal::from_token(self.token.clone(), AbortReason::Caller)
    }

    /// Aborts every request holding this controller's signal.
    pub fn abort(&self) {
        self.token.cancel();
    }

    /// Returns `true` once [`abort`](Self::abort) has been called.
    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// A cancellation signal derived from one or more upstream tokens.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    sources: Vec<(CancellationToken, AbortReason)>,
}

impl AbortSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        Self::default()
    }

    fn from_token(token: CancellationToken, reason: AbortReason) -> Self {
        Self {
            sources: vec![(token, reason)],
        }
    }

    /// Creates a signal that fires after `duration`.
    ///
    /// The timer runs until it fires or the returned guard is dropped.
    pub fn timeout(duration: Duration) -> (Self, TimeoutGuard) {
        let token = CancellationToken::new();
        let trigger = token.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            trigger.cancel();
        });

        (
            Self::from_token(token, AbortReason::Timeout),
            TimeoutGuard {
                handle: Some(handle),
            },
        )
    }

    /// Links several signals into one that fires when any of them fires.
    pub fn any(signals: impl IntoIterator<Item = AbortSignal>) -> Self {
        Self {
            sources: signals.into_iter().flat_map(|s| s.sources).collect(),
        }
    }

    /// Returns `true` if any upstream token has fired.
    pub fn is_aborted(&self) -> bool {
        self.sources.iter().any(|(token, _)| token.is_cancelled())
    }

    /// Returns why the signal fired, or `None` if it has not.
    ///
    /// A caller abort is reported over a timeout when both have fired.
    pub fn reason(&self) -> Option<AbortReason> {
        let fired = |reason| {
            self.sources
                .iter()
                .any(|(token, r)| *r == reason && token.is_cancelled())
        };

        if fired(AbortReason::Caller) {
            Some(AbortReason::Caller)
        } else if fired(AbortReason::Timeout) {
            Some(AbortReason::Timeout)
        } else {
            None
        }
    }

    /// Waits until the signal fires. Never resolves for [`AbortSignal::never`].
    pub async fn aborted(&self) -> AbortReason {
        if self.sources.is_empty() {
            return futures::future::pending().await;
        }

        let waits = self
            .sources
            .iter()
            .map(|(token, _)| Box::pin(token.cancelled()));
        let (_, index, _) = select_all(waits).await;

        self.reason().unwrap_or(self.sources[index].1)
    }
}

/// Keeps a timeout timer alive. Dropping the guard cancels the timer.
#[derive(Debug)]
pub struct TimeoutGuard {
    handle: Option<JoinHandle<()>>,
}

impl TimeoutGuard {
    /// Stops the timer without waiting for it.
    pub fn clear(mut self) {
        self.abort_timer();
    }

    fn abort_timer(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for TimeoutGuard {
    fn drop(&mut self) {
        self.abort_timer();
    }
}
