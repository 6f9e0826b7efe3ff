//! Lifecycle hooks composed as middleware chains.
//!
//! Each of the four hook slots holds a [`HookChain`]: an ordered list of hooks
//! where every hook receives the context and a [`Next`] continuation that runs
//! the rest of the chain. When options are merged, call-site hooks are placed
//! in front of the defaults, so a call-site hook decides whether the default
//! hooks run at all.
//!
//! # Examples
//!
//! ```
//! use hookfetch::{FetchContext, FetchOptions, Hook, Next};
//! use std::time::Instant;
//!
//! // Observes every request, then continues with the rest of the chain.
//! let log = hookfetch::hooks::from_fn(|ctx: &mut FetchContext| {
//!     println!("-> {} {}", ctx.method(), ctx.request);
//! });
//!
//! // Wraps the rest of the chain.
//! struct Timed;
//!
//! #[async_trait::async_trait]
//! impl Hook for Timed {
//!     async fn call(&self, ctx: &mut FetchContext, next: Next<'_>) {
//!         let started = Instant::now();
//!         next.run(ctx).await;
//!         println!("response hooks took {:?}", started.elapsed());
//!     }
//! }
//!
//! let options = FetchOptions::new().on_request(log).on_response(Timed);
//! ```

use crate::context::FetchContext;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// A lifecycle hook.
///
/// Call `next.run(ctx).await` to continue with the hooks behind this one;
/// returning without doing so skips them.
#[async_trait]
pub trait Hook: Send + Sync {
    /// Runs the hook.
    async fn call(&self, ctx: &mut FetchContext, next: Next<'_>);
}

/// Continuation that runs the remainder of a hook chain.
pub struct Next<'a> {
    chain: &'a [Arc<dyn Hook>],
    stop_on_error: bool,
}

impl<'a> Next<'a> {
    /// Runs the remaining hooks in order.
    ///
    /// In the request and response slots the chain stops as soon as a hook has
    /// recorded an error on the context.
    pub async fn run(self, ctx: &mut FetchContext) {
        if self.stop_on_error && ctx.error.is_some() {
            return;
        }
        if let Some((hook, rest)) = self.chain.split_first() {
            let next = Next {
                chain: rest,
                stop_on_error: self.stop_on_error,
            };
            hook.call(ctx, next).await;
        }
    }

    /// Returns `true` if no hooks remain.
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }
}

/// An ordered chain of hooks for one slot.
#[derive(Clone, Default)]
pub struct HookChain {
    hooks: Vec<Arc<dyn Hook>>,
}

impl HookChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a hook to the end of the chain.
    pub fn push(&mut self, hook: impl Hook + 'static) {
        self.hooks.push(Arc::new(hook));
    }

    /// Returns the number of hooks in the chain.
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Returns `true` if the chain has no hooks.
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Places the call-site chain in front of the default chain.
    pub fn compose(call: &HookChain, defaults: &HookChain) -> HookChain {
        let hooks = call.hooks.iter().chain(&defaults.hooks).cloned().collect();
        HookChain { hooks }
    }

    async fn run(&self, ctx: &mut FetchContext, stop_on_error: bool) {
        let next = Next {
            chain: &self.hooks,
            stop_on_error,
        };
        next.run(ctx).await;
    }
}

impl fmt::Debug for HookChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HookChain({} hooks)", self.hooks.len())
    }
}

/// The four lifecycle extension points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookSlot {
    /// Before the request is sent.
    Request,
    /// After the transport failed without a response.
    RequestError,
    /// After every response, once its body is parsed.
    Response,
    /// After the response hooks, for error-status responses.
    ResponseError,
}

impl HookSlot {
    fn stops_on_error(self) -> bool {
        matches!(self, HookSlot::Request | HookSlot::Response)
    }
}

/// The hook chains of all four slots.
#[derive(Debug, Clone, Default)]
pub struct Hooks {
    /// Runs before each send.
    pub on_request: HookChain,
    /// Runs when a send fails.
    pub on_request_error: HookChain,
    /// Runs for every response.
    pub on_response: HookChain,
    /// Runs for error-status responses.
    pub on_response_error: HookChain,
}

impl Hooks {
    /// Returns the chain of a slot.
    pub fn slot(&self, slot: HookSlot) -> &HookChain {
        match slot {
            HookSlot::Request => &self.on_request,
            HookSlot::RequestError => &self.on_request_error,
            HookSlot::Response => &self.on_response,
            HookSlot::ResponseError => &self.on_response_error,
        }
    }

    /// Returns the chain of a slot for modification.
    pub fn slot_mut(&mut self, slot: HookSlot) -> &mut HookChain {
        match slot {
            HookSlot::Request => &mut self.on_request,
            HookSlot::RequestError => &mut self.on_request_error,
            HookSlot::Response => &mut self.on_response,
            HookSlot::ResponseError => &mut self.on_response_error,
        }
    }

    /// Composes call-site hooks over default hooks slot by slot.
    pub fn merge(call: &Hooks, defaults: &Hooks) -> Hooks {
        Hooks {
            on_request: HookChain::compose(&call.on_request, &defaults.on_request),
            on_request_error: HookChain::compose(&call.on_request_error, &defaults.on_request_error),
            on_response: HookChain::compose(&call.on_response, &defaults.on_response),
            on_response_error: HookChain::compose(
                &call.on_response_error,
                &defaults.on_response_error,
            ),
        }
    }
}

/// Runs the hooks of `slot` configured on the context's options.
pub async fn run_hooks(slot: HookSlot, ctx: &mut FetchContext) {
    let chain = ctx.options.hooks.slot(slot).clone();
    if chain.is_empty() {
        return;
    }
    chain.run(ctx, slot.stops_on_error()).await;
}

/// A hook built from a synchronous closure. See [`from_fn`].
pub struct FnHook<F> {
    f: F,
}

/// Creates a hook that runs `f` and then continues with the rest of the chain.
pub fn from_fn<F>(f: F) -> FnHook<F>
where
    F: Fn(&mut FetchContext) + Send + Sync + 'static,
{
    FnHook { f }
}

#[async_trait]
impl<F> Hook for FnHook<F>
where
    F: Fn(&mut FetchContext) + Send + Sync + 'static,
{
    async fn call(&self, ctx: &mut FetchContext, next: Next<'_>) {
        (self.f)(ctx);
        next.run(ctx).await;
    }
}
