//! Unary handler contract and the retry interceptor.
//!
//! A [`UnaryHandler`] is one link of a client call chain. [`RetryInterceptor::wrap`]
//! turns a handler into another handler with the same request, response and
//! error types that retries transient failures.

use std::error::Error;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use crate::context::CallContext;
use crate::observe::{AttemptObserver, AttemptRecord, CallSummary, TracingObserver};
use crate::retry::{run_with_retry, Interrupted, RetryPolicy};

/// A unary call: one request in, one response or error out.
#[async_trait]
pub trait UnaryHandler: Send + Sync {
    type Request: Send + Sync;
    type Response: Send;
    type Error: Error + Send + Sync + 'static;

    /// Handlers are expected to observe `ctx` cancellation themselves while
    /// the request is in flight.
    async fn call(
        &self,
        ctx: &CallContext,
        req: &Self::Request,
    ) -> Result<Self::Response, Self::Error>;
}

#[async_trait]
impl<H> UnaryHandler for Arc<H>
where
    H: UnaryHandler + ?Sized,
{
    type Request = H::Request;
    type Response = H::Response;
    type Error = H::Error;

    async fn call(
        &self,
        ctx: &CallContext,
        req: &Self::Request,
    ) -> Result<Self::Response, Self::Error> {
        (**self).call(ctx, req).await
    }
}

/// Handler built from an async closure; see [`handler_fn`].
pub struct HandlerFn<F, Req> {
    f: F,
    _req: PhantomData<fn(Req)>,
}

/// Adapt `Fn(CallContext, Req) -> impl Future<Output = Result<Resp, E>>` into
/// a [`UnaryHandler`]. The context and request are cloned for each attempt.
pub fn handler_fn<F, Req>(f: F) -> HandlerFn<F, Req> {
    HandlerFn {
        f,
        _req: PhantomData,
    }
}

#[async_trait]
impl<F, Fut, Req, Resp, E> UnaryHandler for HandlerFn<F, Req>
where
    F: Fn(CallContext, Req) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Resp, E>> + Send + 'static,
    Req: Clone + Send + Sync,
    Resp: Send + 'static,
    E: Error + Send + Sync + 'static,
{
    type Request = Req;
    type Response = Resp;
    type Error = E;

    async fn call(&self, ctx: &CallContext, req: &Req) -> Result<Resp, E> {
        (self.f)(ctx.clone(), req.clone()).await
    }
}

/// Retry middleware for unary calls.
///
/// The policy is shared read-only by every wrapped handler and every call;
/// each call builds its own backoff generator, so concurrent calls never
/// affect each other's timing. Failed calls are logged through `tracing`
/// unless [`RetryInterceptor::without_logging`] is used.
#[derive(Clone)]
pub struct RetryInterceptor {
    policy: Arc<RetryPolicy>,
    observers: Observers,
}

#[derive(Clone)]
struct Observers {
    log: Option<TracingObserver>,
    extra: Vec<Arc<dyn AttemptObserver>>,
}

impl AttemptObserver for Observers {
    fn on_attempt(&self, ctx: &CallContext, record: &AttemptRecord<'_>) {
        if let Some(log) = &self.log {
            log.on_attempt(ctx, record);
        }
        for observer in &self.extra {
            observer.on_attempt(ctx, record);
        }
    }

    fn on_finish(&self, ctx: &CallContext, summary: &CallSummary<'_>) {
        if let Some(log) = &self.log {
            log.on_finish(ctx, summary);
        }
        for observer in &self.extra {
            observer.on_finish(ctx, summary);
        }
    }
}

impl RetryInterceptor {
    pub fn new(policy: impl Into<Arc<RetryPolicy>>) -> Self {
        let policy = policy.into();
        let log = TracingObserver::new(policy.max_attempts());
        Self {
            policy,
            observers: Observers {
                log: Some(log),
                extra: Vec::new(),
            },
        }
    }

    /// Report attempts and call outcomes to `observer` as well.
    pub fn with_observer(mut self, observer: Arc<dyn AttemptObserver>) -> Self {
        self.observers.extra.push(observer);
        self
    }

    /// Drop the built-in `tracing` output.
    pub fn without_logging(mut self) -> Self {
        self.observers.log = None;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Wrap `next` so every call through it is retried under this policy.
    pub fn wrap<H>(&self, next: H) -> Retrying<H>
    where
        H: UnaryHandler,
        H::Error: From<Interrupted>,
    {
        Retrying {
            next,
            interceptor: self.clone(),
        }
    }
}

impl Default for RetryInterceptor {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

/// A handler wrapped by [`RetryInterceptor::wrap`].
pub struct Retrying<H> {
    next: H,
    interceptor: RetryInterceptor,
}

impl<H> Retrying<H> {
    pub fn inner(&self) -> &H {
        &self.next
    }

    pub fn into_inner(self) -> H {
        self.next
    }
}

#[async_trait]
impl<H> UnaryHandler for Retrying<H>
where
    H: UnaryHandler,
    H::Error: From<Interrupted>,
{
    type Request = H::Request;
    type Response = H::Response;
    type Error = H::Error;

    async fn call(
        &self,
        ctx: &CallContext,
        req: &Self::Request,
    ) -> Result<Self::Response, Self::Error> {
        let interceptor = &self.interceptor;
        run_with_retry(&interceptor.policy, ctx, &interceptor.observers, || {
            self.next.call(ctx, req)
        })
        .await
    }
}
