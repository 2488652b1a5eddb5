//! Retry middleware for unary RPC calls.
//!
//! [`RetryInterceptor`] wraps a [`UnaryHandler`] so transient failures
//! (`Unavailable`, refused/reset/aborted connections) are retried under a
//! backoff policy, while every other error, and the last error once retries
//! are exhausted, goes back to the caller unchanged.

pub mod config;
pub mod context;
pub mod interceptor;
pub mod logging;
pub mod observe;
pub mod retry;

pub use context::CallContext;
pub use interceptor::{handler_fn, HandlerFn, RetryInterceptor, Retrying, UnaryHandler};
pub use retry::{Interrupted, RetryPolicy};
