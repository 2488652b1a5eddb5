//! Retry and backoff policy.
//!
//! This module holds the retry decision state machine shared by every call
//! through a [`crate::interceptor::RetryInterceptor`]: error classification,
//! backoff sequences, the attempt bound and the interruptible retry loop.

mod backoff;
mod classify;
mod error;
mod policy;
mod run;

pub use backoff::{
    Backoff, BackoffConfigError, BackoffFactory, ExponentialBackoff, ExponentialSequence,
    FixedBackoff,
};
pub use classify::{is_retryable_code, is_transient_io, Classifier, DefaultClassifier};
pub use error::Interrupted;
pub use policy::{RetryDecision, RetryPolicy, RetryPolicyBuilder, Terminal};
pub use run::run_with_retry;
