use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::backoff::{Backoff, BackoffFactory, FixedBackoff};
use super::classify::{Classifier, DefaultClassifier};

/// How a logical call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    /// The downstream handler returned a response.
    Success,
    /// The classifier rejected the error; it went straight back to the caller.
    NonRetryable,
    /// The error was retryable but the attempt bound was reached.
    AttemptsExhausted,
    /// The error was retryable but the backoff sequence signalled stop.
    BackoffExhausted,
    /// The cancellation token fired while waiting to retry.
    Cancelled,
    /// The deadline passed while waiting to retry.
    DeadlineExceeded,
}

impl Terminal {
    pub fn as_str(self) -> &'static str {
        match self {
            Terminal::Success => "success",
            Terminal::NonRetryable => "non_retryable",
            Terminal::AttemptsExhausted => "attempts_exhausted",
            Terminal::BackoffExhausted => "backoff_exhausted",
            Terminal::Cancelled => "cancelled",
            Terminal::DeadlineExceeded => "deadline_exceeded",
        }
    }
}

impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decision taken after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Give up and return the attempt's error.
    Stop(Terminal),
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Immutable retry configuration shared by every call through an interceptor.
///
/// Holds the backoff factory (asked for a new generator at the start of each
/// call), the classifier and the attempt bound.
#[derive(Clone)]
pub struct RetryPolicy {
    backoff: Arc<dyn BackoffFactory>,
    classifier: Arc<dyn Classifier>,
    max_attempts: Option<u32>,
}

impl RetryPolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::default()
    }

    /// Maximum number of attempts including the first; `None` is unbounded.
    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    /// Fresh backoff generator for one logical call.
    pub fn new_backoff(&self) -> Box<dyn Backoff> {
        self.backoff.make()
    }

    pub fn is_retryable(&self, err: &(dyn Error + 'static)) -> bool {
        self.classifier.is_retryable(err)
    }

    /// Decide what to do after failed attempt number `attempt` (1-based).
    ///
    /// The classifier is consulted first, then the attempt bound, then the
    /// backoff generator; a non-retryable error never advances the backoff.
    pub fn decide(
        &self,
        attempt: u32,
        err: &(dyn Error + 'static),
        backoff: &mut dyn Backoff,
    ) -> RetryDecision {
        if !self.is_retryable(err) {
            return RetryDecision::Stop(Terminal::NonRetryable);
        }
        if let Some(max) = self.max_attempts {
            if attempt >= max {
                return RetryDecision::Stop(Terminal::AttemptsExhausted);
            }
        }
        match backoff.next_backoff() {
            Some(delay) => RetryDecision::RetryAfter(delay),
            None => RetryDecision::Stop(Terminal::BackoffExhausted),
        }
    }
}

impl Default for RetryPolicy {
    /// Fixed 1s backoff, default classifier, 10 attempts.
    fn default() -> Self {
        RetryPolicyBuilder::default().build()
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

/// Builder for [`RetryPolicy`]; unset fields take the defaults.
pub struct RetryPolicyBuilder {
    backoff: Arc<dyn BackoffFactory>,
    classifier: Arc<dyn Classifier>,
    max_attempts: Option<u32>,
}

impl Default for RetryPolicyBuilder {
    fn default() -> Self {
        Self {
            backoff: Arc::new(FixedBackoff::default()),
            classifier: Arc::new(DefaultClassifier),
            max_attempts: Some(RetryPolicy::DEFAULT_MAX_ATTEMPTS),
        }
    }
}

impl RetryPolicyBuilder {
    pub fn backoff(mut self, factory: impl BackoffFactory + 'static) -> Self {
        self.backoff = Arc::new(factory);
        self
    }

    pub fn classifier(mut self, classifier: impl Classifier + 'static) -> Self {
        self.classifier = Arc::new(classifier);
        self
    }

    /// Values `<= 0` retry without an attempt bound.
    pub fn max_attempts(mut self, max_attempts: i64) -> Self {
        self.max_attempts = if max_attempts <= 0 {
            None
        } else {
            Some(u32::try_from(max_attempts).unwrap_or(u32::MAX))
        };
        self
    }

    pub fn build(self) -> RetryPolicy {
        RetryPolicy {
            backoff: self.backoff,
            classifier: self.classifier,
            max_attempts: self.max_attempts,
        }
    }
}
