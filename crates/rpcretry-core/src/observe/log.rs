//! Structured `tracing` output for retries and give-ups.

use crate::context::CallContext;
use crate::retry::Terminal;

use super::{AttemptObserver, AttemptOutcome, AttemptRecord, CallSummary};

/// Logs retried attempts at `debug` and every failed call at `warn`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver {
    max_attempts: Option<u32>,
}

impl TracingObserver {
    /// `max_attempts` is only used to annotate the attempts-exhausted warning.
    pub fn new(max_attempts: Option<u32>) -> Self {
        Self { max_attempts }
    }
}

impl AttemptObserver for TracingObserver {
    fn on_attempt(&self, ctx: &CallContext, record: &AttemptRecord<'_>) {
        let AttemptOutcome::Retrying(backoff) = record.outcome else {
            return;
        };
        let (service, method) = ctx.service_and_method();
        let error = record.error.map(|e| e.to_string()).unwrap_or_default();
        tracing::debug!(
            interceptor = "retry-interceptor",
            procedure = ctx.procedure(),
            service,
            method,
            attempt = record.attempt,
            elapsed_us = record.elapsed_us() as u64,
            backoff_ms = backoff.as_millis() as u64,
            error = %error,
            "RPC request failed, retrying"
        );
    }

    fn on_finish(&self, ctx: &CallContext, summary: &CallSummary<'_>) {
        let message = match summary.terminal {
            Terminal::Success => return,
            Terminal::NonRetryable => "RPC request failed with non-retryable error",
            Terminal::AttemptsExhausted => "RPC request failed after max attempts",
            Terminal::BackoffExhausted => "RPC request failed after max backoff",
            Terminal::Cancelled => "RPC request cancelled while waiting to retry",
            Terminal::DeadlineExceeded => "RPC request deadline exceeded while waiting to retry",
        };
        let (service, method) = ctx.service_and_method();
        let error = summary.error.map(|e| e.to_string()).unwrap_or_default();
        let max_attempts = match summary.terminal {
            Terminal::AttemptsExhausted => self.max_attempts,
            _ => None,
        };
        tracing::warn!(
            interceptor = "retry-interceptor",
            procedure = ctx.procedure(),
            service,
            method,
            outcome = summary.terminal.as_str(),
            attempts = summary.attempts,
            max_attempts,
            elapsed_us = summary.last_elapsed.as_micros() as u64,
            total_ms = summary.total_elapsed.as_millis() as u64,
            error = %error,
            "{message}"
        );
    }
}
