//! Lock-free retry counters.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::context::CallContext;
use crate::retry::Terminal;

use super::{AttemptObserver, AttemptOutcome, AttemptRecord, CallSummary};

/// Process-local counters, updated with relaxed atomics from any number of
/// concurrent calls.
#[derive(Debug, Default)]
pub struct RetryStats {
    calls: AtomicU64,
    attempts: AtomicU64,
    retries: AtomicU64,
    successes: AtomicU64,
    non_retryable: AtomicU64,
    exhausted: AtomicU64,
    interrupted: AtomicU64,
}

/// Point-in-time copy of [`RetryStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryStatsSnapshot {
    pub calls: u64,
    pub attempts: u64,
    pub retries: u64,
    pub successes: u64,
    pub non_retryable: u64,
    /// Attempt bound or backoff stop reached.
    pub exhausted: u64,
    /// Cancelled or past deadline.
    pub interrupted: u64,
}

impl RetryStats {
    pub const fn new() -> Self {
        Self {
            calls: AtomicU64::new(0),
            attempts: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            non_retryable: AtomicU64::new(0),
            exhausted: AtomicU64::new(0),
            interrupted: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> RetryStatsSnapshot {
        RetryStatsSnapshot {
            calls: self.calls.load(Ordering::Relaxed),
            attempts: self.attempts.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            non_retryable: self.non_retryable.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
            interrupted: self.interrupted.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        for counter in [
            &self.calls,
            &self.attempts,
            &self.retries,
            &self.successes,
            &self.non_retryable,
            &self.exhausted,
            &self.interrupted,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl RetryStatsSnapshot {
    /// Percentage of finished calls that succeeded; 0.0 before any call.
    pub fn success_rate(&self) -> f64 {
        if self.calls == 0 {
            return 0.0;
        }
        self.successes as f64 / self.calls as f64 * 100.0
    }

    pub fn avg_attempts_per_call(&self) -> f64 {
        if self.calls == 0 {
            return 0.0;
        }
        self.attempts as f64 / self.calls as f64
    }
}

impl AttemptObserver for RetryStats {
    fn on_attempt(&self, _ctx: &CallContext, record: &AttemptRecord<'_>) {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        if let AttemptOutcome::Retrying(_) = record.outcome {
            self.retries.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn on_finish(&self, _ctx: &CallContext, summary: &CallSummary<'_>) {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let counter = match summary.terminal {
            Terminal::Success => &self.successes,
            Terminal::NonRetryable => &self.non_retryable,
            Terminal::AttemptsExhausted | Terminal::BackoffExhausted => &self.exhausted,
            Terminal::Cancelled | Terminal::DeadlineExceeded => &self.interrupted,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn summary(terminal: Terminal, attempts: u32) -> CallSummary<'static> {
        CallSummary {
            terminal,
            attempts,
            last_elapsed: Duration::ZERO,
            total_elapsed: Duration::ZERO,
            error: None,
        }
    }

    #[test]
    fn counts_by_terminal_state() {
        let stats = RetryStats::new();
        let ctx = CallContext::new("/svc.S/M");
        stats.on_finish(&ctx, &summary(Terminal::Success, 1));
        stats.on_finish(&ctx, &summary(Terminal::AttemptsExhausted, 3));
        stats.on_finish(&ctx, &summary(Terminal::BackoffExhausted, 2));
        stats.on_finish(&ctx, &summary(Terminal::Cancelled, 1));
        let snap = stats.snapshot();
        assert_eq!(snap.calls, 4);
        assert_eq!(snap.successes, 1);
        assert_eq!(snap.exhausted, 2);
        assert_eq!(snap.interrupted, 1);
        assert!((snap.success_rate() - 25.0).abs() < 1e-9);

        stats.reset();
        assert_eq!(stats.snapshot(), RetryStatsSnapshot::default());
    }

    #[test]
    fn retrying_attempts_count_as_retries() {
        let stats = RetryStats::new();
        let ctx = CallContext::new("/svc.S/M");
        let record = |attempt, outcome| AttemptRecord {
            attempt,
            elapsed: Duration::from_micros(5),
            outcome,
            error: None,
        };
        stats.on_attempt(&ctx, &record(1, AttemptOutcome::Retrying(Duration::from_secs(1))));
        stats.on_attempt(&ctx, &record(2, AttemptOutcome::Success));
        stats.on_finish(&ctx, &summary(Terminal::Success, 2));
        let snap = stats.snapshot();
        assert_eq!(snap.attempts, 2);
        assert_eq!(snap.retries, 1);
        assert!((snap.avg_attempts_per_call() - 2.0).abs() < 1e-9);
    }
}
