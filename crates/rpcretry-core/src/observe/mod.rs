//! Attempt reporting.
//!
//! The retry loop reports every attempt and every finished call to a list of
//! [`AttemptObserver`]s. Observers are a side channel: they cannot change the
//! decision or the returned error, and several calls report to them
//! concurrently.

mod log;
mod stats;

use std::error::Error;
use std::time::Duration;

use crate::context::CallContext;
use crate::retry::Terminal;

pub use log::TracingObserver;
pub use stats::{RetryStats, RetryStatsSnapshot};

/// What happened after one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    /// Retryable failure; the call waits this long before the next attempt.
    Retrying(Duration),
    /// Failure that ended the call.
    Stopped(Terminal),
}

/// One attempt of a logical call.
#[derive(Debug, Clone, Copy)]
pub struct AttemptRecord<'a> {
    /// 1-based attempt number.
    pub attempt: u32,
    /// Time spent in the downstream handler for this attempt.
    pub elapsed: Duration,
    pub outcome: AttemptOutcome,
    pub error: Option<&'a (dyn Error + 'static)>,
}

impl AttemptRecord<'_> {
    pub fn elapsed_us(&self) -> u128 {
        self.elapsed.as_micros()
    }
}

/// End of a logical call.
#[derive(Debug, Clone, Copy)]
pub struct CallSummary<'a> {
    pub terminal: Terminal,
    /// Attempts made, including the last one.
    pub attempts: u32,
    /// Elapsed time of the last attempt.
    pub last_elapsed: Duration,
    /// Wall time of the whole call, waits included.
    pub total_elapsed: Duration,
    /// The error returned to the caller, if any.
    pub error: Option<&'a (dyn Error + 'static)>,
}

/// Receives attempt and call reports. Must be safe to call from many calls
/// at once.
pub trait AttemptObserver: Send + Sync {
    fn on_attempt(&self, ctx: &CallContext, record: &AttemptRecord<'_>);

    fn on_finish(&self, _ctx: &CallContext, _summary: &CallSummary<'_>) {}
}
