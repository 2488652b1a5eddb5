//! Observer that keeps the backoff durations each procedure waited for.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use rpcretry_core::observe::{AttemptObserver, AttemptOutcome, AttemptRecord, CallSummary};
use rpcretry_core::retry::Terminal;
use rpcretry_core::CallContext;

#[derive(Default)]
pub struct BackoffRecorder {
    waits: Mutex<HashMap<String, Vec<Duration>>>,
    attempts: Mutex<HashMap<String, u32>>,
    terminals: Mutex<HashMap<String, Terminal>>,
}

impl BackoffRecorder {
    pub fn waits(&self, procedure: &str) -> Vec<Duration> {
        self.waits
            .lock()
            .unwrap()
            .get(procedure)
            .cloned()
            .unwrap_or_default()
    }

    pub fn attempts(&self, procedure: &str) -> u32 {
        self.attempts
            .lock()
            .unwrap()
            .get(procedure)
            .copied()
            .unwrap_or(0)
    }

    pub fn terminal(&self, procedure: &str) -> Option<Terminal> {
        self.terminals.lock().unwrap().get(procedure).copied()
    }
}

impl AttemptObserver for BackoffRecorder {
    fn on_attempt(&self, ctx: &CallContext, record: &AttemptRecord<'_>) {
        *self
            .attempts
            .lock()
            .unwrap()
            .entry(ctx.procedure().to_string())
            .or_default() += 1;
        if let AttemptOutcome::Retrying(delay) = record.outcome {
            self.waits
                .lock()
                .unwrap()
                .entry(ctx.procedure().to_string())
                .or_default()
                .push(delay);
        }
    }

    fn on_finish(&self, ctx: &CallContext, summary: &CallSummary<'_>) {
        self.terminals
            .lock()
            .unwrap()
            .insert(ctx.procedure().to_string(), summary.terminal);
    }
}
