//! Flaky unary service for integration tests.
//!
//! Fails a fixed number of times with a chosen error, then echoes the
//! request. Every call takes `latency` (virtual time under a paused clock) and
//! honours the context's cancellation token while in flight.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rpcretry_core::{CallContext, UnaryHandler};
use tonic::{Code, Status};

#[derive(Clone)]
pub struct FlakyService {
    failures: u32,
    code: Code,
    message: String,
    latency: Duration,
    calls: Arc<AtomicU32>,
}

impl FlakyService {
    /// Fails `failures` times with `Unavailable`, then succeeds.
    pub fn unavailable(failures: u32) -> Self {
        Self::failing_with(failures, Code::Unavailable, "service warming up")
    }

    /// Never succeeds.
    pub fn always(code: Code, message: &str) -> Self {
        Self::failing_with(u32::MAX, code, message)
    }

    pub fn failing_with(failures: u32, code: Code, message: &str) -> Self {
        Self {
            failures,
            code,
            message: message.to_string(),
            latency: Duration::ZERO,
            calls: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Shared call counter; clones of the service share it too.
    pub fn calls(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl UnaryHandler for FlakyService {
    type Request = String;
    type Response = String;
    type Error = Status;

    async fn call(&self, ctx: &CallContext, req: &String) -> Result<String, Status> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::select! {
                _ = ctx.cancellation().cancelled() => {
                    return Err(Status::cancelled("request cancelled in flight"));
                }
                _ = tokio::time::sleep(self.latency) => {}
            }
        }
        if n < self.failures {
            return Err(Status::new(
                self.code,
                format!("{} (attempt {})", self.message, n + 1),
            ));
        }
        Ok(format!("echo: {req}"))
    }
}
