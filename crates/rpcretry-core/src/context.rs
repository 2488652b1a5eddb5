//! Per-call context: procedure name, cancellation and deadline.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Context passed alongside every request through the handler chain.
///
/// Cloning is cheap and clones share the same cancellation token.
#[derive(Debug, Clone)]
pub struct CallContext {
    procedure: Arc<str>,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// Context for `procedure` (e.g. `/acme.billing.v1.Invoices/Get`) with a
    /// fresh cancellation token and no deadline.
    pub fn new(procedure: impl Into<Arc<str>>) -> Self {
        Self {
            procedure: procedure.into(),
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    /// Use an existing token, e.g. a child of a server-wide shutdown token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn procedure(&self) -> &str {
        &self.procedure
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Service and method labels derived from the procedure name.
    pub fn service_and_method(&self) -> (&str, &str) {
        service_and_method(&self.procedure)
    }
}

/// Split `/pkg.Service/Method` into `("pkg", "Method")`.
///
/// The service label is the leading package segment of the fully-qualified
/// service name. Missing parts come back as `"unknown"`.
pub fn service_and_method(procedure: &str) -> (&str, &str) {
    let trimmed = procedure.strip_prefix('/').unwrap_or(procedure);
    match trimmed.split_once('/') {
        Some((long, rest)) => {
            let service = match long.split_once('.') {
                Some((package, _)) => package,
                None => "unknown",
            };
            let method = rest.split('/').next().unwrap_or("unknown");
            (service, method)
        }
        None => ("unknown", "unknown"),
    }
}
