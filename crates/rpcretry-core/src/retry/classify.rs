//! Classify RPC status codes and transport errors as retryable or not.

use std::error::Error;
use std::io;
use tonic::{Code, Status};

/// Decides whether a failed attempt is worth another try.
///
/// Implementations must be pure and total: the executor calls this once per
/// failed attempt and never expects it to panic.
pub trait Classifier: Send + Sync {
    fn is_retryable(&self, err: &(dyn Error + 'static)) -> bool;
}

impl<F> Classifier for F
where
    F: Fn(&(dyn Error + 'static)) -> bool + Send + Sync,
{
    fn is_retryable(&self, err: &(dyn Error + 'static)) -> bool {
        self(err)
    }
}

/// Retries when the service reports `Unavailable` or the connection was
/// refused, reset or aborted. Every other failure is returned to the caller.
///
/// The whole `source()` chain is inspected, so a status or I/O error wrapped
/// by an application error still counts.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultClassifier;

impl Classifier for DefaultClassifier {
    fn is_retryable(&self, err: &(dyn Error + 'static)) -> bool {
        error_chain(err).any(|e| {
            if let Some(status) = e.downcast_ref::<Status>() {
                return is_retryable_code(status.code());
            }
            if let Some(io_err) = e.downcast_ref::<io::Error>() {
                return is_transient_io(io_err);
            }
            false
        })
    }
}

/// Status codes that indicate the service is transiently unavailable.
pub fn is_retryable_code(code: Code) -> bool {
    code == Code::Unavailable
}

/// Connection-level failures that are expected to clear up on their own.
pub fn is_transient_io(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
    )
}

fn error_chain<'a>(
    err: &'a (dyn Error + 'static),
) -> impl Iterator<Item = &'a (dyn Error + 'static)> {
    std::iter::successors(Some(err), |&e| e.source())
}
