//! The only error the retry loop produces on its own.

use thiserror::Error;
use tonic::Status;

/// The call was interrupted while waiting between attempts.
///
/// Every other failure the interceptor returns is the downstream error,
/// untouched. Handler error types opt into carrying this one through
/// `From<Interrupted>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Interrupted {
    /// The call's cancellation token fired.
    #[error("call cancelled while waiting to retry")]
    Cancelled,
    /// The call's deadline passed.
    #[error("call deadline exceeded while waiting to retry")]
    DeadlineExceeded,
}

impl From<Interrupted> for Status {
    fn from(err: Interrupted) -> Self {
        match err {
            Interrupted::Cancelled => Status::cancelled(err.to_string()),
            Interrupted::DeadlineExceeded => Status::deadline_exceeded(err.to_string()),
        }
    }
}

impl From<Interrupted> for std::io::Error {
    fn from(err: Interrupted) -> Self {
        let kind = match err {
            Interrupted::Cancelled => std::io::ErrorKind::Interrupted,
            Interrupted::DeadlineExceeded => std::io::ErrorKind::TimedOut,
        };
        std::io::Error::new(kind, err)
    }
}
