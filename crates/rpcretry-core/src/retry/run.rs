//! Retry loop: run an async attempt until success or the policy says stop.

use std::error::Error;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use super::error::Interrupted;
use super::policy::{RetryDecision, RetryPolicy, Terminal};
use crate::context::CallContext;
use crate::observe::{AttemptObserver, AttemptOutcome, AttemptRecord, CallSummary};

/// Runs `op` until it succeeds or the retry policy says to stop.
///
/// A fresh backoff generator is taken from the policy for this call only. On
/// a retryable failure the loop waits for the backoff duration, unless the
/// context is cancelled or its deadline passes first, in which case the
/// corresponding [`Interrupted`] error is returned. In every other case the
/// error is exactly the one produced by the last attempt.
pub async fn run_with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    ctx: &CallContext,
    observer: &dyn AttemptObserver,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Error + From<Interrupted> + 'static,
{
    let mut backoff = policy.new_backoff();
    let call_started = Instant::now();
    let mut attempt = 0u32;
    loop {
        attempt = attempt.saturating_add(1);
        let started = Instant::now();
        let result = op().await;
        let elapsed = started.elapsed();

        let finish = |terminal, error: Option<&(dyn Error + 'static)>| {
            observer.on_finish(
                ctx,
                &CallSummary {
                    terminal,
                    attempts: attempt,
                    last_elapsed: elapsed,
                    total_elapsed: call_started.elapsed(),
                    error,
                },
            );
        };

        let delay = match result {
            Ok(value) => {
                observer.on_attempt(
                    ctx,
                    &AttemptRecord {
                        attempt,
                        elapsed,
                        outcome: AttemptOutcome::Success,
                        error: None,
                    },
                );
                finish(Terminal::Success, None);
                return Ok(value);
            }
            Err(err) => {
                let decision = policy.decide(attempt, &err, backoff.as_mut());
                let outcome = match decision {
                    RetryDecision::RetryAfter(delay) => AttemptOutcome::Retrying(delay),
                    RetryDecision::Stop(terminal) => AttemptOutcome::Stopped(terminal),
                };
                observer.on_attempt(
                    ctx,
                    &AttemptRecord {
                        attempt,
                        elapsed,
                        outcome,
                        error: Some(&err),
                    },
                );
                match decision {
                    RetryDecision::RetryAfter(delay) => delay,
                    RetryDecision::Stop(terminal) => {
                        finish(terminal, Some(&err));
                        return Err(err);
                    }
                }
            }
        };

        if let Err(interrupted) = wait(ctx, delay).await {
            let terminal = match interrupted {
                Interrupted::Cancelled => Terminal::Cancelled,
                Interrupted::DeadlineExceeded => Terminal::DeadlineExceeded,
            };
            let err = E::from(interrupted);
            finish(terminal, Some(&err));
            return Err(err);
        }
    }
}

/// Sleep for `delay`, returning early if the call is cancelled or its
/// deadline passes.
async fn wait(ctx: &CallContext, delay: Duration) -> Result<(), Interrupted> {
    tokio::select! {
        biased;
        _ = ctx.cancellation().cancelled() => Err(Interrupted::Cancelled),
        _ = deadline_passed(ctx.deadline()) => Err(Interrupted::DeadlineExceeded),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}

async fn deadline_passed(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
