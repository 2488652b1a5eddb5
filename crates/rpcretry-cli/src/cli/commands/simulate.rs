//! `rpcretry simulate` – one call through the interceptor to a flaky service.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use rpcretry_core::config::{self, BackoffSettings, RetrySettings};
use rpcretry_core::observe::RetryStats;
use rpcretry_core::{handler_fn, CallContext, RetryInterceptor, UnaryHandler};
use tonic::Status;

use crate::cli::BackoffKind;

#[derive(Debug)]
pub struct SimulateArgs {
    pub failures: u32,
    pub non_retryable: bool,
    pub procedure: String,
    pub config: Option<PathBuf>,
    pub max_attempts: Option<i64>,
    pub backoff: Option<BackoffKind>,
    pub latency_ms: u64,
}

/// Apply command-line overrides on top of file settings. Switching policy
/// resets the backoff to that policy's defaults; naming the policy already in
/// use keeps the file's values.
fn apply_overrides(
    mut settings: RetrySettings,
    max_attempts: Option<i64>,
    backoff: Option<BackoffKind>,
) -> RetrySettings {
    if let Some(n) = max_attempts {
        settings.max_attempts = n;
    }
    match (backoff, &settings.backoff) {
        (Some(BackoffKind::Fixed), BackoffSettings::Exponential { .. }) => {
            settings.backoff = BackoffSettings::default();
        }
        (Some(BackoffKind::Exponential), BackoffSettings::Fixed { .. }) => {
            settings.backoff = BackoffSettings::exponential();
        }
        _ => {}
    }
    settings
}

fn simulated_error(non_retryable: bool, n: u32, failures: u32) -> Status {
    if non_retryable {
        Status::permission_denied(format!("simulated rejection ({n}/{failures})"))
    } else {
        Status::unavailable(format!("simulated outage ({n}/{failures})"))
    }
}

pub async fn run_simulate(args: SimulateArgs) -> Result<()> {
    let settings = match &args.config {
        Some(path) => config::load_from(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?,
        None => config::load_or_init()?,
    };
    let settings = apply_overrides(settings, args.max_attempts, args.backoff);
    tracing::debug!("simulate settings: {:?}", settings);
    let policy = settings.into_policy()?;

    let calls = Arc::new(AtomicU32::new(0));
    let failures = args.failures;
    let non_retryable = args.non_retryable;
    let latency = Duration::from_millis(args.latency_ms);
    let service = handler_fn({
        let calls = Arc::clone(&calls);
        move |ctx: CallContext, req: String| {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if !latency.is_zero() {
                    tokio::select! {
                        _ = ctx.cancellation().cancelled() => {
                            return Err(Status::cancelled("cancelled in flight"));
                        }
                        _ = tokio::time::sleep(latency) => {}
                    }
                }
                if n <= failures {
                    return Err(simulated_error(non_retryable, n, failures));
                }
                Ok(format!("echo: {req}"))
            }
        }
    });

    let stats = Arc::new(RetryStats::new());
    let client = RetryInterceptor::new(policy)
        .with_observer(stats.clone())
        .wrap(service);

    let ctx = CallContext::new(args.procedure);
    let ctrl_c = {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, cancelling call");
                ctx.cancel();
            }
        })
    };

    let result = client.call(&ctx, &"ping".to_string()).await;
    ctrl_c.abort();

    let snap = stats.snapshot();
    println!("invocations: {}", calls.load(Ordering::SeqCst));
    println!(
        "attempts: {}  retries: {}  success rate: {:.1}%",
        snap.attempts,
        snap.retries,
        snap.success_rate()
    );
    let resp = call_outcome(result)?;
    println!("ok: {resp}");
    Ok(())
}

/// A failed call becomes the command's error so the process exits non-zero.
fn call_outcome(result: Result<String, Status>) -> Result<String> {
    result.map_err(|status| {
        anyhow!(
            "simulated call failed: {:?}: {}",
            status.code(),
            status.message()
        )
    })
}
