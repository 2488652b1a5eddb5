//! Backoff sequences: fixed and capped exponential.
//!
//! A [`BackoffFactory`] is shared by every call going through an interceptor;
//! each call asks it for a fresh [`Backoff`] and owns that generator until the
//! call returns. Generators are never shared between calls.

use rand::Rng;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Stateful generator of wait durations for a single logical call.
pub trait Backoff: Send {
    /// Next wait before retrying, or `None` to stop retrying.
    fn next_backoff(&mut self) -> Option<Duration>;
}

/// Produces a fresh [`Backoff`] for each logical call.
pub trait BackoffFactory: Send + Sync {
    fn make(&self) -> Box<dyn Backoff>;
}

impl<F, B> BackoffFactory for F
where
    F: Fn() -> B + Send + Sync,
    B: Backoff + 'static,
{
    fn make(&self) -> Box<dyn Backoff> {
        Box::new(self())
    }
}

/// Invalid exponential backoff parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackoffConfigError {
    #[error("initial interval must be greater than zero")]
    ZeroInitialInterval,
    #[error("multiplier must be a finite value >= 1.0, got {0}")]
    InvalidMultiplier(f64),
    #[error("max interval ({max:?}) is below the initial interval ({initial:?})")]
    MaxBelowInitial { initial: Duration, max: Duration },
    #[error("randomization factor must be within [0, 1], got {0}")]
    InvalidRandomization(f64),
}

/// Constant wait between attempts. Never signals stop; the attempt bound is
/// the only thing that ends a fixed-backoff retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedBackoff {
    pub interval: Duration,
}

impl FixedBackoff {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for FixedBackoff {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL)
    }
}

impl Backoff for FixedBackoff {
    fn next_backoff(&mut self) -> Option<Duration> {
        Some(self.interval)
    }
}

impl BackoffFactory for FixedBackoff {
    fn make(&self) -> Box<dyn Backoff> {
        Box::new(*self)
    }
}

/// Exponential backoff parameters.
///
/// Intervals start at `initial_interval` and grow by `multiplier` after every
/// query, capped at `max_interval`. With `max_elapsed_time` set, the generator
/// stops once the time since its creation plus the next interval would exceed
/// the budget; without it the sequence is unbounded in time.
///
/// A non-zero `randomization_factor` spreads each interval uniformly over
/// `[i * (1 - f), i * (1 + f)]`, still capped at `max_interval`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialBackoff {
    initial_interval: Duration,
    multiplier: f64,
    max_interval: Duration,
    max_elapsed_time: Option<Duration>,
    randomization_factor: f64,
}

impl ExponentialBackoff {
    pub const DEFAULT_INITIAL_INTERVAL: Duration = Duration::from_millis(500);
    pub const DEFAULT_MULTIPLIER: f64 = 1.5;
    pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(15);

    pub fn new(
        initial_interval: Duration,
        multiplier: f64,
        max_interval: Duration,
    ) -> Result<Self, BackoffConfigError> {
        let backoff = Self {
            initial_interval,
            multiplier,
            max_interval,
            max_elapsed_time: None,
            randomization_factor: 0.0,
        };
        backoff.validate()?;
        Ok(backoff)
    }

    /// Total time budget for the sequence. `None` or a zero budget retries
    /// indefinitely.
    pub fn with_max_elapsed_time(mut self, budget: Option<Duration>) -> Self {
        self.max_elapsed_time = budget.filter(|b| !b.is_zero());
        self
    }

    pub fn with_randomization_factor(mut self, factor: f64) -> Result<Self, BackoffConfigError> {
        self.randomization_factor = factor;
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), BackoffConfigError> {
        if self.initial_interval.is_zero() {
            return Err(BackoffConfigError::ZeroInitialInterval);
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(BackoffConfigError::InvalidMultiplier(self.multiplier));
        }
        if self.max_interval < self.initial_interval {
            return Err(BackoffConfigError::MaxBelowInitial {
                initial: self.initial_interval,
                max: self.max_interval,
            });
        }
        if !(0.0..=1.0).contains(&self.randomization_factor) {
            return Err(BackoffConfigError::InvalidRandomization(
                self.randomization_factor,
            ));
        }
        Ok(())
    }

    pub fn initial_interval(&self) -> Duration {
        self.initial_interval
    }

    pub fn multiplier(&self) -> f64 {
        self.multiplier
    }

    pub fn max_interval(&self) -> Duration {
        self.max_interval
    }

    pub fn max_elapsed_time(&self) -> Option<Duration> {
        self.max_elapsed_time
    }

    pub fn randomization_factor(&self) -> f64 {
        self.randomization_factor
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial_interval: Self::DEFAULT_INITIAL_INTERVAL,
            multiplier: Self::DEFAULT_MULTIPLIER,
            max_interval: Self::DEFAULT_MAX_INTERVAL,
            max_elapsed_time: None,
            randomization_factor: 0.0,
        }
    }
}

impl BackoffFactory for ExponentialBackoff {
    fn make(&self) -> Box<dyn Backoff> {
        Box::new(ExponentialSequence::new(*self))
    }
}

/// Per-call state of an [`ExponentialBackoff`].
#[derive(Debug)]
pub struct ExponentialSequence {
    params: ExponentialBackoff,
    current: Duration,
    started: Instant,
}

impl ExponentialSequence {
    pub fn new(params: ExponentialBackoff) -> Self {
        Self {
            params,
            current: params.initial_interval,
            started: Instant::now(),
        }
    }

    fn grow(&mut self) {
        let max = self.params.max_interval;
        // Scale whole nanoseconds so 100ms * 2.0 is exactly 200ms.
        let next = self.current.as_nanos() as f64 * self.params.multiplier;
        if next >= max.as_nanos() as f64 {
            self.current = max;
        } else {
            self.current = Duration::from_nanos(next.round() as u64)
                .clamp(self.current, max);
        }
    }

    fn randomized(&self, interval: Duration) -> Duration {
        let factor = self.params.randomization_factor;
        if factor == 0.0 {
            return interval;
        }
        let secs = interval.as_secs_f64();
        let delta = secs * factor;
        let picked = rand::thread_rng().gen_range((secs - delta)..=(secs + delta));
        Duration::from_secs_f64(picked.max(0.0)).min(self.params.max_interval)
    }
}

impl Backoff for ExponentialSequence {
    fn next_backoff(&mut self) -> Option<Duration> {
        let elapsed = self.started.elapsed();
        let next = self.randomized(self.current);
        self.grow();
        match self.params.max_elapsed_time {
            Some(budget) if elapsed + next > budget => None,
            _ => Some(next),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn fixed_backoff_is_constant_and_unbounded() {
        let mut b = FixedBackoff::default().make();
        for _ in 0..1_000 {
            assert_eq!(b.next_backoff(), Some(Duration::from_secs(1)));
        }
    }

    #[tokio::test]
    async fn exponential_grows_by_multiplier_and_caps() {
        let params = ExponentialBackoff::new(
            Duration::from_millis(100),
            2.0,
            Duration::from_millis(500),
        )
        .unwrap();
        let mut b = params.make();
        let got: Vec<_> = (0..6).map(|_| b.next_backoff().unwrap()).collect();
        let ms: Vec<u128> = got.iter().map(|d| d.as_millis()).collect();
        assert_eq!(ms, vec![100, 200, 400, 500, 500, 500]);
    }

    #[tokio::test]
    async fn exponential_default_never_stops_and_respects_cap() {
        let mut b = ExponentialBackoff::default().make();
        let mut prev = Duration::ZERO;
        for _ in 0..200 {
            let d = b.next_backoff().expect("default exponential must not stop");
            assert!(d >= prev);
            assert!(d <= Duration::from_secs(15));
            prev = d;
        }
        assert_eq!(prev, Duration::from_secs(15));
    }

    #[tokio::test(start_paused = true)]
    async fn exponential_stops_once_elapsed_budget_is_spent() {
        let params = ExponentialBackoff::new(Duration::from_secs(1), 2.0, Duration::from_secs(8))
            .unwrap()
            .with_max_elapsed_time(Some(Duration::from_secs(5)));
        let mut b = params.make();
        assert_eq!(b.next_backoff(), Some(Duration::from_secs(1)));
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(b.next_backoff(), Some(Duration::from_secs(2)));
        tokio::time::advance(Duration::from_secs(2)).await;
        // 3s elapsed + 4s next > 5s budget
        assert_eq!(b.next_backoff(), None);
    }

    #[tokio::test]
    async fn randomized_interval_stays_within_spread_and_cap() {
        let params = ExponentialBackoff::new(Duration::from_secs(1), 1.0, Duration::from_secs(1))
            .unwrap()
            .with_randomization_factor(0.5)
            .unwrap();
        let mut b = params.make();
        for _ in 0..100 {
            let d = b.next_backoff().unwrap();
            assert!(d >= Duration::from_millis(500));
            assert!(d <= Duration::from_secs(1));
        }
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        assert_eq!(
            ExponentialBackoff::new(Duration::ZERO, 1.5, Duration::from_secs(1)),
            Err(BackoffConfigError::ZeroInitialInterval)
        );
        assert_eq!(
            ExponentialBackoff::new(Duration::from_secs(1), 0.0, Duration::from_secs(1)),
            Err(BackoffConfigError::InvalidMultiplier(0.0))
        );
        assert!(matches!(
            ExponentialBackoff::new(Duration::from_secs(2), 1.5, Duration::from_secs(1)),
            Err(BackoffConfigError::MaxBelowInitial { .. })
        ));
        assert_eq!(
            ExponentialBackoff::default().with_randomization_factor(1.5),
            Err(BackoffConfigError::InvalidRandomization(1.5))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn zero_elapsed_budget_means_no_budget() {
        let params = ExponentialBackoff::default().with_max_elapsed_time(Some(Duration::ZERO));
        assert_eq!(params.max_elapsed_time(), None);
        let mut b = params.make();
        assert_eq!(b.next_backoff(), Some(Duration::from_millis(500)));
        tokio::time::advance(Duration::from_secs(3600)).await;
        assert!(b.next_backoff().is_some());
    }

    #[test]
    fn closures_act_as_factories() {
        let factory = || FixedBackoff::new(Duration::from_millis(7));
        let mut b = BackoffFactory::make(&factory);
        assert_eq!(b.next_backoff(), Some(Duration::from_millis(7)));
    }

    proptest! {
        #[test]
        fn exponential_is_non_decreasing_and_capped(
            initial_ms in 1u64..5_000,
            multiplier in 1.0f64..10.0,
            extra_ms in 0u64..60_000,
            queries in 1usize..300,
        ) {
            let cap = Duration::from_millis(initial_ms + extra_ms);
            let params = ExponentialBackoff::new(Duration::from_millis(initial_ms), multiplier, cap).unwrap();
            let mut seq = ExponentialSequence::new(params);
            let mut prev = Duration::ZERO;
            for _ in 0..queries {
                let d = seq.next_backoff().unwrap();
                prop_assert!(d >= prev);
                prop_assert!(d <= cap);
                prev = d;
            }
        }
    }
}
