//! Exponential backoff with symmetric jitter.
//!
//! The publisher asks a [`RetryInterval`] how long to wait before retry N.
//! [`BackoffSequence`] is the production schedule: each delay is computed
//! from its parameters and the attempt number alone, so one sequence can be
//! shared by any number of in-flight publishes.

use std::{fmt::Debug, time::Duration};

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Source of delays between a failed attempt and the next retry.
pub trait RetryInterval: Send + Sync + Debug {
    /// Returns the delay before retry `attempt` (1-based), or `None` when the
    /// retry budget is spent.
    fn next(&self, attempt: u32) -> Option<Duration>;
}

/// Schedule that never retries. Used when no retry policy is configured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoRetry;

impl RetryInterval for NoRetry {
    fn next(&self, _attempt: u32) -> Option<Duration> {
        None
    }
}

/// Jittered exponential backoff bounded by a maximum retry count.
///
/// Delay before retry `n` is `initial_delay * multiplier^n * (1 + r)` where
/// `r` is drawn uniformly from `[-jitter_factor, +jitter_factor]` on every
/// call. With the defaults this yields roughly 0.75s, 1.1s, 1.7s, ... up to
/// about 28.8s for the tenth retry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffSequence {
    /// Base delay in seconds.
    pub initial_delay: f64,

    /// Growth factor applied per attempt.
    pub multiplier: f64,

    /// Symmetric jitter as a fraction of the computed delay (0.0 to 1.0).
    pub jitter_factor: f64,

    /// Number of retries allowed after the initial attempt.
    pub max_attempts: u32,
}

impl Default for BackoffSequence {
    fn default() -> Self {
        Self {
            initial_delay: crate::DEFAULT_INITIAL_DELAY_SECS,
            multiplier: crate::DEFAULT_MULTIPLIER,
            jitter_factor: crate::DEFAULT_JITTER_FACTOR,
            max_attempts: crate::DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl BackoffSequence {
    /// Creates a sequence with explicit parameters.
    pub fn new(initial_delay: f64, multiplier: f64, jitter_factor: f64, max_attempts: u32) -> Self {
        Self { initial_delay, multiplier, jitter_factor, max_attempts }
    }

    /// Returns a copy with a different retry budget.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Delay before retry `attempt` using the thread-local generator.
    pub fn next(&self, attempt: u32) -> Option<Duration> {
        self.next_with_rng(attempt, &mut rand::rng())
    }

    /// Delay before retry `attempt` drawing jitter from `rng`.
    ///
    /// Returns `None` once `attempt` exceeds `max_attempts`.
    pub fn next_with_rng<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Option<Duration> {
        if attempt > self.max_attempts {
            return None;
        }

        let base = self.base_delay_secs(attempt);
        let jitter = self.jitter_factor.clamp(0.0, 1.0);
        let offset = if jitter > 0.0 { rng.random_range(-jitter..=jitter) } else { 0.0 };

        Some(seconds_to_duration(base * (1.0 + offset)))
    }

    /// Un-jittered delay in seconds for `attempt`.
    pub fn base_delay_secs(&self, attempt: u32) -> f64 {
        self.initial_delay * self.multiplier.powf(f64::from(attempt))
    }
}

impl RetryInterval for BackoffSequence {
    fn next(&self, attempt: u32) -> Option<Duration> {
        BackoffSequence::next(self, attempt)
    }
}

/// Converts fractional seconds, saturating instead of panicking on overflow.
fn seconds_to_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(Duration::MAX)
}
