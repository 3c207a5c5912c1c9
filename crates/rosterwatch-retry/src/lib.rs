//! Bounded retry policy for collaborator lookups.
//!
//! External lookups (player search, ban-case status) fail transiently now
//! and then. Instead of re-invoking themselves on a timer with a counter
//! argument, callers describe the retry behavior once as a [`RetryPolicy`]
//! and hand it the operation:
//!
//! ```ignore
//! let policy = RetryPolicy::new(RetryConfig::default());
//! let profile = policy
//!     .run(|attempt| lookup.by_name(name, attempt), |e| e.is_transient())
//!     .await?;
//! ```
//!
//! Delays run on the Tokio timer, so tests can drive them with
//! `tokio::time::pause()`.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// How the delay between attempts grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    /// Same delay before every retry.
    #[default]
    Fixed,
    /// Delay doubles after each retry, capped at `max_delay`.
    Exponential { max_delay: Duration },
}

/// Full configuration for a retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Extra attempts after the first one. 0 disables retrying.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    pub backoff: Backoff,
    /// Random jitter (0–max ms) added to each delay so concurrent
    /// lookups do not retry in lockstep.
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
            backoff: Backoff::Fixed,
            jitter_ms: 0,
        }
    }
}

impl RetryConfig {
    /// Hard cap on `max_retries`.
    pub const MAX_RETRIES: u32 = 10;

    /// Config that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`RetryPolicy::new`].
    pub fn validated(mut self) -> Self {
        if self.max_retries > Self::MAX_RETRIES {
            warn!(
                max_retries = self.max_retries,
                cap = Self::MAX_RETRIES,
                "max_retries exceeds cap, clamping"
            );
            self.max_retries = Self::MAX_RETRIES;
        }
        if let Backoff::Exponential { max_delay } = &mut self.backoff {
            if *max_delay < self.base_delay {
                *max_delay = self.base_delay;
            }
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Attempt state and errors
// ---------------------------------------------------------------------------

/// Per-call retry state, handed to the operation on every attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    /// 1-based attempt number.
    pub number: u32,
    /// Total attempts this call may make.
    pub max_attempts: u32,
}

impl Attempt {
    /// `true` if a failure now will not be retried.
    pub fn is_last(&self) -> bool {
        self.number >= self.max_attempts
    }
}

/// Why a retried call gave up.
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E: std::error::Error + 'static> {
    /// The operation failed with an error that retrying cannot fix.
    #[error(transparent)]
    Permanent(E),

    /// Every attempt failed with a transient error.
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },
}

impl<E: std::error::Error + 'static> RetryError<E> {
    /// The underlying error of the final attempt.
    pub fn into_inner(self) -> E {
        match self {
            Self::Permanent(e) => e,
            Self::Exhausted { last, .. } => last,
        }
    }
}

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// A bounded retry policy.
///
/// Cheap to clone; one instance can serve any number of concurrent calls
/// because all per-call state lives in [`Attempt`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config: config.validated(),
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Total attempts per call, first attempt included.
    pub fn max_attempts(&self) -> u32 {
        self.config.max_retries + 1
    }

    /// Delay before retry number `retry` (1-based), jitter excluded.
    pub fn delay_for(&self, retry: u32) -> Duration {
        match self.config.backoff {
            Backoff::Fixed => self.config.base_delay,
            Backoff::Exponential { max_delay } => {
                let factor = 2u32.saturating_pow(retry.saturating_sub(1));
                self.config
                    .base_delay
                    .checked_mul(factor)
                    .map_or(max_delay, |d| d.min(max_delay))
            }
        }
    }

    fn jittered_delay(&self, retry: u32) -> Duration {
        let base = self.delay_for(retry);
        if self.config.jitter_ms == 0 {
            return base;
        }
        let ms = rand::rng().random_range(0..=self.config.jitter_ms);
        base + Duration::from_millis(ms)
    }

    /// Runs `op` until it succeeds, fails permanently, or runs out of
    /// attempts.
    ///
    /// `is_transient` decides which errors are worth another attempt.
    /// Non-transient errors are returned at once as
    /// [`RetryError::Permanent`].
    pub async fn run<T, E, F, Fut, P>(
        &self,
        mut op: F,
        is_transient: P,
    ) -> Result<T, RetryError<E>>
    where
        E: std::error::Error + 'static,
        F: FnMut(Attempt) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        let max_attempts = self.max_attempts();
        let mut attempt = Attempt {
            number: 1,
            max_attempts,
        };

        loop {
            match op(attempt).await {
                Ok(value) => {
                    if attempt.number > 1 {
                        debug!(attempt = attempt.number, "retried call succeeded");
                    }
                    return Ok(value);
                }
                Err(e) if !is_transient(&e) => {
                    return Err(RetryError::Permanent(e));
                }
                Err(e) if attempt.is_last() => {
                    warn!(
                        attempts = attempt.number,
                        error = %e,
                        "transient failure, retries exhausted"
                    );
                    return Err(RetryError::Exhausted {
                        attempts: attempt.number,
                        last: e,
                    });
                }
                Err(e) => {
                    let delay = self.jittered_delay(attempt.number);
                    debug!(
                        attempt = attempt.number,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt.number += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}
