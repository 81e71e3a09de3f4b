//! Request pacing for polite, resumable scraping.
//!
//! Three independent mechanisms are configured here:
//!
//! - a base delay with jitter before every fetch,
//! - an exponential backoff between retries of a single throttled request,
//! - a long cooldown once too many targets in a row come back empty.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use imgscout_core::throttle::{JitterRange, Throttle, ThrottleConfig};
//!
//! let config = ThrottleConfig::default()
//!     .with_base_delay(Duration::from_secs(1))
//!     .with_base_jitter(JitterRange::new(Duration::ZERO, Duration::from_millis(500)));
//! let throttle = Throttle::new(config);
//! assert!(throttle.base_delay() >= Duration::from_secs(1));
//! assert!(throttle.on_consecutive_failures(1).is_none());
//! ```

use std::time::Duration;

use rand::Rng;

use crate::error::AppError;

/// Uniform random extra delay in `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JitterRange {
    pub min: Duration,
    pub max: Duration,
}

impl JitterRange {
    pub const ZERO: JitterRange = JitterRange {
        min: Duration::ZERO,
        max: Duration::ZERO,
    };

    pub fn new(min: Duration, max: Duration) -> Self {
        Self { min, max }
    }

    /// Draw one value from the range.
    pub fn sample(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let lo = self.min.as_millis() as u64;
        let hi = self.max.as_millis() as u64;
        Duration::from_millis(rand::rng().random_range(lo..=hi))
    }
}

/// Pacing configuration. Every constant is overridable so tests can run
/// with [`ThrottleConfig::immediate`].
#[derive(Debug, Clone)]
pub struct ThrottleConfig {
    /// Fixed floor slept before every fetch.
    pub base_delay: Duration,

    /// Jitter added on top of `base_delay`.
    pub base_jitter: JitterRange,

    /// Backoff before the first retry; doubles on each further retry.
    pub retry_backoff: Duration,

    /// Jitter added on top of the retry backoff.
    pub retry_jitter: JitterRange,

    /// Consecutive empty results that trigger a cooldown.
    pub cooldown_threshold: u32,

    /// Fixed floor of the failure-streak cooldown.
    pub cooldown: Duration,

    /// Jitter added on top of `cooldown`.
    pub cooldown_jitter: JitterRange,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(2),
            base_jitter: JitterRange::new(Duration::from_millis(500), Duration::from_millis(2500)),
            retry_backoff: Duration::from_secs(10),
            retry_jitter: JitterRange::new(Duration::from_secs(2), Duration::from_secs(8)),
            cooldown_threshold: 5,
            cooldown: Duration::from_secs(60),
            cooldown_jitter: JitterRange::new(Duration::ZERO, Duration::from_secs(30)),
        }
    }
}

impl ThrottleConfig {
    /// No delays at all, default threshold. For tests and dry runs.
    pub fn immediate() -> Self {
        Self {
            base_delay: Duration::ZERO,
            base_jitter: JitterRange::ZERO,
            retry_backoff: Duration::ZERO,
            retry_jitter: JitterRange::ZERO,
            cooldown: Duration::ZERO,
            cooldown_jitter: JitterRange::ZERO,
            ..Self::default()
        }
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_base_jitter(mut self, jitter: JitterRange) -> Self {
        self.base_jitter = jitter;
        self
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn with_retry_jitter(mut self, jitter: JitterRange) -> Self {
        self.retry_jitter = jitter;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration, threshold: u32) -> Self {
        self.cooldown = cooldown;
        self.cooldown_threshold = threshold;
        self
    }

    pub fn with_cooldown_jitter(mut self, jitter: JitterRange) -> Self {
        self.cooldown_jitter = jitter;
        self
    }

    /// Reject inverted jitter ranges and a zero cooldown threshold.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.cooldown_threshold == 0 {
            return Err(AppError::ConfigError(
                "cooldown threshold must be at least 1".into(),
            ));
        }
        for (name, range) in [
            ("base jitter", self.base_jitter),
            ("retry jitter", self.retry_jitter),
            ("cooldown jitter", self.cooldown_jitter),
        ] {
            if range.min > range.max {
                return Err(AppError::ConfigError(format!(
                    "{name}: minimum {:?} exceeds maximum {:?}",
                    range.min, range.max
                )));
            }
        }
        Ok(())
    }
}

/// Computes sleep durations. Holds no timing state of its own; the caller
/// decides when to sleep.
#[derive(Debug, Clone)]
pub struct Throttle {
    config: ThrottleConfig,
}

impl Throttle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    /// Delay applied before every fetch.
    pub fn base_delay(&self) -> Duration {
        self.config.base_delay + self.config.base_jitter.sample()
    }

    /// Cooldown to take once `consecutive` empty results have piled up.
    ///
    /// Returns `None` below the threshold. The caller resets its streak
    /// after sleeping.
    pub fn on_consecutive_failures(&self, consecutive: u32) -> Option<Duration> {
        if consecutive < self.config.cooldown_threshold {
            return None;
        }
        Some(self.config.cooldown + self.config.cooldown_jitter.sample())
    }

    /// Backoff before retry number `attempt + 1` of a throttled request.
    pub fn backoff_for_retry(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(16);
        self.config.retry_backoff.saturating_mul(factor) + self.config.retry_jitter.sample()
    }

    pub fn cooldown_threshold(&self) -> u32 {
        self.config.cooldown_threshold
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(ThrottleConfig::default())
    }
}
