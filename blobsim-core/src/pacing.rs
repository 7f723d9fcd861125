//! Read pacing for bandwidth-limited streams.
//!
//! Two strategies share one contract: given the size of a read and the
//! current instant, report how long the reader must wait before returning.
//! The pacer never sleeps itself; the stream applies the delay through its
//! [`Clock`](crate::clock::Clock).

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::stream::StreamError;

/// How a configured rate limit is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum PacingStrategy {
    /// Each read waits until `bytes / rate` has passed since the previous
    /// read completed. Idle time before a read is credited, so bursts after
    /// a pause are not penalised.
    #[default]
    CallGranular,
    /// Token bucket holding at most `burst_bytes` tokens, refilled at the
    /// configured rate. Reads larger than the available tokens wait for the
    /// deficit.
    TokenBucket {
        /// Bucket capacity in bytes
        burst_bytes: u64,
    },
}

/// Throughput cap applied to stream reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    /// Maximum sustained throughput in bytes per second
    pub bytes_per_second: u64,
    /// Enforcement strategy
    pub strategy: PacingStrategy,
}

impl RateLimit {
    /// Creates a call-granular rate limit.
    pub fn new(bytes_per_second: u64) -> Self {
        Self {
            bytes_per_second,
            strategy: PacingStrategy::CallGranular,
        }
    }

    /// Replaces the pacing strategy.
    pub fn with_strategy(mut self, strategy: PacingStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Returns the time `bytes` should take at this rate.
    pub fn expected_duration(&self, bytes: u64) -> Duration {
        secs_to_duration(bytes as f64 / self.bytes_per_second as f64)
    }

    /// Checks that the limit can be enforced.
    ///
    /// # Errors
    ///
    /// - `StreamError::InvalidArgument` - If the rate or the bucket capacity is zero
    pub fn validate(&self) -> Result<(), StreamError> {
        if self.bytes_per_second == 0 {
            return Err(StreamError::InvalidArgument {
                reason: "rate limit must be greater than zero bytes per second".to_string(),
            });
        }
        if let PacingStrategy::TokenBucket { burst_bytes: 0 } = self.strategy {
            return Err(StreamError::InvalidArgument {
                reason: "token bucket burst capacity must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Per-stream pacing state.
#[derive(Debug, Clone)]
pub(crate) enum Pacer {
    Unlimited,
    CallGranular {
        limit: RateLimit,
        last_read_time: Instant,
    },
    TokenBucket(TokenBucket),
}

impl Pacer {
    /// Creates pacing state anchored at `now`.
    pub(crate) fn new(limit: Option<RateLimit>, now: Instant) -> Self {
        match limit {
            None => Pacer::Unlimited,
            Some(limit) => match limit.strategy {
                PacingStrategy::CallGranular => Pacer::CallGranular {
                    limit,
                    last_read_time: now,
                },
                PacingStrategy::TokenBucket { burst_bytes } => Pacer::TokenBucket(
                    TokenBucket::new(burst_bytes, limit.bytes_per_second, now),
                ),
            },
        }
    }

    /// Returns the delay required before a read of `bytes` may complete.
    pub(crate) fn delay_for(&mut self, bytes: u64, now: Instant) -> Duration {
        match self {
            Pacer::Unlimited => Duration::ZERO,
            Pacer::CallGranular {
                limit,
                last_read_time,
            } => {
                let expected = limit.expected_duration(bytes);
                let elapsed = now.saturating_duration_since(*last_read_time);
                expected.saturating_sub(elapsed)
            }
            Pacer::TokenBucket(bucket) => bucket.reserve(bytes, now),
        }
    }

    /// Records that a read completed at `now`.
    pub(crate) fn record_read(&mut self, now: Instant) {
        if let Pacer::CallGranular { last_read_time, .. } = self {
            *last_read_time = now;
        }
    }
}

/// Token bucket measured in bytes.
///
/// Starts full. A reservation that exceeds the available tokens drains the
/// bucket and reports the wait needed to accrue the deficit; tokens accrued
/// during that wait belong to the reservation.
#[derive(Debug, Clone)]
pub(crate) struct TokenBucket {
    capacity: u64,
    tokens: f64,
    refill_rate: u64,
    last_refill: Instant,
}

impl TokenBucket {
    pub(crate) fn new(capacity: u64, refill_rate: u64, now: Instant) -> Self {
        Self {
            capacity,
            tokens: capacity as f64,
            refill_rate,
            last_refill: now,
        }
    }

    /// Takes `bytes` tokens and returns how long the caller must wait.
    pub(crate) fn reserve(&mut self, bytes: u64, now: Instant) -> Duration {
        self.refill(now);

        let requested = bytes as f64;
        if self.tokens >= requested {
            self.tokens -= requested;
            return Duration::ZERO;
        }

        let deficit = requested - self.tokens;
        let wait = secs_to_duration(deficit / self.refill_rate as f64);
        self.tokens = 0.0;
        // Refill resumes once the waiting reader has been paid
        if let Some(resume) = now.max(self.last_refill).checked_add(wait) {
            self.last_refill = resume;
        }
        wait
    }

    #[cfg(test)]
    pub(crate) fn available_tokens(&mut self, now: Instant) -> u64 {
        self.refill(now);
        self.tokens as u64
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        if elapsed.is_zero() {
            return;
        }
        let tokens_to_add = elapsed.as_secs_f64() * self.refill_rate as f64;
        self.tokens = (self.tokens + tokens_to_add).min(self.capacity as f64);
        self.last_refill = now;
    }
}

/// Converts seconds to a duration, saturating at `Duration::MAX`.
fn secs_to_duration(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}
