//! Bounded exponential backoff shared by the collection API transport and the
//! LLM client.
//!
//! ```text
//! delay(attempt) = min(base * 2^attempt, cap) + jitter(0..=jitter_step * attempt)
//! ```
//!
//! `attempt` is zero-based: the first retry waits roughly `base`. The jitter
//! grows linearly with the attempt index so concurrent runs drift apart while
//! the worst-case wait stays bounded.

use rand::{Rng, rng};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base: Duration,
    pub cap: Duration,
    pub jitter_step: Duration,
}

impl Backoff {
    /// Policy for the collection API: 4 attempts, 0.6s doubling, capped at 6s.
    pub fn collection_api() -> Self {
        Self {
            max_attempts: 4,
            base: Duration::from_millis(600),
            cap: Duration::from_secs(6),
            jitter_step: Duration::from_millis(50),
        }
    }

    /// Policy for the LLM backend: 3 attempts on the same curve.
    pub fn llm() -> Self {
        Self {
            max_attempts: 3,
            ..Self::collection_api()
        }
    }

    /// Exponential part of the delay, without jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.cap)
    }

    /// Largest delay [`Backoff::delay`] can return for `attempt`.
    pub fn max_delay(&self, attempt: u32) -> Duration {
        self.base_delay(attempt) + self.jitter_step.saturating_mul(attempt)
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        let jitter_ceiling = self.jitter_step.saturating_mul(attempt).as_millis() as u64;
        let jitter_ms = if jitter_ceiling == 0 {
            0
        } else {
            rng().random_range(0..=jitter_ceiling)
        };
        self.base_delay(attempt) + Duration::from_millis(jitter_ms)
    }

    /// Upper bound on the total time spent sleeping before giving up.
    pub fn worst_case_wait(&self) -> Duration {
        (0..self.max_attempts.saturating_sub(1))
            .map(|attempt| self.max_delay(attempt))
            .sum()
    }
}
