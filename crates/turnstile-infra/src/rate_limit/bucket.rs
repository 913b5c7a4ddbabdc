//! Token bucket arithmetic for a single caller.

use std::time::Duration;

use governor::clock::Reference;

/// Admission credits for one caller key.
///
/// `tokens` stays in `[0, max_tokens]`. Refill is continuous: every
/// observation adds `elapsed * refill_rate` fractional tokens.
#[derive(Debug, Clone)]
pub(crate) struct Bucket<I> {
    tokens: f64,
    max_tokens: f64,
    refill_rate: f64,
    last_seen: I,
}

impl<I: Reference> Bucket<I> {
    pub(crate) fn full(max_tokens: f64, refill_rate: f64, now: I) -> Self {
        Self {
            tokens: max_tokens,
            max_tokens,
            refill_rate,
            last_seen: now,
        }
    }

    /// Credit the time since the last observation.
    ///
    /// An observation dated before `last_seen` counts as zero elapsed and
    /// leaves `last_seen` where it was, so the same interval is never
    /// credited twice.
    pub(crate) fn refill(&mut self, now: I) {
        let elapsed = self.idle_for(now).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        if now > self.last_seen {
            self.last_seen = now;
        }
    }

    /// Spend one token. Exactly one remaining token is enough.
    pub(crate) fn try_take(&mut self) -> bool {
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    pub(crate) fn remaining(&self) -> u32 {
        self.tokens.floor() as u32
    }

    /// Time until a whole token is available again.
    pub(crate) fn time_to_next(&self) -> Duration {
        if self.tokens >= 1.0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64((1.0 - self.tokens) / self.refill_rate)
    }

    pub(crate) fn idle_for(&self, now: I) -> Duration {
        if now > self.last_seen {
            Duration::from(now.duration_since(self.last_seen))
        } else {
            Duration::ZERO
        }
    }

    /// Tokens the bucket would hold if observed at `now`.
    pub(crate) fn projected(&self, now: I) -> f64 {
        (self.tokens + self.idle_for(now).as_secs_f64() * self.refill_rate).min(self.max_tokens)
    }

    pub(crate) fn tokens(&self) -> f64 {
        self.tokens
    }

    pub(crate) fn max_tokens(&self) -> f64 {
        self.max_tokens
    }
}
