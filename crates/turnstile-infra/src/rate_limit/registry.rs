//! Per-key token bucket registry.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use governor::clock::{Clock, DefaultClock};

use turnstile_core::domain::{AdmissionPolicy, EvictionMode};
use turnstile_core::ports::{RateLimitResult, RateLimiter};

use super::bucket::Bucket;

/// Outcome of one eviction pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub evicted: usize,
    pub remaining: usize,
}

/// One token bucket per caller key, behind a single reader/writer lock.
///
/// Buckets are created lazily on first sight of a key and only removed by
/// [`BucketRegistry::sweep`]. Both the request path and the sweep take the
/// write lock, so a refill never races a removal.
///
/// Limits are per-process, not distributed across instances.
pub struct BucketRegistry<C: Clock = DefaultClock> {
    buckets: RwLock<HashMap<String, Bucket<C::Instant>>>,
    clock: C,
    max_tokens: f64,
    refill_rate: f64,
}

impl BucketRegistry<DefaultClock> {
    pub fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self::with_clock(max_tokens, refill_rate, DefaultClock::default())
    }

    pub fn from_policy(policy: &AdmissionPolicy) -> Self {
        Self::new(policy.max_tokens(), policy.refill_rate())
    }
}

impl<C: Clock> BucketRegistry<C> {
    pub fn with_clock(max_tokens: f64, refill_rate: f64, clock: C) -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
            clock,
            max_tokens,
            refill_rate,
        }
    }

    pub fn from_policy_with_clock(policy: &AdmissionPolicy, clock: C) -> Self {
        Self::with_clock(policy.max_tokens(), policy.refill_rate(), clock)
    }

    /// Refill the caller's bucket, then try to spend one token.
    ///
    /// A first-seen key starts with a full burst and pays for this request
    /// out of it.
    pub fn check(&self, key: &str) -> RateLimitResult {
        let now = self.clock.now();
        let mut buckets = self.write();

        let bucket = buckets
            .entry(key.to_owned())
            .and_modify(|bucket| bucket.refill(now))
            .or_insert_with(|| Bucket::full(self.max_tokens, self.refill_rate, now));

        if bucket.try_take() {
            RateLimitResult::allowed(bucket.remaining())
        } else {
            RateLimitResult::denied(bucket.time_to_next())
        }
    }

    /// Remove buckets idle for longer than `max_idle`.
    pub fn sweep(&self, max_idle: Duration, mode: EvictionMode) -> SweepStats {
        let now = self.clock.now();
        let mut buckets = self.write();
        let before = buckets.len();

        buckets.retain(|_, bucket| {
            if bucket.idle_for(now) <= max_idle {
                return true;
            }
            match mode {
                EvictionMode::Idle => false,
                EvictionMode::Replenished => bucket.projected(now) < bucket.max_tokens(),
            }
        });

        SweepStats {
            evicted: before - buckets.len(),
            remaining: buckets.len(),
        }
    }

    /// Current (unrefilled) token count for `key`.
    pub fn tokens(&self, key: &str) -> Option<f64> {
        self.read().get(key).map(Bucket::tokens)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // Every mutation under the lock is a plain field store, so a poisoned
    // map is still consistent.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Bucket<C::Instant>>> {
        self.buckets.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Bucket<C::Instant>>> {
        self.buckets.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C> RateLimiter for BucketRegistry<C>
where
    C: Clock + Send + Sync,
{
    fn check(&self, key: &str) -> RateLimitResult {
        BucketRegistry::check(self, key)
    }
}
