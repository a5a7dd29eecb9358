//! Per-(client, route) token-bucket admission.
//!
//! Local to this process: two instances behind a balancer each grant the full
//! allowance. Buckets are created on first sight and forgotten once idle for
//! longer than the retention window, at which point the next request starts
//! from a full bucket again.

mod sweeper;

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::config::{DEFAULT_RATE_LIMIT_RETENTION, RateLimitConfig};

pub use sweeper::SweeperHandle;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    pub client: String,
    pub route: String,
}

impl BucketKey {
    pub fn new(client: impl Into<String>, route: impl Into<String>) -> Self {
        Self {
            client: client.into(),
            route: route.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Limited { retry_after: Duration },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    /// Whole seconds until the next token, never less than 1.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::Allowed => None,
            Self::Limited { retry_after } => {
                let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
                Some(secs.max(1))
            }
        }
    }
}

/// Shape shared by every bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketPolicy {
    /// Tokens a fresh bucket holds, and the most it can ever hold.
    pub capacity: u32,
    /// Time to earn one token back.
    pub refill_interval: Duration,
}

impl BucketPolicy {
    /// `limit` tokens per minute, evenly spaced, on top of a `limit + burst`
    /// ceiling.
    pub fn per_minute(limit: u32, burst: u32) -> Self {
        let limit = limit.max(1);
        Self {
            capacity: limit.saturating_add(burst),
            refill_interval: Duration::from_secs(60) / limit,
        }
    }
}

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: u32,
    refilled_at: Instant,
    last_seen: Instant,
}

impl TokenBucket {
    fn full(policy: &BucketPolicy, now: Instant) -> Self {
        Self {
            tokens: policy.capacity,
            refilled_at: now,
            last_seen: now,
        }
    }

    fn refill(&mut self, policy: &BucketPolicy, now: Instant) {
        if self.tokens >= policy.capacity {
            self.refilled_at = now;
            return;
        }

        let interval = policy.refill_interval.as_nanos().max(1);
        let elapsed = now.saturating_duration_since(self.refilled_at).as_nanos();
        let earned = elapsed / interval;
        if earned == 0 {
            return;
        }

        let room = u128::from(policy.capacity - self.tokens);
        if earned >= room {
            self.tokens = policy.capacity;
            self.refilled_at = now;
        } else {
            // `earned < room <= u32::MAX`, so both casts are lossless.
            self.tokens += earned as u32;
            self.refilled_at += policy.refill_interval * earned as u32;
        }
    }

    fn take(&mut self, policy: &BucketPolicy, now: Instant) -> Admission {
        self.refill(policy, now);
        self.last_seen = now;

        if self.tokens > 0 {
            self.tokens -= 1;
            Admission::Allowed
        } else {
            let since = now.saturating_duration_since(self.refilled_at);
            Admission::Limited {
                retry_after: policy.refill_interval.saturating_sub(since),
            }
        }
    }
}

/// The bucket map. One lock, held only for the in-memory update.
#[derive(Debug)]
pub struct RateLimiter {
    policy: BucketPolicy,
    retention: Duration,
    buckets: Mutex<HashMap<BucketKey, TokenBucket>>,
}

impl RateLimiter {
    /// A zero `retention` falls back to [`DEFAULT_RATE_LIMIT_RETENTION`]; it
    /// is also the sweep period and must not be zero.
    pub fn new(policy: BucketPolicy, retention: Duration) -> Self {
        let retention = if retention.is_zero() {
            DEFAULT_RATE_LIMIT_RETENTION
        } else {
            retention
        };
        Self {
            policy,
            retention,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(
            BucketPolicy::per_minute(config.limit_per_minute, config.burst),
            config.retention,
        )
    }

    pub fn policy(&self) -> BucketPolicy {
        self.policy
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    // A panic while holding the lock cannot leave a bucket half-written, so a
    // poisoned map is still usable.
    fn buckets(&self) -> MutexGuard<'_, HashMap<BucketKey, TokenBucket>> {
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn check(&self, key: &BucketKey) -> Admission {
        self.check_at(key, Instant::now())
    }

    /// Take one token for `key`, creating a full bucket on first sight.
    ///
    /// Every observed request counts as activity, admitted or not.
    pub fn check_at(&self, key: &BucketKey, now: Instant) -> Admission {
        let mut buckets = self.buckets();
        match buckets.get_mut(key) {
            Some(bucket) => bucket.take(&self.policy, now),
            None => {
                let mut bucket = TokenBucket::full(&self.policy, now);
                let admission = bucket.take(&self.policy, now);
                buckets.insert(key.clone(), bucket);
                admission
            }
        }
    }

    /// Drop every bucket idle for longer than the retention window.
    pub fn sweep(&self, now: Instant) -> usize {
        let retention = self.retention;
        let mut buckets = self.buckets();
        let before = buckets.len();
        buckets.retain(|_, b| now.saturating_duration_since(b.last_seen) <= retention);
        before - buckets.len()
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets().len()
    }
}
