//! Failed-login throttling.
//!
//! Keys are `(app_id, email)` pairs. Every attempt is counted as a failure when it
//! starts, under the same lock as the limit check, and only a successful login
//! clears the key. Concurrent attempts therefore cannot all slip past the check
//! before the first failure lands. After `max_attempts` counted attempts a key is
//! locked until `cooldown` has passed since its last attempt. State is per
//! process; several replicas each keep their own counters.
//!
//! At most `capacity` keys are tracked. When a new key arrives at capacity,
//! expired keys are swept and, if that is not enough, the least recently
//! attempted keys are evicted until a tenth of the capacity is free.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

pub const DEFAULT_CAPACITY: usize = 10_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThrottleDecision {
    Allowed,
    Limited,
}

pub trait LoginThrottle: Send + Sync {
    /// Count an attempt for `key`, or refuse it if the key is locked.
    fn try_acquire(&self, key: &str) -> ThrottleDecision;
    /// Clear `key` after a successful login.
    fn record_success(&self, key: &str);
}

#[must_use]
pub fn throttle_key(email: &str, app_id: i64) -> String {
    format!("{app_id}:{email}")
}

#[derive(Clone, Debug)]
pub struct NoopThrottle;

impl LoginThrottle for NoopThrottle {
    fn try_acquire(&self, _key: &str) -> ThrottleDecision {
        ThrottleDecision::Allowed
    }

    fn record_success(&self, _key: &str) {}
}

#[derive(Debug, Clone, Copy)]
struct Attempts {
    count: u32,
    last_attempt: Instant,
}

#[derive(Debug)]
pub struct AttemptThrottle {
    max_attempts: u32,
    cooldown: Duration,
    capacity: usize,
    attempts: Mutex<HashMap<String, Attempts>>,
}

impl AttemptThrottle {
    #[must_use]
    pub fn new(max_attempts: u32, cooldown: Duration) -> Self {
        Self::with_capacity(max_attempts, cooldown, DEFAULT_CAPACITY)
    }

    #[must_use]
    pub fn with_capacity(max_attempts: u32, cooldown: Duration, capacity: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            cooldown,
            capacity: capacity.max(1),
            attempts: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Attempts>> {
        self.attempts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make room for new keys: drop expired keys, then the least recently
    /// attempted ones until a tenth of the capacity is free.
    fn make_room(&self, attempts: &mut HashMap<String, Attempts>) {
        let cooldown = self.cooldown;
        attempts.retain(|_, entry| entry.last_attempt.elapsed() < cooldown);

        let target = self.capacity - (self.capacity / 10).max(1);
        if attempts.len() <= target {
            return;
        }

        let mut oldest: Vec<(Instant, String)> = attempts
            .iter()
            .map(|(key, entry)| (entry.last_attempt, key.clone()))
            .collect();
        oldest.sort_unstable_by_key(|(last_attempt, _)| *last_attempt);
        let excess = attempts.len() - target;
        for (_, key) in oldest.into_iter().take(excess) {
            attempts.remove(&key);
        }
    }
}

impl LoginThrottle for AttemptThrottle {
    fn try_acquire(&self, key: &str) -> ThrottleDecision {
        let mut attempts = self.lock();
        let now = Instant::now();

        if let Some(entry) = attempts.get_mut(key) {
            if entry.last_attempt.elapsed() >= self.cooldown {
                entry.count = 0;
            }
            if entry.count >= self.max_attempts {
                return ThrottleDecision::Limited;
            }
            entry.count = entry.count.saturating_add(1);
            entry.last_attempt = now;
            return ThrottleDecision::Allowed;
        }

        if attempts.len() >= self.capacity {
            self.make_room(&mut attempts);
        }
        attempts.insert(
            key.to_string(),
            Attempts {
                count: 1,
                last_attempt: now,
            },
        );
        ThrottleDecision::Allowed
    }

    fn record_success(&self, key: &str) {
        self.lock().remove(key);
    }
}
