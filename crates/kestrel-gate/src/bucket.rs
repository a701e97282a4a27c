use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};

/// Token-bucket parameters shared by every key.
///
/// # Examples
///
/// ```
/// use kestrel_gate::LimiterSettings;
///
/// let settings = LimiterSettings::default();
/// assert_eq!(settings.max_tokens, 60.0);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct LimiterSettings {
    /// Bucket capacity.
    pub max_tokens: f64,
    /// Continuous refill rate in tokens per second.
    pub refill_rate: f64,
    /// Cost subtracted per admitted request.
    pub tokens_per_request: f64,
}

impl Default for LimiterSettings {
    fn default() -> Self {
        Self {
            max_tokens: 60.0,
            refill_rate: 1.0,
            tokens_per_request: 1.0,
        }
    }
}

/// The limiter's verdict for one observation.
#[derive(Debug, Clone, Copy)]
pub struct Decision {
    /// Whether the request may proceed.
    pub allowed: bool,
    /// Bucket capacity, for the `X-RateLimit-Limit` header.
    pub limit: f64,
    /// Tokens left after this observation.
    pub remaining: f64,
    /// Time until the bucket refills to capacity.
    pub reset_after: Duration,
}

/// One bucket per limiter key: a clamped token count and the last refill
/// instant. Created lazily on first observation, never destroyed (bounded by
/// key cardinality in practice).
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(max_tokens: f64, now: Instant) -> Self {
        Self {
            tokens: max_tokens,
            last_refill: now,
        }
    }

    /// Refill proportionally to elapsed wall-clock time, then subtract the
    /// request cost if sufficient tokens exist.
    fn observe(&mut self, settings: &LimiterSettings, now: Instant) -> Decision {
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.tokens = (self.tokens + elapsed.as_secs_f64() * settings.refill_rate)
            .clamp(0.0, settings.max_tokens);
        self.last_refill = now;

        let allowed = self.tokens >= settings.tokens_per_request;
        if allowed {
            self.tokens -= settings.tokens_per_request;
        }

        let deficit = settings.max_tokens - self.tokens;
        let reset_after = if settings.refill_rate > 0.0 {
            Duration::from_secs_f64(deficit / settings.refill_rate)
        } else {
            Duration::MAX
        };

        Decision {
            allowed,
            limit: settings.max_tokens,
            remaining: self.tokens,
            reset_after,
        }
    }
}

/// Per-key token-bucket admission control.
///
/// Bucket updates are strictly serialized per key (one lock per bucket) but
/// unordered across keys; contention on one key never blocks another.
///
/// # Examples
///
/// ```
/// use kestrel_gate::{LimiterSettings, RateLimiter};
///
/// let limiter = RateLimiter::new(LimiterSettings {
///     max_tokens: 2.0,
///     refill_rate: 1.0,
///     tokens_per_request: 1.0,
/// });
/// assert!(limiter.check("10.0.0.1:/review").allowed);
/// assert!(limiter.check("10.0.0.1:/review").allowed);
/// assert!(!limiter.check("10.0.0.1:/review").allowed);
/// ```
pub struct RateLimiter {
    settings: LimiterSettings,
    buckets: RwLock<HashMap<String, Mutex<TokenBucket>>>,
}

impl RateLimiter {
    /// Create a limiter with the given settings.
    pub fn new(settings: LimiterSettings) -> Self {
        Self {
            settings,
            buckets: RwLock::new(HashMap::new()),
        }
    }

    /// Observe one request for `key` and decide admission. Fail closed: when
    /// the key's budget is exhausted the request is always rejected.
    pub fn check(&self, key: &str) -> Decision {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Decision {
        {
            let buckets = self.buckets.read().expect("bucket map lock poisoned");
            if let Some(bucket) = buckets.get(key) {
                return bucket
                    .lock()
                    .expect("bucket lock poisoned")
                    .observe(&self.settings, now);
            }
        }

        let mut buckets = self.buckets.write().expect("bucket map lock poisoned");
        let decision = buckets
            .entry(key.to_string())
            .or_insert_with(|| Mutex::new(TokenBucket::new(self.settings.max_tokens, now)))
            .lock()
            .expect("bucket lock poisoned")
            .observe(&self.settings, now);
        decision
    }

    /// Number of keys with a live bucket.
    pub fn tracked_keys(&self) -> usize {
        self.buckets.read().expect("bucket map lock poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(max: f64, rate: f64) -> LimiterSettings {
        LimiterSettings {
            max_tokens: max,
            refill_rate: rate,
            tokens_per_request: 1.0,
        }
    }

    #[test]
    fn admits_up_to_capacity_then_rejects() {
        let limiter = RateLimiter::new(settings(2.0, 1.0));
        let now = Instant::now();
        assert!(limiter.check_at("k", now).allowed);
        assert!(limiter.check_at("k", now).allowed);
        let third = limiter.check_at("k", now);
        assert!(!third.allowed);
        assert_eq!(third.remaining, 0.0);
    }

    #[test]
    fn refill_restores_admission() {
        let limiter = RateLimiter::new(settings(2.0, 1.0));
        let now = Instant::now();
        limiter.check_at("k", now);
        limiter.check_at("k", now);
        assert!(!limiter.check_at("k", now).allowed);

        // 1.5s at 1 token/s restores enough for one request
        let later = now + Duration::from_millis(1500);
        assert!(limiter.check_at("k", later).allowed);
        assert!(!limiter.check_at("k", later).allowed);
    }

    #[test]
    fn refill_is_capped_at_max_tokens() {
        let limiter = RateLimiter::new(settings(2.0, 10.0));
        let now = Instant::now();
        limiter.check_at("k", now);

        let much_later = now + Duration::from_secs(3600);
        let decision = limiter.check_at("k", much_later);
        assert!(decision.allowed);
        // capped at 2.0, then one consumed
        assert_eq!(decision.remaining, 1.0);
    }

    #[test]
    fn keys_are_independent() {
        let limiter = RateLimiter::new(settings(1.0, 0.0));
        let now = Instant::now();
        assert!(limiter.check_at("a", now).allowed);
        assert!(limiter.check_at("b", now).allowed);
        assert!(!limiter.check_at("a", now).allowed);
        assert_eq!(limiter.tracked_keys(), 2);
    }

    #[test]
    fn rejection_does_not_consume() {
        let limiter = RateLimiter::new(settings(1.0, 1.0));
        let now = Instant::now();
        limiter.check_at("k", now);
        // repeated rejections at the same instant leave the bucket at zero,
        // not negative, so a later refill is not penalized
        limiter.check_at("k", now);
        limiter.check_at("k", now);
        let later = now + Duration::from_millis(1100);
        assert!(limiter.check_at("k", later).allowed);
    }

    #[test]
    fn reset_reflects_state_after_consumption() {
        let limiter = RateLimiter::new(settings(2.0, 1.0));
        let now = Instant::now();
        let decision = limiter.check_at("k", now);
        // one token consumed, one second to refill it
        assert!((decision.reset_after.as_secs_f64() - 1.0).abs() < 1e-6);
    }
}
