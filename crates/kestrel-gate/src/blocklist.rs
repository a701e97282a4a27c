use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Failed-attempt tally for one IP within a sliding window.
#[derive(Debug)]
struct AttemptWindow {
    count: u32,
    first: Instant,
}

/// IP blocklist with failed-attempt escalation.
///
/// Independent of the token-bucket mechanism: repeated authentication or
/// signature failures should escalate faster than ordinary traffic shaping.
/// Entries expire lazily on the next check — there is no background sweep.
///
/// # Examples
///
/// ```
/// use kestrel_gate::IpBlocklist;
/// use std::time::Duration;
///
/// let blocklist = IpBlocklist::new(Duration::from_secs(300));
/// blocklist.block_ip("203.0.113.7", Duration::from_secs(60));
/// assert!(blocklist.is_blocked("203.0.113.7"));
/// assert!(!blocklist.is_blocked("203.0.113.8"));
/// ```
pub struct IpBlocklist {
    /// ip -> expiry instant
    blocked: Mutex<HashMap<String, Instant>>,
    /// ip -> failed-attempt window
    attempts: Mutex<HashMap<String, AttemptWindow>>,
    /// Block duration applied by automatic escalation.
    auto_block_duration: Duration,
}

impl IpBlocklist {
    /// Create a blocklist whose automatic escalation blocks for
    /// `auto_block_duration`.
    pub fn new(auto_block_duration: Duration) -> Self {
        Self {
            blocked: Mutex::new(HashMap::new()),
            attempts: Mutex::new(HashMap::new()),
            auto_block_duration,
        }
    }

    /// Explicitly block `ip` for `duration`, replacing any earlier expiry.
    pub fn block_ip(&self, ip: &str, duration: Duration) {
        self.block_ip_at(ip, duration, Instant::now());
    }

    fn block_ip_at(&self, ip: &str, duration: Duration, now: Instant) {
        tracing::warn!(ip, ?duration, "blocking ip");
        self.blocked
            .lock()
            .expect("blocklist lock poisoned")
            .insert(ip.to_string(), now + duration);
    }

    /// Whether `ip` is currently blocked. Expired entries are removed here.
    pub fn is_blocked(&self, ip: &str) -> bool {
        self.is_blocked_at(ip, Instant::now())
    }

    fn is_blocked_at(&self, ip: &str, now: Instant) -> bool {
        let mut blocked = self.blocked.lock().expect("blocklist lock poisoned");
        match blocked.get(ip) {
            Some(expiry) if *expiry > now => true,
            Some(_) => {
                blocked.remove(ip);
                false
            }
            None => false,
        }
    }

    /// Record one failed attempt for `ip`, auto-blocking once `threshold`
    /// attempts accumulate within `window`. Returns whether the IP is now
    /// blocked.
    ///
    /// The count resets when the window has elapsed since the first recorded
    /// attempt.
    pub fn record_failed_attempt(&self, ip: &str, threshold: u32, window: Duration) -> bool {
        self.record_failed_attempt_at(ip, threshold, window, Instant::now())
    }

    fn record_failed_attempt_at(
        &self,
        ip: &str,
        threshold: u32,
        window: Duration,
        now: Instant,
    ) -> bool {
        let count = {
            let mut attempts = self.attempts.lock().expect("attempts lock poisoned");
            let entry = attempts.entry(ip.to_string()).or_insert(AttemptWindow {
                count: 0,
                first: now,
            });
            if now.saturating_duration_since(entry.first) > window {
                entry.count = 0;
                entry.first = now;
            }
            entry.count += 1;
            entry.count
        };

        if count >= threshold {
            self.block_ip_at(ip, self.auto_block_duration, now);
            self.attempts
                .lock()
                .expect("attempts lock poisoned")
                .remove(ip);
            true
        } else {
            false
        }
    }
}
