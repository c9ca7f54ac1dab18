//! Per-client rate limiting and temporary blocking.
//!
//! # State Machine (per client id)
//! ```text
//! Unrestricted → Counting: first request in a window
//! Counting → Blocked: count > max_req_per_min, or hack attempts >= max_hack_attempts
//! Blocked → Unrestricted: now >= block expiry (counters reset)
//! ```
//!
//! # Design Decisions
//! - Thresholds are read on every check, never cached
//! - Hack attempts are counted in the same 60 s window as requests
//! - `-1` disables a threshold; a disabled block timeout disables the firewall
//! - Per-client state lives in sharded maps, no global lock on the hot path

use ahash::RandomState;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI32, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::FirewallConfig;

/// Length of the request counting window.
pub const WINDOW: Duration = Duration::from_secs(60);

/// Threshold value meaning "check disabled".
pub const DISABLED: i64 = -1;

/// Live firewall thresholds shared between the App, the firewall and config reloads.
#[derive(Debug)]
pub struct FirewallSettings {
    max_req_per_min: AtomicI64,
    block_timeout_secs: AtomicI64,
    max_hack_attempts: AtomicI32,
}

impl Default for FirewallSettings {
    fn default() -> Self {
        Self::from_config(&FirewallConfig::default())
    }
}

impl FirewallSettings {
    pub fn from_config(config: &FirewallConfig) -> Self {
        Self {
            max_req_per_min: AtomicI64::new(config.max_requests_per_minute),
            block_timeout_secs: AtomicI64::new(config.block_timeout_secs),
            max_hack_attempts: AtomicI32::new(config.max_hack_attempts),
        }
    }

    /// Store every threshold from a freshly loaded config.
    pub fn apply(&self, config: &FirewallConfig) {
        self.set_max_req_per_min(config.max_requests_per_minute);
        self.set_block_timeout_secs(config.block_timeout_secs);
        self.set_max_hack_attempts(config.max_hack_attempts);
    }

    pub fn max_req_per_min(&self) -> i64 {
        self.max_req_per_min.load(Ordering::Relaxed)
    }

    pub fn set_max_req_per_min(&self, value: i64) {
        self.max_req_per_min.store(value, Ordering::Relaxed);
    }

    pub fn block_timeout_secs(&self) -> i64 {
        self.block_timeout_secs.load(Ordering::Relaxed)
    }

    pub fn set_block_timeout_secs(&self, value: i64) {
        self.block_timeout_secs.store(value, Ordering::Relaxed);
    }

    pub fn max_hack_attempts(&self) -> i32 {
        self.max_hack_attempts.load(Ordering::Relaxed)
    }

    pub fn set_max_hack_attempts(&self, value: i32) {
        self.max_hack_attempts.store(value, Ordering::Relaxed);
    }

    /// Block duration, or `None` when blocking is disabled.
    fn block_timeout(&self) -> Option<Duration> {
        u64::try_from(self.block_timeout_secs())
            .ok()
            .map(Duration::from_secs)
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    Blocked { retry_after: Duration },
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allowed)
    }
}

/// Requests seen from one client in the current window.
#[derive(Debug, Clone, Copy)]
struct WindowCounter {
    started: Instant,
    count: i64,
}

/// Rate-limiting and blocking state, shared across all requests.
#[derive(Debug)]
pub struct Firewall {
    settings: Arc<FirewallSettings>,
    block_list: DashMap<String, Instant, RandomState>,
    request_counter: DashMap<String, WindowCounter, RandomState>,
    hack_attempts: DashMap<String, WindowCounter, RandomState>,
}

impl Firewall {
    /// Create a firewall reading thresholds from `settings`.
    ///
    /// `seed` keys the hashers of the per-client maps.
    pub fn new(settings: Arc<FirewallSettings>, seed: u64) -> Self {
        let hasher = RandomState::with_seeds(seed, seed.rotate_left(17), seed ^ 0x9e37_79b9, !seed);
        Self {
            settings,
            block_list: DashMap::with_hasher(hasher.clone()),
            request_counter: DashMap::with_hasher(hasher.clone()),
            hack_attempts: DashMap::with_hasher(hasher),
        }
    }

    pub fn settings(&self) -> &Arc<FirewallSettings> {
        &self.settings
    }

    /// Admit or reject one request from `client`.
    pub fn check(&self, client: &str) -> Verdict {
        self.check_at(client, Instant::now())
    }

    /// Admission check against an explicit clock reading.
    pub fn check_at(&self, client: &str, now: Instant) -> Verdict {
        let Some(timeout) = self.settings.block_timeout() else {
            return Verdict::Allowed;
        };

        if let Some(verdict) = self.blocked_verdict(client, now) {
            return verdict;
        }

        let max = self.settings.max_req_per_min();
        if max < 0 {
            return Verdict::Allowed;
        }

        let count = {
            let mut counter = self
                .request_counter
                .entry(client.to_string())
                .or_insert(WindowCounter { started: now, count: 0 });
            if now.saturating_duration_since(counter.started) >= WINDOW {
                *counter = WindowCounter { started: now, count: 0 };
            }
            counter.count += 1;
            counter.count
        };

        if count > max {
            tracing::warn!(client = %client, count, limit = max, "Request rate exceeded, blocking client");
            self.block(client, now, timeout);
            return Verdict::Blocked { retry_after: timeout };
        }

        Verdict::Allowed
    }

    /// Count an abuse signal from `client`. Returns true if the client is now blocked.
    pub fn record_hack_attempt(&self, client: &str) -> bool {
        self.record_hack_attempt_at(client, Instant::now())
    }

    pub fn record_hack_attempt_at(&self, client: &str, now: Instant) -> bool {
        let max = self.settings.max_hack_attempts();
        let Some(timeout) = self.settings.block_timeout() else {
            return false;
        };
        if max < 0 {
            return false;
        }

        let attempts = {
            let mut attempts = self
                .hack_attempts
                .entry(client.to_string())
                .or_insert(WindowCounter { started: now, count: 0 });
            if now.saturating_duration_since(attempts.started) >= WINDOW {
                *attempts = WindowCounter { started: now, count: 0 };
            }
            attempts.count += 1;
            attempts.count
        };

        if attempts >= i64::from(max) {
            tracing::warn!(client = %client, attempts, limit = max, "Hack attempt limit reached, blocking client");
            self.block(client, now, timeout);
            return true;
        }
        false
    }

    /// True while `client` has an unexpired block.
    pub fn is_blocked(&self, client: &str) -> bool {
        self.block_list
            .get(client)
            .is_some_and(|until| Instant::now() < *until)
    }

    /// Drop expired blocks and stale request and abuse windows.
    pub fn prune(&self, now: Instant) {
        self.block_list.retain(|_, until| now < *until);
        self.request_counter
            .retain(|_, counter| now.saturating_duration_since(counter.started) < WINDOW);
        self.hack_attempts
            .retain(|_, attempts| now.saturating_duration_since(attempts.started) < WINDOW);
    }

    /// Number of clients currently tracked in any map.
    pub fn tracked_clients(&self) -> usize {
        self.block_list.len() + self.request_counter.len() + self.hack_attempts.len()
    }

    fn blocked_verdict(&self, client: &str, now: Instant) -> Option<Verdict> {
        let until = *self.block_list.get(client)?;
        if now < until {
            return Some(Verdict::Blocked {
                retry_after: until.saturating_duration_since(now),
            });
        }

        // Block expired: back to unrestricted.
        self.block_list.remove_if(client, |_, until| now >= *until);
        self.request_counter.remove(client);
        self.hack_attempts.remove(client);
        None
    }

    fn block(&self, client: &str, now: Instant, timeout: Duration) {
        self.block_list.insert(client.to_string(), now + timeout);
        self.request_counter.remove(client);
        self.hack_attempts.remove(client);
    }
}
