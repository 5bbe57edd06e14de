//! Rate limiting primitives for auth flows.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RateLimitAction {
    Register,
    Login,
    VerifyEmail,
    Refresh,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited,
}

pub trait RateLimiter: Send + Sync {
    fn check_ip(&self, ip: Option<&str>, action: RateLimitAction) -> RateLimitDecision;
    fn check_email(&self, email: &str, action: RateLimitAction) -> RateLimitDecision;
}

#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check_ip(&self, _ip: Option<&str>, _action: RateLimitAction) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }

    fn check_email(&self, _email: &str, _action: RateLimitAction) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }
}

const WINDOW: Duration = Duration::from_secs(60);

const fn limit_for(action: RateLimitAction) -> u32 {
    match action {
        RateLimitAction::Register => 10,
        RateLimitAction::Login => 10,
        RateLimitAction::VerifyEmail => 30,
        RateLimitAction::Refresh => 60,
    }
}

struct WindowEntry {
    started_at: Instant,
    count: u32,
}

/// Fixed-window in-memory limiter keyed by (subject, action).
///
/// Windows for stale subjects are pruned on each check, so memory stays
/// bounded by the set of currently-active callers.
pub struct InMemoryRateLimiter {
    windows: Mutex<HashMap<(String, RateLimitAction), WindowEntry>>,
}

impl InMemoryRateLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
        }
    }

    fn check(&self, subject: &str, action: RateLimitAction) -> RateLimitDecision {
        let Ok(mut windows) = self.windows.lock() else {
            // A poisoned lock must not turn the limiter into a denial of service.
            return RateLimitDecision::Allowed;
        };
        let now = Instant::now();
        windows.retain(|_, entry| now.duration_since(entry.started_at) < WINDOW);

        let entry = windows
            .entry((subject.to_string(), action))
            .or_insert(WindowEntry {
                started_at: now,
                count: 0,
            });
        entry.count += 1;

        if entry.count > limit_for(action) {
            RateLimitDecision::Limited
        } else {
            RateLimitDecision::Allowed
        }
    }
}

impl Default for InMemoryRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter for InMemoryRateLimiter {
    fn check_ip(&self, ip: Option<&str>, action: RateLimitAction) -> RateLimitDecision {
        // Requests without a resolvable client IP are not limited by IP.
        ip.map_or(RateLimitDecision::Allowed, |ip| {
            self.check(&format!("ip:{ip}"), action)
        })
    }

    fn check_email(&self, email: &str, action: RateLimitAction) -> RateLimitDecision {
        self.check(&format!("email:{email}"), action)
    }
}
