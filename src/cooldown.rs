//! Per-user cooldown tracking.
//!
//! A single mutex guards the whole map: entries are small, operations are
//! O(1), and the check-and-update must be one logical operation so that two
//! concurrent messages from the same user cannot both land inside one
//! window. Stale entries are pruned opportunistically during `allow_at`
//! calls so the map does not grow without bound over the process lifetime.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Minimum interval between opportunistic stale sweeps.
const SWEEP_INTERVAL_SECS: u64 = 60;
/// Entries idle for this many windows are dropped during a sweep.
const STALE_AFTER_WINDOWS: u32 = 60;

/// Outcome of a cooldown check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownDecision {
    /// The message may proceed; the user's timestamp was advanced.
    Accepted,
    /// Too soon. The stored timestamp is left untouched.
    Throttled { retry_after_secs: u64 },
}

impl CooldownDecision {
    pub fn is_accepted(self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Maps each user to the instant of their last accepted message.
#[derive(Debug)]
pub struct CooldownTracker {
    window: Duration,
    state: Mutex<TrackerState>,
}

#[derive(Debug)]
struct TrackerState {
    last_accepted: HashMap<String, Instant>,
    last_sweep: Instant,
}

impl CooldownTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: Mutex::new(TrackerState {
                last_accepted: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    /// Check the user against the cooldown window at the current instant.
    pub fn allow(&self, user_id: &str) -> CooldownDecision {
        self.allow_at(user_id, Instant::now())
    }

    /// Check-and-update as one atomic step. On acceptance the user's
    /// timestamp becomes `now`; on rejection nothing is mutated and the
    /// caller gets the whole seconds remaining, rounded up.
    pub fn allow_at(&self, user_id: &str, now: Instant) -> CooldownDecision {
        if self.window.is_zero() {
            return CooldownDecision::Accepted;
        }

        let mut state = self.state.lock();

        if now.saturating_duration_since(state.last_sweep)
            >= Duration::from_secs(SWEEP_INTERVAL_SECS)
        {
            let stale_after = self.window * STALE_AFTER_WINDOWS;
            state
                .last_accepted
                .retain(|_, last| now.saturating_duration_since(*last) < stale_after);
            state.last_sweep = now;
        }

        if let Some(last) = state.last_accepted.get(user_id) {
            let elapsed = now.saturating_duration_since(*last);
            if elapsed < self.window {
                let remaining = self.window - elapsed;
                return CooldownDecision::Throttled {
                    retry_after_secs: remaining.as_secs_f64().ceil() as u64,
                };
            }
        }

        state.last_accepted.insert(user_id.to_string(), now);
        CooldownDecision::Accepted
    }

    /// Number of users currently tracked.
    pub fn tracked_users(&self) -> usize {
        self.state.lock().last_accepted.len()
    }
}
