//! Per-key rate-limit accounting
//!
//! `RateBucket` approximates a provider's sliding-minute quota with a fixed
//! window: counters reset to full the first time an operation notices the
//! window has aged past 60 seconds. This accepts burst at window boundaries
//! in exchange for a trivial, lock-only implementation.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const WINDOW: Duration = Duration::from_secs(60);
/// Below this many tokens remaining, a bucket is considered unavailable even
/// if technically non-zero, leaving headroom for estimation error.
const AVAILABILITY_TOKEN_FLOOR: u32 = 100;

struct BucketState {
    requests_remaining: u32,
    tokens_remaining: u32,
    window_start: Instant,
    window_start_wall: DateTime<Utc>,
}

/// A point-in-time copy of a bucket's counters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BucketStatus {
    pub name: String,
    pub requests_remaining: u32,
    pub tokens_remaining: u32,
    pub requests_per_minute: u32,
    pub tokens_per_minute: u32,
    pub reset_at: DateTime<Utc>,
    pub is_available: bool,
}

/// Fixed-window request+token counter for one (provider, key) pair.
pub struct RateBucket {
    name: String,
    rpm_limit: u32,
    tpm_limit: u32,
    state: Mutex<BucketState>,
}

impl RateBucket {
    pub fn new(name: impl Into<String>, rpm_limit: u32, tpm_limit: u32) -> Self {
        let now = Instant::now();
        Self {
            name: name.into(),
            rpm_limit,
            tpm_limit,
            state: Mutex::new(BucketState {
                requests_remaining: rpm_limit,
                tokens_remaining: tpm_limit,
                window_start: now,
                window_start_wall: Utc::now(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn reset_if_stale(state: &mut BucketState, rpm_limit: u32, tpm_limit: u32) {
        if state.window_start.elapsed() >= WINDOW {
            state.requests_remaining = rpm_limit;
            state.tokens_remaining = tpm_limit;
            state.window_start = Instant::now();
            state.window_start_wall = Utc::now();
        }
    }

    /// Whether a request estimated at `est` tokens could be acquired right now.
    /// Performs a possible window reset but no other mutation.
    pub fn can_acquire(&self, est: u32) -> bool {
        let mut state = self.state.lock().unwrap();
        Self::reset_if_stale(&mut state, self.rpm_limit, self.tpm_limit);
        state.requests_remaining >= 1 && state.tokens_remaining >= est
    }

    /// Atomically reserve one request slot and `est` tokens. Returns `false`
    /// (with no mutation) if either counter lacks headroom.
    pub fn acquire(&self, est: u32) -> bool {
        let mut state = self.state.lock().unwrap();
        Self::reset_if_stale(&mut state, self.rpm_limit, self.tpm_limit);

        if state.requests_remaining < 1 || state.tokens_remaining < est {
            return false;
        }

        state.requests_remaining -= 1;
        state.tokens_remaining -= est;
        true
    }

    /// Refund the over-estimated portion of a reservation once the actual
    /// usage is known. No-op if `actual >= est`.
    pub fn release_tokens(&self, actual: u32, est: u32) {
        if actual >= est {
            return;
        }
        let refund = est - actual;
        let mut state = self.state.lock().unwrap();
        state.tokens_remaining = (state.tokens_remaining + refund).min(self.tpm_limit);
    }

    /// Debit additional tokens post-hoc (e.g. the upstream's reported total),
    /// clamped at zero.
    pub fn consume_tokens(&self, delta: u32) {
        let mut state = self.state.lock().unwrap();
        state.tokens_remaining = state.tokens_remaining.saturating_sub(delta);
    }

    /// Snapshot of the current counters.
    pub fn status(&self) -> BucketStatus {
        let mut state = self.state.lock().unwrap();
        Self::reset_if_stale(&mut state, self.rpm_limit, self.tpm_limit);
        BucketStatus {
            name: self.name.clone(),
            requests_remaining: state.requests_remaining,
            tokens_remaining: state.tokens_remaining,
            requests_per_minute: self.rpm_limit,
            tokens_per_minute: self.tpm_limit,
            reset_at: state.window_start_wall + chrono::Duration::seconds(60),
            is_available: state.requests_remaining > 0
                && state.tokens_remaining > AVAILABILITY_TOKEN_FLOOR,
        }
    }
}
