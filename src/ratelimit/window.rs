//! Window Counters (spec §4.3, component C3).
//!
//! Per-user in-memory sliding windows over the last 60 seconds, one
//! sequence tagged "request" (every sample worth 1) and one tagged
//! "tokens" (sample value = tokens consumed by that completion). A single
//! mutex guards the whole map; per-user operations are a prune-then-push,
//! amortized O(1). These sequences are transient — lost on restart, and
//! safe to lose because they're derivable from the store (spec §3
//! Ownership, §4.3 Restart policy).

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

const WINDOW: Duration = Duration::from_secs(60);

#[derive(Default)]
struct UserSamples {
    requests: VecDeque<Instant>,
    tokens: VecDeque<(Instant, i64)>,
}

impl UserSamples {
    fn is_empty(&self) -> bool {
        self.requests.is_empty() && self.tokens.is_empty()
    }
}

pub struct WindowCounters {
    inner: Mutex<HashMap<String, UserSamples>>,
}

impl WindowCounters {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub fn record_request(&self, user_id: &str, now: Instant) {
        let mut guard = self.inner.lock();
        let samples = guard.entry(user_id.to_string()).or_default();
        prune_requests(&mut samples.requests, now);
        samples.requests.push_back(now);
    }

    pub fn record_tokens(&self, user_id: &str, tokens: i64, now: Instant) {
        let mut guard = self.inner.lock();
        let samples = guard.entry(user_id.to_string()).or_default();
        prune_tokens(&mut samples.tokens, now);
        samples.tokens.push_back((now, tokens));
    }

    /// Strictly-sliding count of request samples with `ts > now - 60s`.
    pub fn requests_last_minute(&self, user_id: &str, now: Instant) -> u64 {
        let mut guard = self.inner.lock();
        match guard.get_mut(user_id) {
            Some(samples) => {
                prune_requests(&mut samples.requests, now);
                samples.requests.len() as u64
            }
            None => 0,
        }
    }

    /// `SUM(value)` over token samples with `ts > now - 60s`.
    pub fn tokens_last_minute(&self, user_id: &str, now: Instant) -> i64 {
        let mut guard = self.inner.lock();
        match guard.get_mut(user_id) {
            Some(samples) => {
                prune_tokens(&mut samples.tokens, now);
                samples.tokens.iter().map(|(_, v)| v).sum()
            }
            None => 0,
        }
    }

    /// Low-frequency background pruner: walks idle users and drops empty
    /// sequences to bound memory (spec §4.3).
    pub fn prune_idle(&self) {
        let now = Instant::now();
        let mut guard = self.inner.lock();
        guard.retain(|_, samples| {
            prune_requests(&mut samples.requests, now);
            prune_tokens(&mut samples.tokens, now);
            !samples.is_empty()
        });
    }
}

fn prune_requests(requests: &mut VecDeque<Instant>, now: Instant) {
    while let Some(front) = requests.front() {
        if now.saturating_duration_since(*front) >= WINDOW {
            requests.pop_front();
        } else {
            break;
        }
    }
}

fn prune_tokens(tokens: &mut VecDeque<(Instant, i64)>, now: Instant) {
    while let Some((ts, _)) = tokens.front() {
        if now.saturating_duration_since(*ts) >= WINDOW {
            tokens.pop_front();
        } else {
            break;
        }
    }
}
