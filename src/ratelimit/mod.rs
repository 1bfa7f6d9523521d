//! Rate Limiter (spec §4.4, component C4).
//!
//! Five independent dimensions, checked twice per request: once
//! pre-admission (a "+1 request" probe, tokens checked at their current
//! value only) and once post-charge (this request's tokens folded into
//! the minute window and the lifetime counter, plus the usage row written
//! by the usage tracker). The limiter itself never writes to the store —
//! day and lifetime dimensions are always read live from usage rows that
//! the usage tracker (C7) is the sole writer of.

mod window;

pub use window::WindowCounters;

use std::time::Instant;

use crate::store::{RateLimits, Store, StoreError};

const DAY_SECS: i64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    RequestsPerMinute,
    RequestsPerDay,
    TokensPerMinute,
    TokensPerDay,
    LifetimeTokens,
}

impl Dimension {
    fn label(self) -> &'static str {
        match self {
            Dimension::RequestsPerMinute => "requests per minute",
            Dimension::RequestsPerDay => "requests per day",
            Dimension::TokensPerMinute => "tokens per minute",
            Dimension::TokensPerDay => "tokens per day",
            Dimension::LifetimeTokens => "lifetime tokens",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("rate limit exceeded: {dimension}")]
pub struct RateLimitRejection {
    dimension: Dimension,
    limit: i64,
}

impl RateLimitRejection {
    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    pub fn message(&self) -> String {
        format!(
            "rate limit exceeded: {} (limit {})",
            self.dimension.label(),
            self.limit
        )
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

pub struct RateLimiter {
    store: Store,
    counters: WindowCounters,
}

impl RateLimiter {
    pub fn new(store: Store) -> Self {
        Self {
            store,
            counters: WindowCounters::new(),
        }
    }

    fn effective_limits(&self, user_id: &str) -> Result<RateLimits, StoreError> {
        Ok(self.store.get_rate_limits(user_id)?.unwrap_or_else(RateLimits::defaults))
    }

    /// The pre-admission check (spec §4.4): evaluates all five dimensions
    /// as if this request were already counted, without mutating any
    /// state. Only on success does it commit the request sample into the
    /// minute window.
    pub fn pre_admit(&self, user_id: &str, now_unix: i64) -> Result<(), RateLimitError> {
        let limits = self.effective_limits(user_id)?;
        let now = Instant::now();

        if let Some(limit) = limits.requests_per_minute {
            let current = self.counters.requests_last_minute(user_id, now) as i64;
            if current + 1 > limit {
                return Err(RateLimitRejection {
                    dimension: Dimension::RequestsPerMinute,
                    limit,
                }
                .into());
            }
        }
        if let Some(limit) = limits.requests_per_day {
            let since = now_unix - DAY_SECS;
            let current = self.store.count_requests_since(user_id, since)?;
            if current + 1 > limit {
                return Err(RateLimitRejection {
                    dimension: Dimension::RequestsPerDay,
                    limit,
                }
                .into());
            }
        }
        if let Some(limit) = limits.tokens_per_minute {
            let current = self.counters.tokens_last_minute(user_id, now);
            if current > limit {
                return Err(RateLimitRejection {
                    dimension: Dimension::TokensPerMinute,
                    limit,
                }
                .into());
            }
        }
        if let Some(limit) = limits.tokens_per_day {
            let since = now_unix - DAY_SECS;
            let current = self.store.sum_tokens_since(user_id, since)?;
            if current > limit {
                return Err(RateLimitRejection {
                    dimension: Dimension::TokensPerDay,
                    limit,
                }
                .into());
            }
        }
        if let Some(limit) = limits.lifetime_token_cap {
            let current = self.store.sum_tokens_lifetime(user_id)?;
            if current > limit {
                return Err(RateLimitRejection {
                    dimension: Dimension::LifetimeTokens,
                    limit,
                }
                .into());
            }
        }

        self.counters.record_request(user_id, now);
        Ok(())
    }

    /// The post-charge step (spec §4.4): folds this request's tokens into
    /// the minute window. Day/lifetime dimensions need no update here —
    /// they are computed live from usage rows the usage tracker writes.
    pub fn record_post_charge(&self, user_id: &str, total_tokens: i64) {
        self.counters.record_tokens(user_id, total_tokens, Instant::now());
    }

    /// Background maintenance hook; intended to run on a low-frequency
    /// timer (spec §4.3).
    pub fn prune_idle(&self) {
        self.counters.prune_idle();
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error(transparent)]
    Rejected(#[from] RateLimitRejection),
    #[error(transparent)]
    Store(#[from] StoreError),
}
