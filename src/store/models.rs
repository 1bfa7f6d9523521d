//! Row types for the five persisted relations (spec §3).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: String,
    pub api_key: String,
    pub created_at: i64,
}

/// An immutable per-request row. Written exactly once; never updated.
#[derive(Debug, Clone, Serialize)]
pub struct UsageRecord {
    pub id: i64,
    pub user_id: String,
    pub model: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub total_tokens: i64,
    pub cost: f64,
    pub request_id: String,
    pub prompt_preview: String,
    pub timestamp: i64,
}

pub struct UsageInsert<'a> {
    pub user_id: &'a str,
    pub model: &'a str,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cost: f64,
    pub request_id: &'a str,
    pub prompt_preview: &'a str,
    pub timestamp: i64,
}

/// One row per user. All fields optional: `None` means unbounded on that
/// dimension. See `RateLimits::defaults` for the values applied when no
/// row exists at all.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RateLimits {
    pub requests_per_minute: Option<i64>,
    pub requests_per_day: Option<i64>,
    pub tokens_per_minute: Option<i64>,
    pub tokens_per_day: Option<i64>,
    pub lifetime_token_cap: Option<i64>,
}

impl RateLimits {
    /// Applied when no rate-limit row exists for a user yet (spec §3).
    pub fn defaults() -> Self {
        Self {
            requests_per_minute: Some(60),
            requests_per_day: Some(1_000),
            tokens_per_minute: Some(100_000),
            tokens_per_day: Some(1_000_000),
            lifetime_token_cap: None,
        }
    }

    pub fn unbounded() -> Self {
        Self {
            requests_per_minute: None,
            requests_per_day: None,
            tokens_per_minute: None,
            tokens_per_day: None,
            lifetime_token_cap: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PriceRow {
    pub input_cost_per_million: f64,
    pub output_cost_per_million: f64,
}

impl PriceRow {
    /// The sentinel for "no pricing configured" — cost then evaluates to zero.
    pub fn unset() -> Self {
        Self {
            input_cost_per_million: 0.0,
            output_cost_per_million: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PriceHistoryRow {
    pub id: i64,
    pub model: String,
    pub input_cost_per_million: f64,
    pub output_cost_per_million: f64,
    pub changed_at: i64,
    pub actor: String,
}
