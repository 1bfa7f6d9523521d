//! Price Book (spec §4.2, component C2).
//!
//! A read-through lookup over the store's `price_book` / `price_history`
//! relations — there is no caching layer, the store is the cache. The one
//! piece of logic that belongs here rather than in `store::pricing` is the
//! cost formula itself and the "no pricing configured" sentinel.

use crate::store::{PriceHistoryRow, PriceRow, Store, StoreError};

#[derive(Clone)]
pub struct PriceBook {
    store: Store,
}

impl PriceBook {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Returns the current row, or the zero-cost sentinel if unconfigured.
    pub fn get(&self, model: &str) -> Result<PriceRow, StoreError> {
        Ok(self.store.get_price(model)?.unwrap_or_else(PriceRow::unset))
    }

    pub fn list(&self) -> Result<Vec<(String, PriceRow)>, StoreError> {
        self.store.list_prices()
    }

    /// Upserts the row and appends a history entry in one logical
    /// operation (spec §4.2: rolled back together on failure).
    pub fn set(&self, model: &str, row: PriceRow, actor: &str, changed_at: i64) -> Result<(), StoreError> {
        self.store.upsert_price_with_history(model, row, actor, changed_at)
    }

    pub fn history(&self, model: Option<&str>, limit: i64) -> Result<Vec<PriceHistoryRow>, StoreError> {
        self.store.price_history(model, limit)
    }

    /// `cost = (input/1e6)*input_rate + (output/1e6)*output_rate`. Rates
    /// are read once per call; callers that need a frozen cost (a usage
    /// row) must call this at write time and never recompute later (spec
    /// §4.2, §9 "price-time-correctness").
    pub fn cost(&self, model: &str, input_tokens: i64, output_tokens: i64) -> Result<f64, StoreError> {
        let row = self.get(model)?;
        Ok(compute_cost(row, input_tokens, output_tokens))
    }
}

pub fn compute_cost(row: PriceRow, input_tokens: i64, output_tokens: i64) -> f64 {
    (input_tokens as f64 / 1_000_000.0) * row.input_cost_per_million
        + (output_tokens as f64 / 1_000_000.0) * row.output_cost_per_million
}
