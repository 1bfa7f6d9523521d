//! Shared, cloneable application state (teacher's `AuthState`/`AppState`
//! pattern: a `Clone` struct of `Arc`-wrapped collaborators, handed to
//! every handler via axum's `State` extractor).

use std::sync::Arc;

use crate::backend::BackendClient;
use crate::config::Config;
use crate::pricing::PriceBook;
use crate::ratelimit::RateLimiter;
use crate::store::Store;
use crate::usage_tracker::UsageTracker;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub price_book: PriceBook,
    pub rate_limiter: Arc<RateLimiter>,
    pub backend: BackendClient,
    pub config: Arc<Config>,
    pub usage_tracker: Arc<UsageTracker>,
}

impl AppState {
    pub fn new(store: Store, backend: BackendClient, config: Arc<Config>) -> Self {
        let price_book = PriceBook::new(store.clone());
        let rate_limiter = Arc::new(RateLimiter::new(store.clone()));
        let usage_tracker = Arc::new(UsageTracker::new(store.clone(), price_book.clone(), rate_limiter.clone()));
        Self {
            store,
            price_book,
            rate_limiter,
            backend,
            config,
            usage_tracker,
        }
    }
}
