use rusqlite::{params, OptionalExtension};

use super::{models::RateLimits, Store, StoreError};

impl Store {
    /// Returns `None` if no row exists for this user — callers apply
    /// `RateLimits::defaults()` in that case (spec §3).
    pub fn get_rate_limits(&self, user_id: &str) -> Result<Option<RateLimits>, StoreError> {
        let conn = self.acquire()?;
        let row = conn
            .query_row(
                "SELECT requests_per_minute, requests_per_day, tokens_per_minute,
                        tokens_per_day, lifetime_token_cap
                 FROM rate_limits WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(RateLimits {
                        requests_per_minute: row.get(0)?,
                        requests_per_day: row.get(1)?,
                        tokens_per_minute: row.get(2)?,
                        tokens_per_day: row.get(3)?,
                        lifetime_token_cap: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Takes effect on the next admission check (spec §3: mutable, no
    /// in-place caching).
    pub fn set_rate_limits(&self, user_id: &str, limits: RateLimits) -> Result<(), StoreError> {
        let conn = self.acquire()?;
        conn.execute(
            "INSERT INTO rate_limits
                (user_id, requests_per_minute, requests_per_day, tokens_per_minute,
                 tokens_per_day, lifetime_token_cap)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(user_id) DO UPDATE SET
                requests_per_minute = excluded.requests_per_minute,
                requests_per_day = excluded.requests_per_day,
                tokens_per_minute = excluded.tokens_per_minute,
                tokens_per_day = excluded.tokens_per_day,
                lifetime_token_cap = excluded.lifetime_token_cap",
            params![
                user_id,
                limits.requests_per_minute,
                limits.requests_per_day,
                limits.tokens_per_minute,
                limits.tokens_per_day,
                limits.lifetime_token_cap,
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::Store;
    use super::RateLimits;

    #[test]
    fn unset_limits_read_back_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("t.db"), 4).unwrap();
        store.create_user("alice", "sk-alice-x", 0).unwrap();
        assert_eq!(store.get_rate_limits("alice").unwrap(), None);
    }

    #[test]
    fn setting_limits_is_mutable_and_upserts() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("t.db"), 4).unwrap();
        store.create_user("alice", "sk-alice-x", 0).unwrap();

        store
            .set_rate_limits(
                "alice",
                RateLimits {
                    requests_per_minute: Some(2),
                    ..RateLimits::defaults()
                },
            )
            .unwrap();
        let limits = store.get_rate_limits("alice").unwrap().unwrap();
        assert_eq!(limits.requests_per_minute, Some(2));

        store
            .set_rate_limits(
                "alice",
                RateLimits {
                    requests_per_minute: Some(5),
                    ..RateLimits::defaults()
                },
            )
            .unwrap();
        let limits = store.get_rate_limits("alice").unwrap().unwrap();
        assert_eq!(limits.requests_per_minute, Some(5));
    }
}
