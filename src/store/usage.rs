use rusqlite::params;

use super::{
    models::{UsageInsert, UsageRecord},
    Store, StoreError,
};

impl Store {
    /// Writes one immutable usage row. Never called twice for the same
    /// completed request (spec §3).
    pub fn insert_usage(&self, insert: UsageInsert<'_>) -> Result<i64, StoreError> {
        let conn = self.acquire()?;
        let total_tokens = insert.input_tokens + insert.output_tokens;
        conn.execute(
            "INSERT INTO usage
                (user_id, model, input_tokens, output_tokens, total_tokens, timestamp,
                 cost, request_id, prompt_preview)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                insert.user_id,
                insert.model,
                insert.input_tokens,
                insert.output_tokens,
                total_tokens,
                insert.timestamp,
                insert.cost,
                insert.request_id,
                insert.prompt_preview,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn usage_history(&self, user_id: &str, limit: i64, offset: i64) -> Result<Vec<UsageRecord>, StoreError> {
        let conn = self.acquire()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, model, input_tokens, output_tokens, total_tokens, cost,
                    request_id, prompt_preview, timestamp
             FROM usage WHERE user_id = ?1 ORDER BY timestamp DESC LIMIT ?2 OFFSET ?3",
        )?;
        let rows = stmt
            .query_map(params![user_id, limit.clamp(1, 1000), offset.max(0)], row_to_usage)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Totals and per-model breakdown for one user, for `GET /v1/usage`.
    pub fn usage_totals(&self, user_id: &str) -> Result<Vec<(String, i64, i64, i64, f64)>, StoreError> {
        let conn = self.acquire()?;
        let mut stmt = conn.prepare(
            "SELECT model, COUNT(*), SUM(input_tokens), SUM(output_tokens), SUM(cost)
             FROM usage WHERE user_id = ?1 GROUP BY model ORDER BY model ASC",
        )?;
        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, f64>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// `COUNT(*) WHERE user=U AND ts > since` — the requests/24h dimension.
    pub fn count_requests_since(&self, user_id: &str, since: i64) -> Result<i64, StoreError> {
        let conn = self.acquire()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM usage WHERE user_id = ?1 AND timestamp > ?2",
            params![user_id, since],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// `SUM(total_tokens) WHERE user=U AND ts > since` — the tokens/24h dimension.
    pub fn sum_tokens_since(&self, user_id: &str, since: i64) -> Result<i64, StoreError> {
        let conn = self.acquire()?;
        let sum: Option<i64> = conn.query_row(
            "SELECT SUM(total_tokens) FROM usage WHERE user_id = ?1 AND timestamp > ?2",
            params![user_id, since],
            |row| row.get(0),
        )?;
        Ok(sum.unwrap_or(0))
    }

    /// `SUM(total_tokens) WHERE user=U` — the lifetime-tokens dimension.
    pub fn sum_tokens_lifetime(&self, user_id: &str) -> Result<i64, StoreError> {
        let conn = self.acquire()?;
        let sum: Option<i64> = conn.query_row(
            "SELECT SUM(total_tokens) FROM usage WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(sum.unwrap_or(0))
    }
}

fn row_to_usage(row: &rusqlite::Row<'_>) -> rusqlite::Result<UsageRecord> {
    Ok(UsageRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        model: row.get(2)?,
        input_tokens: row.get(3)?,
        output_tokens: row.get(4)?,
        total_tokens: row.get(5)?,
        cost: row.get(6)?,
        request_id: row.get(7)?,
        prompt_preview: row.get(8)?,
        timestamp: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::super::{models::UsageInsert, Store};

    fn open_test_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let store = Store::open(&path, 4).unwrap();
        store.create_user("alice", "sk-alice-abc", 0).unwrap();
        (dir, store)
    }

    #[test]
    fn total_tokens_is_input_plus_output() {
        let (_dir, store) = open_test_store();
        store
            .insert_usage(UsageInsert {
                user_id: "alice",
                model: "m1",
                input_tokens: 1_000_000,
                output_tokens: 500_000,
                cost: 2.0,
                request_id: "r1",
                prompt_preview: "hello",
                timestamp: 100,
            })
            .unwrap();
        let rows = store.usage_history("alice", 10, 0).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].total_tokens, 1_500_000);
        assert_eq!(rows[0].cost, 2.0);
    }

    #[test]
    fn day_and_lifetime_sums_respect_the_window() {
        let (_dir, store) = open_test_store();
        store
            .insert_usage(UsageInsert {
                user_id: "alice",
                model: "m1",
                input_tokens: 100,
                output_tokens: 100,
                cost: 0.0,
                request_id: "old",
                prompt_preview: "",
                timestamp: 10,
            })
            .unwrap();
        store
            .insert_usage(UsageInsert {
                user_id: "alice",
                model: "m1",
                input_tokens: 200,
                output_tokens: 200,
                cost: 0.0,
                request_id: "new",
                prompt_preview: "",
                timestamp: 1_000_000,
            })
            .unwrap();

        assert_eq!(store.sum_tokens_lifetime("alice").unwrap(), 600);
        // Window excludes the old row when "since" lands after it.
        assert_eq!(store.sum_tokens_since("alice", 500_000).unwrap(), 400);
        assert_eq!(store.count_requests_since("alice", 500_000).unwrap(), 1);
    }
}
