use rusqlite::{params, OptionalExtension};

use super::{
    models::{PriceHistoryRow, PriceRow},
    Store, StoreError,
};

impl Store {
    pub fn get_price(&self, model: &str) -> Result<Option<PriceRow>, StoreError> {
        let conn = self.acquire()?;
        let row = conn
            .query_row(
                "SELECT input_cost_per_million, output_cost_per_million FROM price_book WHERE model = ?1",
                params![model],
                |row| {
                    Ok(PriceRow {
                        input_cost_per_million: row.get(0)?,
                        output_cost_per_million: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub fn list_prices(&self) -> Result<Vec<(String, PriceRow)>, StoreError> {
        let conn = self.acquire()?;
        let mut stmt = conn.prepare(
            "SELECT model, input_cost_per_million, output_cost_per_million FROM price_book ORDER BY model ASC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    PriceRow {
                        input_cost_per_million: row.get(1)?,
                        output_cost_per_million: row.get(2)?,
                    },
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Upserts the current price-book row and appends a history entry in
    /// the same transaction: if the history append fails, the upsert is
    /// rolled back (spec §4.2).
    pub fn upsert_price_with_history(
        &self,
        model: &str,
        row: PriceRow,
        actor: &str,
        changed_at: i64,
    ) -> Result<(), StoreError> {
        let mut conn = self.acquire()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO price_book (model, input_cost_per_million, output_cost_per_million)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(model) DO UPDATE SET
                input_cost_per_million = excluded.input_cost_per_million,
                output_cost_per_million = excluded.output_cost_per_million",
            params![model, row.input_cost_per_million, row.output_cost_per_million],
        )?;
        tx.execute(
            "INSERT INTO price_history (model, input_cost_per_million, output_cost_per_million, changed_at, actor)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![model, row.input_cost_per_million, row.output_cost_per_million, changed_at, actor],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn price_history(&self, model: Option<&str>, limit: i64) -> Result<Vec<PriceHistoryRow>, StoreError> {
        let conn = self.acquire()?;
        let limit = limit.clamp(1, 10_000);
        let mut out = Vec::new();
        if let Some(model) = model {
            let mut stmt = conn.prepare(
                "SELECT id, model, input_cost_per_million, output_cost_per_million, changed_at, actor
                 FROM price_history WHERE model = ?1 ORDER BY changed_at DESC LIMIT ?2",
            )?;
            let rows = stmt.query_map(params![model, limit], row_to_history)?;
            for row in rows {
                out.push(row?);
            }
        } else {
            let mut stmt = conn.prepare(
                "SELECT id, model, input_cost_per_million, output_cost_per_million, changed_at, actor
                 FROM price_history ORDER BY changed_at DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit], row_to_history)?;
            for row in rows {
                out.push(row?);
            }
        }
        Ok(out)
    }
}

fn row_to_history(row: &rusqlite::Row<'_>) -> rusqlite::Result<PriceHistoryRow> {
    Ok(PriceHistoryRow {
        id: row.get(0)?,
        model: row.get(1)?,
        input_cost_per_million: row.get(2)?,
        output_cost_per_million: row.get(3)?,
        changed_at: row.get(4)?,
        actor: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::super::Store;
    use super::PriceRow;

    #[test]
    fn history_is_append_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("t.db"), 4).unwrap();

        store
            .upsert_price_with_history(
                "m1",
                PriceRow {
                    input_cost_per_million: 1.0,
                    output_cost_per_million: 2.0,
                },
                "admin",
                1,
            )
            .unwrap();
        let before = store.price_history(Some("m1"), 100).unwrap();
        assert_eq!(before.len(), 1);

        store
            .upsert_price_with_history(
                "m1",
                PriceRow {
                    input_cost_per_million: 10.0,
                    output_cost_per_million: 20.0,
                },
                "admin",
                2,
            )
            .unwrap();
        let after = store.price_history(Some("m1"), 100).unwrap();
        assert_eq!(after.len(), 2);

        let current = store.get_price("m1").unwrap().unwrap();
        assert_eq!(current.input_cost_per_million, 10.0);
    }
}
