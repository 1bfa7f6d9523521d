use rusqlite::{params, OptionalExtension};

use super::{models::User, Store, StoreError};

impl Store {
    /// Creates a user with the given identity and credential. Fails with a
    /// sqlite constraint error if the id or credential is already taken
    /// (credential uniqueness is a UNIQUE index, spec §3 invariant).
    pub fn create_user(&self, id: &str, api_key: &str, created_at: i64) -> Result<User, StoreError> {
        let conn = self.acquire()?;
        conn.execute(
            "INSERT INTO users (id, api_key, created_at) VALUES (?1, ?2, ?3)",
            params![id, api_key, created_at],
        )?;
        Ok(User {
            id: id.to_string(),
            api_key: api_key.to_string(),
            created_at,
        })
    }

    pub fn get_user(&self, id: &str) -> Result<Option<User>, StoreError> {
        let conn = self.acquire()?;
        let row = conn
            .query_row(
                "SELECT id, api_key, created_at FROM users WHERE id = ?1",
                params![id],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        api_key: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Resolves a bearer credential to a user identity by exact match. The
    /// user identity embedded in the credential's `sk-{user_id}-{random}`
    /// shape is advisory only — this is the authoritative lookup (spec §3).
    pub fn find_user_by_api_key(&self, api_key: &str) -> Result<Option<User>, StoreError> {
        let conn = self.acquire()?;
        let row = conn
            .query_row(
                "SELECT id, api_key, created_at FROM users WHERE api_key = ?1",
                params![api_key],
                |row| {
                    Ok(User {
                        id: row.get(0)?,
                        api_key: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    pub fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let conn = self.acquire()?;
        let mut stmt = conn.prepare("SELECT id, api_key, created_at FROM users ORDER BY created_at ASC")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(User {
                    id: row.get(0)?,
                    api_key: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Deletes a user. Cascades to their usage rows and limit row via the
    /// foreign-key `ON DELETE CASCADE` clauses (spec §3 invariant).
    pub fn delete_user(&self, id: &str) -> Result<bool, StoreError> {
        let conn = self.acquire()?;
        let affected = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }
}
