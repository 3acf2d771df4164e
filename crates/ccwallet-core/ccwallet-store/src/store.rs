use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};

use ccwallet_core::KeyValueStore;

use crate::error::StoreError;
use crate::models::{KvRow, NewKvRow};
use crate::schema::kv;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// SQLite-backed key/value store for wallet data.
pub struct SqliteStore {
    conn: SqliteConnection,
}

impl SqliteStore {
    /// Open (or create) a store at `path` and run pending migrations.
    pub fn open(path: &str) -> crate::Result<Self> {
        let conn = SqliteConnection::establish(path)?;
        Self::migrated(conn)
    }

    /// Open an in-memory store for tests.
    pub fn open_in_memory() -> crate::Result<Self> {
        let conn = SqliteConnection::establish(":memory:")?;
        Self::migrated(conn)
    }

    fn migrated(mut conn: SqliteConnection) -> crate::Result<Self> {
        conn.run_pending_migrations(MIGRATIONS)
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        Ok(SqliteStore { conn })
    }

    // ==================== Reads ====================

    pub fn get_value(&mut self, key: &str) -> crate::Result<Option<String>> {
        let value = kv::table
            .find(key)
            .select(kv::value)
            .first::<String>(&mut self.conn)
            .optional()?;
        Ok(value)
    }

    /// Every row, ordered by key.
    pub fn entries(&mut self) -> crate::Result<Vec<KvRow>> {
        let rows = kv::table
            .order(kv::key.asc())
            .select(KvRow::as_select())
            .load(&mut self.conn)?;
        Ok(rows)
    }

    pub fn keys_with_prefix(&mut self, prefix: &str) -> crate::Result<Vec<String>> {
        let pattern = format!("{}%", escape_like(prefix));
        let keys = kv::table
            .filter(kv::key.like(pattern).escape('\\'))
            .order(kv::key.asc())
            .select(kv::key)
            .load::<String>(&mut self.conn)?;
        Ok(keys)
    }

    // ==================== Writes ====================

    /// Insert or replace the value stored under `key`.
    pub fn set_value(&mut self, key: &str, value: &str) -> crate::Result<()> {
        if key.is_empty() {
            return Err(StoreError::InvalidData("empty key".into()));
        }
        diesel::replace_into(kv::table)
            .values(&NewKvRow { key, value })
            .execute(&mut self.conn)?;
        Ok(())
    }

    pub fn remove_value(&mut self, key: &str) -> crate::Result<bool> {
        let deleted = diesel::delete(kv::table.find(key)).execute(&mut self.conn)?;
        Ok(deleted > 0)
    }

    /// Remove every key starting with `prefix`. Returns the number removed.
    pub fn remove_prefix(&mut self, prefix: &str) -> crate::Result<usize> {
        let pattern = format!("{}%", escape_like(prefix));
        let deleted = diesel::delete(kv::table.filter(kv::key.like(pattern).escape('\\')))
            .execute(&mut self.conn)?;
        Ok(deleted)
    }

    pub fn clear_all(&mut self) -> crate::Result<()> {
        let deleted = diesel::delete(kv::table).execute(&mut self.conn)?;
        log::debug!("cleared {} stored value(s)", deleted);
        Ok(())
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&mut self, key: &str) -> ccwallet_core::Result<Option<String>> {
        Ok(self.get_value(key)?)
    }

    fn set(&mut self, key: &str, value: &str) -> ccwallet_core::Result<()> {
        Ok(self.set_value(key, value)?)
    }

    fn remove(&mut self, key: &str) -> ccwallet_core::Result<()> {
        self.remove_value(key)?;
        Ok(())
    }

    fn clear(&mut self) -> ccwallet_core::Result<()> {
        Ok(self.clear_all()?)
    }
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_like_escapes_wildcards() {
        assert_eq!(escape_like("ccwallet_"), "ccwallet\\_");
        assert_eq!(escape_like("a%b\\"), "a\\%b\\\\");
    }
}
