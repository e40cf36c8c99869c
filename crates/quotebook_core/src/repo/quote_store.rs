//! Key-value quote store contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist the full quote sequence under one fixed key.
//! - Persist the last selected category under another fixed key.
//!
//! # Invariants
//! - `save_quotes` validates every quote before writing anything.
//! - `load_quotes` returns `None` only when the key was never written.

use crate::db::DbError;
use crate::model::quote::{Quote, QuoteValidationError};
use log::{debug, error};
use rusqlite::{params, Connection, OptionalExtension};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Storage key holding the JSON array of quotes.
pub const QUOTES_KEY: &str = "quotes";
/// Storage key holding the last selected category filter.
pub const LAST_CATEGORY_KEY: &str = "last_category";

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by quote persistence.
#[derive(Debug)]
pub enum StoreError {
    Validation(QuoteValidationError),
    Db(DbError),
    /// Stored payload exists but cannot be decoded.
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted quote data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<QuoteValidationError> for StoreError {
    fn from(value: QuoteValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Durable storage used by `QuoteBook`.
pub trait QuoteStore {
    /// Reads the stored quote sequence, `None` when never written.
    fn load_quotes(&self) -> StoreResult<Option<Vec<Quote>>>;
    /// Overwrites the stored quote sequence.
    fn save_quotes(&self, quotes: &[Quote]) -> StoreResult<()>;
    fn load_last_category(&self) -> StoreResult<Option<String>>;
    /// Stores the category filter; `None` clears it.
    fn save_last_category(&self, category: Option<&str>) -> StoreResult<()>;
}

/// SQLite-backed quote store over the `kv_store` table.
pub struct SqliteQuoteStore {
    conn: Connection,
}

impl SqliteQuoteStore {
    /// Wraps a connection returned by `open_db` / `open_db_in_memory`.
    ///
    /// # Errors
    /// - `InvalidData` when the `kv_store` table is missing, which means the
    ///   connection was not migrated.
    pub fn try_new(conn: Connection) -> StoreResult<Self> {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'kv_store'
            );",
            [],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(StoreError::InvalidData(
                "kv_store table is missing; open the database through db::open_db".to_string(),
            ));
        }
        Ok(Self { conn })
    }

    fn read_value(&self, key: &str) -> StoreResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1;",
                [key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn write_value(&self, key: &str, value: &str) -> StoreResult<()> {
        self.conn.execute(
            "INSERT INTO kv_store (key, value, updated_at)
             VALUES (?1, ?2, strftime('%s', 'now') * 1000)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at;",
            params![key, value],
        )?;
        Ok(())
    }

    fn delete_value(&self, key: &str) -> StoreResult<()> {
        self.conn
            .execute("DELETE FROM kv_store WHERE key = ?1;", [key])?;
        Ok(())
    }
}

impl QuoteStore for SqliteQuoteStore {
    fn load_quotes(&self) -> StoreResult<Option<Vec<Quote>>> {
        let Some(raw) = self.read_value(QUOTES_KEY)? else {
            return Ok(None);
        };

        let quotes: Vec<Quote> = serde_json::from_str(&raw).map_err(|err| {
            error!(
                "event=store_load module=repo status=error key={} error_code=decode_failed",
                QUOTES_KEY
            );
            StoreError::InvalidData(format!("`{QUOTES_KEY}` is not a quote array: {err}"))
        })?;
        for quote in &quotes {
            quote.validate()?;
        }

        debug!(
            "event=store_load module=repo status=ok key={} count={}",
            QUOTES_KEY,
            quotes.len()
        );
        Ok(Some(quotes))
    }

    fn save_quotes(&self, quotes: &[Quote]) -> StoreResult<()> {
        for quote in quotes {
            quote.validate()?;
        }
        let payload = serde_json::to_string(quotes)
            .map_err(|err| StoreError::InvalidData(format!("cannot encode quotes: {err}")))?;
        self.write_value(QUOTES_KEY, &payload)?;

        debug!(
            "event=store_save module=repo status=ok key={} count={}",
            QUOTES_KEY,
            quotes.len()
        );
        Ok(())
    }

    fn load_last_category(&self) -> StoreResult<Option<String>> {
        self.read_value(LAST_CATEGORY_KEY)
    }

    fn save_last_category(&self, category: Option<&str>) -> StoreResult<()> {
        match category {
            Some(value) => self.write_value(LAST_CATEGORY_KEY, value),
            None => self.delete_value(LAST_CATEGORY_KEY),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{QuoteStore, SqliteQuoteStore, StoreError};
    use crate::db::open_db_in_memory;
    use crate::model::quote::Quote;
    use rusqlite::Connection;

    fn store() -> SqliteQuoteStore {
        SqliteQuoteStore::try_new(open_db_in_memory().expect("in-memory db"))
            .expect("store should wrap migrated connection")
    }

    #[test]
    fn rejects_unmigrated_connection() {
        let conn = Connection::open_in_memory().expect("raw connection");
        let result = SqliteQuoteStore::try_new(conn);
        assert!(matches!(result, Err(StoreError::InvalidData(_))));
    }

    #[test]
    fn missing_quotes_key_is_none_but_empty_array_is_some() {
        let store = store();
        assert!(store.load_quotes().expect("load").is_none());

        store.save_quotes(&[]).expect("save empty");
        assert_eq!(store.load_quotes().expect("load"), Some(Vec::new()));
    }

    #[test]
    fn save_overwrites_whole_sequence() {
        let store = store();
        store
            .save_quotes(&[Quote::new("A", "X"), Quote::new("B", "Y")])
            .expect("first save");
        store
            .save_quotes(&[Quote::with_id("7", "C", "Z")])
            .expect("second save");

        let loaded = store.load_quotes().expect("load").expect("quotes present");
        assert_eq!(loaded, vec![Quote::with_id("7", "C", "Z")]);
    }

    #[test]
    fn invalid_quote_blocks_write() {
        let store = store();
        store.save_quotes(&[Quote::new("A", "X")]).expect("save");

        let err = store
            .save_quotes(&[Quote::new("B", "Y"), Quote::new("C", "")])
            .expect_err("blank category must fail");
        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(
            store.load_quotes().expect("load"),
            Some(vec![Quote::new("A", "X")])
        );
    }

    #[test]
    fn last_category_can_be_set_and_cleared() {
        let store = store();
        assert!(store.load_last_category().expect("load").is_none());

        store.save_last_category(Some("Motivation")).expect("save");
        assert_eq!(
            store.load_last_category().expect("load").as_deref(),
            Some("Motivation")
        );

        store.save_last_category(None).expect("clear");
        assert!(store.load_last_category().expect("load").is_none());
    }
}
