//! SQLite store handle with reentrant transaction scoping.

/// Table and column catalog.
pub mod tables;

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params_from_iter, types::Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type DbResult<T> = Result<T, DbError>;

/// Owned connection to the catalog database.
///
/// Transactions opened through [`Database::with_transaction`] are reentrant:
/// an inner call made while a transaction is already open participates in
/// the outer one instead of nesting.
pub struct Database {
    conn: Connection,
    depth: u32,
}

impl Database {
    /// Opens or creates a database file at `path`.
    ///
    /// Enables WAL mode and sets `synchronous=NORMAL`.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Self::init_connection(conn)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn)
    }

    fn init_connection(conn: Connection) -> DbResult<Self> {
        conn.execute_batch(include_str!("schema.sql"))?;
        Ok(Self { conn, depth: 0 })
    }

    /// Closes the connection, surfacing any error from SQLite.
    pub fn close(self) -> DbResult<()> {
        self.conn.close().map_err(|(_, err)| DbError::from(err))
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// True while a transaction opened by [`Database::with_transaction`] is
    /// still running.
    pub fn in_transaction(&self) -> bool {
        self.depth > 0
    }

    /// Runs `f` inside a transaction.
    ///
    /// The outermost call commits when `f` returns `Ok` and rolls back when
    /// it returns `Err`. Inner calls only run `f`, so an inner error still
    /// rolls back the whole outer transaction once it propagates.
    pub fn with_transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
        E: From<DbError>,
    {
        self.begin()?;
        let result = f(self);
        match result {
            Ok(value) => {
                self.end(true)?;
                Ok(value)
            }
            Err(err) => {
                if let Err(end) = self.end(false) {
                    tracing::warn!(error = %end, "rollback failed");
                }
                Err(err)
            }
        }
    }

    /// Opens a transaction scope. Pair every call with [`Database::end`].
    pub fn begin(&mut self) -> DbResult<()> {
        if self.depth == 0 {
            self.conn.execute_batch("BEGIN IMMEDIATE")?;
        }
        self.depth += 1;
        Ok(())
    }

    /// Closes a transaction scope.
    ///
    /// Only the outermost scope touches SQLite: it commits when `commit` is
    /// true and rolls back otherwise. A failed commit is rolled back.
    pub fn end(&mut self, commit: bool) -> DbResult<()> {
        if self.depth == 0 {
            return Ok(());
        }
        self.depth -= 1;
        if self.depth > 0 {
            return Ok(());
        }
        if commit {
            if let Err(err) = self.conn.execute_batch("COMMIT") {
                let _ = self.conn.execute_batch("ROLLBACK");
                return Err(err.into());
            }
            Ok(())
        } else {
            self.conn.execute_batch("ROLLBACK")?;
            Ok(())
        }
    }

    /// Executes a parameterized command and returns the affected row count.
    pub fn execute(&self, sql: &str, args: &[Value]) -> DbResult<usize> {
        Ok(self.conn.execute(sql, params_from_iter(args.iter()))?)
    }

    /// Executes an insert and returns the new row id.
    pub fn insert(&self, sql: &str, args: &[Value]) -> DbResult<i64> {
        let count = self.conn.execute(sql, params_from_iter(args.iter()))?;
        if count == 0 {
            return Ok(0);
        }
        Ok(self.conn.last_insert_rowid())
    }

    /// Runs a query whose first column is an integer id.
    pub fn query_ids(&self, sql: &str, args: &[Value]) -> DbResult<Vec<i64>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), |row| row.get::<_, i64>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Runs a query returning pairs of integer ids.
    pub fn query_id_pairs(&self, sql: &str, args: &[Value]) -> DbResult<Vec<(i64, i64)>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Runs a query returning a single integer, if any row matched.
    pub fn query_i64(&self, sql: &str, args: &[Value]) -> DbResult<Option<i64>> {
        Ok(self
            .conn
            .query_row(sql, params_from_iter(args.iter()), |row| row.get::<_, Option<i64>>(0))
            .optional()?
            .flatten())
    }
}
