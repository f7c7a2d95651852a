//! Catalog data access with undo recording.
//!
//! [`Catalog`] owns the database connection, the undo log and the date
//! locale. Every mutating method runs inside [`Catalog::with_undo`], so each
//! call becomes one undoable generation.

/// Book queries and mutations.
pub mod books;
/// Author, category and ISBN lookup rows.
pub mod lookups;
/// Catalog records.
pub mod model;
/// Series rows.
pub mod series;
/// Tag maintenance.
pub mod tags;
/// Saved views.
pub mod views;

use std::path::Path;

use rusqlite::types::Value;
use thiserror::Error;

use crate::config::CatalogConfig;
use crate::db::{Database, DbError, tables::TableDescription};
use crate::filter::DateLocale;
use crate::types::RowId;
use crate::undo::{OperationKind, UndoConfig, UndoError, UndoLog, copy_for_undo};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Undo(#[from] UndoError),
    #[error("filter encoding: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for CatalogError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::from(value))
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Explicit context threaded through every data access call.
pub struct Catalog {
    db: Database,
    undo: UndoLog,
    locale: DateLocale,
}

impl Catalog {
    /// Opens or creates a catalog database file.
    pub fn open(path: impl AsRef<Path>, config: &CatalogConfig) -> CatalogResult<Self> {
        Self::with_database(Database::open(path)?, config)
    }

    pub fn open_in_memory(config: &CatalogConfig) -> CatalogResult<Self> {
        Self::with_database(Database::open_in_memory()?, config)
    }

    pub fn with_database(mut db: Database, config: &CatalogConfig) -> CatalogResult<Self> {
        let undo = UndoLog::open(&mut db, config.undo)?;
        tracing::info!(
            max_undo_levels = config.undo.max_undo_levels,
            can_undo = undo.can_undo(),
            can_redo = undo.can_redo(),
            "catalog opened"
        );
        Ok(Self {
            db,
            undo,
            locale: config.date_locale.clone(),
        })
    }

    /// Closes the database connection.
    pub fn close(self) -> CatalogResult<()> {
        self.db.close()?;
        Ok(())
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn locale(&self) -> &DateLocale {
        &self.locale
    }

    pub fn undo_log(&self) -> &UndoLog {
        &self.undo
    }

    pub fn undo_config(&self) -> UndoConfig {
        self.undo.config()
    }

    /// Runs `op` as one undoable generation inside one store transaction.
    ///
    /// Nested calls join the enclosing generation. Starting a generation
    /// while the store is in a transaction for another purpose fails with
    /// [`UndoError::UndoStart`]. When `op` fails, the transaction rolls back
    /// and the log is left as it was.
    pub fn with_undo<T, F>(&mut self, description: &str, op: F) -> CatalogResult<T>
    where
        F: FnOnce(&mut Self) -> CatalogResult<T>,
    {
        if self.undo.is_recording() {
            return op(self);
        }
        if self.db.in_transaction() {
            return Err(UndoError::UndoStart.into());
        }

        let saved = self.undo.counters();
        self.db.begin()?;
        if let Err(err) = self.undo.begin(&self.db, description) {
            self.undo.abort(saved);
            self.db.end(false)?;
            return Err(err.into());
        }

        let result = op(self).and_then(|value| {
            self.undo.finish(&self.db)?;
            Ok(value)
        });
        match result {
            Ok(value) => {
                if let Err(err) = self.db.end(true) {
                    self.undo.abort(saved);
                    return Err(err.into());
                }
                Ok(value)
            }
            Err(err) => {
                self.undo.abort(saved);
                if let Err(end) = self.db.end(false) {
                    tracing::warn!(error = %end, "rollback after failed operation failed");
                }
                tracing::debug!(description, error = %err, "undo transaction rolled back");
                Err(err)
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        self.undo.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.undo.can_redo()
    }

    pub fn undo_description(&self) -> CatalogResult<Option<String>> {
        Ok(self.undo.undo_description(&self.db)?)
    }

    pub fn redo_description(&self) -> CatalogResult<Option<String>> {
        Ok(self.undo.redo_description(&self.db)?)
    }

    /// Undoes the newest generation. Returns false when there is none.
    pub fn undo(&mut self) -> CatalogResult<bool> {
        Ok(self.undo.undo(&mut self.db)?)
    }

    /// Redoes the oldest undone generation. Returns false when there is none.
    pub fn redo(&mut self) -> CatalogResult<bool> {
        Ok(self.undo.redo(&mut self.db)?)
    }

    pub fn set_max_undo_levels(&mut self, levels: i64, reset_threshold: i64) -> CatalogResult<()> {
        Ok(self.undo.set_max_undo_levels(&mut self.db, levels, reset_threshold)?)
    }

    fn record(&mut self, kind: OperationKind, cur_id: RowId, old_id: RowId) -> CatalogResult<()> {
        self.undo.record(&self.db, kind, cur_id, old_id)?;
        Ok(())
    }

    /// Inserts a row and records it as added.
    fn insert_row(
        &mut self,
        kind: OperationKind,
        sql: &str,
        args: &[Value],
    ) -> CatalogResult<RowId> {
        let id = self.db.insert(sql, args)?;
        if id != 0 {
            self.record(kind, id, 0)?;
        }
        Ok(id)
    }

    /// Runs `update` against row `id`, keeping a shadow copy for undo.
    ///
    /// Returns false, and keeps no shadow, when `update` changed nothing.
    fn update_row<F>(
        &mut self,
        table: &'static TableDescription,
        kind: OperationKind,
        id: RowId,
        update: F,
    ) -> CatalogResult<bool>
    where
        F: FnOnce(&Database) -> CatalogResult<usize>,
    {
        if !self.undo.is_enabled() {
            return Ok(update(&self.db)? > 0);
        }
        let shadow = copy_for_undo(&self.db, table, id)?;
        if shadow == 0 {
            return Ok(false);
        }
        if update(&self.db)? == 0 {
            self.db.execute(
                &format!("DELETE FROM {} WHERE {} = ?", table.name, table.id_column),
                &[Value::Integer(shadow)],
            )?;
            return Ok(false);
        }
        self.record(kind, id, shadow)?;
        Ok(true)
    }

    /// Hides rows, or deletes them outright when recording is disabled.
    fn hide_rows(
        &mut self,
        table: &'static TableDescription,
        kind: OperationKind,
        ids: &[RowId],
    ) -> CatalogResult<usize> {
        let mut count = 0;
        for &id in ids {
            let changed = if self.undo.is_enabled() {
                let flag = table.flag_column.unwrap_or("0");
                let changed = self.db.execute(
                    &format!(
                        "UPDATE {} SET {flag} = {flag} | {} WHERE {} = ? AND {}",
                        table.name,
                        table.flag_value,
                        table.id_column,
                        table.visible_expression(false)
                    ),
                    &[Value::Integer(id)],
                )?;
                if changed > 0 {
                    self.record(kind, id, 0)?;
                }
                changed
            } else {
                self.db.execute(
                    &format!("DELETE FROM {} WHERE {} = ?", table.name, table.id_column),
                    &[Value::Integer(id)],
                )?
            };
            count += changed;
        }
        Ok(count)
    }

    /// Adds a link row, recording it when it is new.
    fn link(
        &mut self,
        table: &'static TableDescription,
        kind: OperationKind,
        left: RowId,
        right: RowId,
    ) -> CatalogResult<bool> {
        let Some(link) = table.link else {
            return Ok(false);
        };
        let added = self.db.execute(
            &format!(
                "INSERT OR IGNORE INTO {} ({}, {}) VALUES (?, ?)",
                table.name, link.left, link.right
            ),
            &[Value::Integer(left), Value::Integer(right)],
        )?;
        if added > 0 {
            self.record(kind, left, right)?;
        }
        Ok(added > 0)
    }

    /// Deletes link rows matching `clause`, recording each one.
    fn unlink_where(
        &mut self,
        table: &'static TableDescription,
        kind: OperationKind,
        clause: &str,
        args: &[Value],
    ) -> CatalogResult<usize> {
        let Some(link) = table.link else {
            return Ok(0);
        };
        let pairs = self.db.query_id_pairs(
            &format!("SELECT {}, {} FROM {} WHERE {clause}", link.left, link.right, table.name),
            args,
        )?;
        for &(left, right) in &pairs {
            self.record(kind, left, right)?;
        }
        self.db.execute(&format!("DELETE FROM {} WHERE {clause}", table.name), args)?;
        Ok(pairs.len())
    }
}

pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
