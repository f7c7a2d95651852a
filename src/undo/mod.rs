//! Linear undo/redo log over typed, invertible table operations.
//!
//! A generation is one committed unit of history. Its operations are
//! recorded while the generation is open, inside the store transaction that
//! performs the mutations. Undone generations move to the redo partition of
//! the log and back again when redone.

/// Operation kinds and strategies.
pub mod operation;

use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::{Database, DbError};
use crate::types::{RowId, UndoId};

pub use operation::{OperationKind, OperationStrategy, copy_for_undo};

/// Transaction flag marking a generation as undone.
pub const IS_REDO: i64 = 1;

const RESET_DISABLED: UndoId = UndoId::MAX - 10;

#[derive(Debug, Error)]
pub enum UndoError {
    #[error("operation recorded outside an open undo transaction")]
    IllegalRecording,
    #[error("undo called while recording or inside a transaction")]
    IllegalUndo,
    #[error("redo called while recording or inside a transaction")]
    IllegalRedo,
    #[error("undo transaction started inside an unrelated store transaction")]
    UndoStart,
    #[error("unknown operation code {0}")]
    UnknownOperation(i64),
    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<rusqlite::Error> for UndoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::from(value))
    }
}

pub type UndoResult<T> = Result<T, UndoError>;

/// Depth limits of the undo log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UndoConfig {
    /// Maximum number of generations kept. Zero disables recording.
    pub max_undo_levels: i64,
    /// Generation id at which ids are rebased down to start at one.
    pub reset_undo_at: i64,
}

impl Default for UndoConfig {
    fn default() -> Self {
        Self {
            max_undo_levels: 20,
            reset_undo_at: 30,
        }
    }
}

/// Window of generation ids.
///
/// `min - 1 <= undo_id <= max`. Generations `min..=undo_id` can be undone,
/// `undo_id + 1..=max` can be redone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UndoCounters {
    pub min_undo_id: UndoId,
    pub undo_id: UndoId,
    pub max_undo_id: UndoId,
}

impl UndoCounters {
    const EMPTY: Self = Self {
        min_undo_id: 1,
        undo_id: 0,
        max_undo_id: 0,
    };
}

#[derive(Debug, Clone, Copy)]
struct Recording {
    transaction_id: RowId,
    undo_id: UndoId,
    next_seq: i64,
}

#[derive(Debug, Clone)]
struct Generation {
    transaction_id: RowId,
    undo_id: UndoId,
    is_redo: bool,
}

/// Undo/redo state machine.
///
/// Idle when no generation is open; recording between [`UndoLog::begin`]
/// and [`UndoLog::finish`] or [`UndoLog::abort`].
#[derive(Debug)]
pub struct UndoLog {
    config: UndoConfig,
    counters: UndoCounters,
    recording: Option<Recording>,
    active: bool,
}

impl UndoLog {
    /// Loads the persisted log, discarding it when it is broken.
    pub fn open(db: &mut Database, config: UndoConfig) -> UndoResult<Self> {
        let mut log = Self {
            config: UndoConfig {
                reset_undo_at: effective_reset(config.max_undo_levels, config.reset_undo_at),
                ..config
            },
            counters: UndoCounters::EMPTY,
            recording: None,
            active: false,
        };

        log.reload(db)?;
        if log.config.max_undo_levels == 0 && log.counters.max_undo_id > 0 {
            log.set_max_undo_levels(db, 0, 0)?;
        }
        Ok(log)
    }

    /// Rebuilds the counters from the persisted log, discarding the log when
    /// it is not a contiguous run of undo generations followed by redo
    /// generations.
    fn reload(&mut self, db: &mut Database) -> UndoResult<()> {
        self.counters = UndoCounters::EMPTY;
        let generations = load_generations(db)?;
        let Some(first) = generations.first() else {
            return Ok(());
        };
        let Some(last) = generations.last() else {
            return Ok(());
        };

        match validate(&generations) {
            Some(undo_id) => {
                self.counters = UndoCounters {
                    min_undo_id: first.undo_id,
                    undo_id,
                    max_undo_id: last.undo_id,
                };
                tracing::debug!(counters = ?self.counters, "undo log loaded");
            }
            None => {
                tracing::warn!(
                    generations = generations.len(),
                    "undo log is inconsistent; discarding history"
                );
                db.with_transaction(|db| -> UndoResult<()> {
                    for generation in generations.iter().rev().filter(|g| !g.is_redo) {
                        discard_generation(db, generation.transaction_id, false)?;
                    }
                    for generation in generations.iter().filter(|g| g.is_redo) {
                        discard_generation(db, generation.transaction_id, true)?;
                    }
                    Ok(())
                })?;
            }
        }
        Ok(())
    }

    pub fn config(&self) -> UndoConfig {
        self.config
    }

    pub fn counters(&self) -> UndoCounters {
        self.counters
    }

    /// True when operations are being recorded.
    pub fn is_enabled(&self) -> bool {
        self.config.max_undo_levels > 0
    }

    /// True between `begin` and `finish`/`abort`.
    pub fn is_recording(&self) -> bool {
        self.active
    }

    pub fn can_undo(&self) -> bool {
        self.counters.undo_id >= self.counters.min_undo_id
    }

    pub fn can_redo(&self) -> bool {
        self.counters.undo_id < self.counters.max_undo_id
    }

    pub fn undo_description(&self, db: &Database) -> UndoResult<Option<String>> {
        if !self.can_undo() {
            return Ok(None);
        }
        description(db, self.counters.undo_id, false)
    }

    pub fn redo_description(&self, db: &Database) -> UndoResult<Option<String>> {
        if !self.can_redo() {
            return Ok(None);
        }
        description(db, self.counters.undo_id + 1, true)
    }

    /// Opens a generation inside the store transaction already open on `db`.
    pub fn begin(&mut self, db: &Database, description: &str) -> UndoResult<()> {
        if self.active || !db.in_transaction() {
            return Err(UndoError::UndoStart);
        }
        self.active = true;
        if !self.is_enabled() {
            return Ok(());
        }

        let undo_id = self.counters.undo_id + 1;
        let transaction_id = db.insert(
            "INSERT INTO undo_transactions \
             (transaction_undo_id, transaction_desc, transaction_flags) VALUES (?, ?, 0)",
            &[Value::Integer(undo_id), Value::Text(description.to_string())],
        )?;
        self.recording = Some(Recording {
            transaction_id,
            undo_id,
            next_seq: 0,
        });
        tracing::debug!(undo_id, description, "undo generation opened");
        Ok(())
    }

    /// Appends an operation to the open generation.
    ///
    /// A no-op when recording is disabled.
    pub fn record(
        &mut self,
        db: &Database,
        kind: OperationKind,
        cur_id: RowId,
        old_id: RowId,
    ) -> UndoResult<()> {
        if !self.active || !db.in_transaction() {
            return Err(UndoError::IllegalRecording);
        }
        let Some(recording) = self.recording.as_mut() else {
            return Ok(());
        };
        db.execute(
            "INSERT INTO undo_operations (operation_transaction_id, operation_seq, \
             operation_type, operation_cur_id, operation_old_id) VALUES (?, ?, ?, ?, ?)",
            &[
                Value::Integer(recording.transaction_id),
                Value::Integer(recording.next_seq),
                Value::Integer(kind.code()),
                Value::Integer(cur_id),
                Value::Integer(old_id),
            ],
        )?;
        recording.next_seq += 1;
        Ok(())
    }

    /// Commits the open generation.
    ///
    /// A generation without operations is removed. Otherwise the stale redo
    /// history is discarded, the oldest generations beyond the depth limit
    /// are discarded and ids are rebased past the reset threshold. Counters
    /// change here; callers restore them with [`UndoLog::abort`] if the store
    /// transaction later fails to commit.
    pub fn finish(&mut self, db: &Database) -> UndoResult<()> {
        if !self.active {
            return Err(UndoError::IllegalRecording);
        }
        self.active = false;
        let Some(recording) = self.recording.take() else {
            return Ok(());
        };

        if recording.next_seq == 0 {
            db.execute(
                "DELETE FROM undo_transactions WHERE transaction_id = ?",
                &[Value::Integer(recording.transaction_id)],
            )?;
            tracing::debug!(undo_id = recording.undo_id, "empty undo generation dropped");
            return Ok(());
        }

        let mut counters = self.counters;
        discard_range(db, true, counters.undo_id + 1, counters.max_undo_id)?;
        counters.undo_id = recording.undo_id;
        counters.max_undo_id = recording.undo_id;

        let levels = self.config.max_undo_levels;
        if counters.max_undo_id - counters.min_undo_id >= levels {
            discard_range(db, false, counters.min_undo_id, counters.max_undo_id - levels)?;
            counters.min_undo_id = counters.max_undo_id - levels + 1;
        }

        if counters.max_undo_id >= self.config.reset_undo_at {
            counters = rebase(db, counters, counters.min_undo_id - 1)?;
        }

        tracing::debug!(
            undo_id = counters.undo_id,
            operations = recording.next_seq,
            "undo generation committed"
        );
        self.counters = counters;
        Ok(())
    }

    /// Abandons the open generation and restores `saved` counters.
    ///
    /// The caller rolls back the store transaction, which removes every row
    /// written for the generation.
    pub fn abort(&mut self, saved: UndoCounters) {
        if let Some(recording) = self.recording.take() {
            tracing::debug!(undo_id = recording.undo_id, "undo generation abandoned");
        }
        self.active = false;
        self.counters = saved;
    }

    /// Undoes the newest generation. Returns false when there is none.
    pub fn undo(&mut self, db: &mut Database) -> UndoResult<bool> {
        if self.active || db.in_transaction() {
            return Err(UndoError::IllegalUndo);
        }
        if !self.can_undo() {
            return Ok(false);
        }

        let undo_id = self.counters.undo_id;
        let moved = db.with_transaction(|db| -> UndoResult<bool> {
            let Some(transaction_id) = find_generation(db, undo_id, false)? else {
                return Ok(false);
            };
            for (kind, cur_id, old_id) in load_operations(db, transaction_id, false)? {
                kind.strategy().undo(db, cur_id, old_id)?;
            }
            db.execute(
                "UPDATE undo_transactions SET transaction_flags = transaction_flags | ? \
                 WHERE transaction_id = ?",
                &[Value::Integer(IS_REDO), Value::Integer(transaction_id)],
            )?;
            Ok(true)
        })?;

        if moved {
            self.counters.undo_id -= 1;
            tracing::info!(undo_id, "undo applied");
        } else {
            tracing::warn!(undo_id, "undo generation missing; reloading undo log");
            self.reload(db)?;
        }
        Ok(moved)
    }

    /// Redoes the oldest undone generation. Returns false when there is none.
    pub fn redo(&mut self, db: &mut Database) -> UndoResult<bool> {
        if self.active || db.in_transaction() {
            return Err(UndoError::IllegalRedo);
        }
        if !self.can_redo() {
            return Ok(false);
        }

        let redo_id = self.counters.undo_id + 1;
        let moved = db.with_transaction(|db| -> UndoResult<bool> {
            let Some(transaction_id) = find_generation(db, redo_id, true)? else {
                return Ok(false);
            };
            for (kind, cur_id, old_id) in load_operations(db, transaction_id, true)? {
                kind.strategy().redo(db, cur_id, old_id)?;
            }
            db.execute(
                "UPDATE undo_transactions SET transaction_flags = transaction_flags & ~? \
                 WHERE transaction_id = ?",
                &[Value::Integer(IS_REDO), Value::Integer(transaction_id)],
            )?;
            Ok(true)
        })?;

        if moved {
            self.counters.undo_id = redo_id;
            tracing::info!(undo_id = redo_id, "redo applied");
        } else {
            tracing::warn!(undo_id = redo_id, "redo generation missing; reloading undo log");
            self.reload(db)?;
        }
        Ok(moved)
    }

    /// Changes the depth limit, discarding the oldest undo and the newest
    /// redo generations beyond it. A `reset_threshold` of zero keeps the
    /// current threshold.
    pub fn set_max_undo_levels(
        &mut self,
        db: &mut Database,
        levels: i64,
        reset_threshold: i64,
    ) -> UndoResult<()> {
        if self.active || db.in_transaction() {
            return Err(UndoError::IllegalRecording);
        }
        let levels = levels.max(0);
        let mut counters = self.counters;

        db.with_transaction(|db| -> UndoResult<()> {
            let delete_undo = counters.max_undo_id - levels;
            if delete_undo >= counters.min_undo_id {
                let limit = delete_undo.min(counters.undo_id);
                if limit >= counters.min_undo_id {
                    discard_range(db, false, counters.min_undo_id, limit)?;
                    counters.min_undo_id = limit + 1;
                }
            }
            let delete_redo = counters.min_undo_id + levels;
            if delete_redo <= counters.max_undo_id {
                discard_range(db, true, delete_redo, counters.max_undo_id)?;
                counters.max_undo_id = delete_redo - 1;
            }
            if counters.max_undo_id < counters.min_undo_id {
                db.execute("DELETE FROM undo_operations", &[])?;
                db.execute("DELETE FROM undo_transactions", &[])?;
                counters = UndoCounters::EMPTY;
            }
            Ok(())
        })?;

        self.counters = counters;
        self.config.max_undo_levels = levels;
        let threshold = if reset_threshold != 0 {
            reset_threshold
        } else {
            self.config.reset_undo_at
        };
        self.config.reset_undo_at = effective_reset(levels, threshold);
        tracing::info!(levels, reset_undo_at = self.config.reset_undo_at, "undo depth changed");
        Ok(())
    }
}

fn effective_reset(levels: i64, reset_at: i64) -> i64 {
    if reset_at <= levels { RESET_DISABLED } else { reset_at }
}

fn load_generations(db: &Database) -> UndoResult<Vec<Generation>> {
    let mut stmt = db.conn().prepare(
        "SELECT transaction_id, transaction_undo_id, transaction_flags FROM undo_transactions \
         ORDER BY transaction_undo_id ASC, transaction_id ASC",
    )?;
    let rows = stmt.query_map([], |row| {
        let flags: i64 = row.get(2)?;
        Ok(Generation {
            transaction_id: row.get(0)?,
            undo_id: row.get(1)?,
            is_redo: flags & IS_REDO != 0,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Returns the current undo id when `generations` is a contiguous run of ids
/// starting at one or more, with every undo generation before every redo one.
fn validate(generations: &[Generation]) -> Option<UndoId> {
    let first = generations.first()?;
    if first.undo_id < 1 {
        return None;
    }
    let mut undo_id = first.undo_id - 1;
    let mut last_id = undo_id;
    for generation in generations {
        if generation.undo_id != last_id + 1 {
            return None;
        }
        if !generation.is_redo {
            if undo_id != last_id {
                return None;
            }
            undo_id = generation.undo_id;
        }
        last_id = generation.undo_id;
    }
    Some(undo_id)
}

fn description(db: &Database, undo_id: UndoId, redo: bool) -> UndoResult<Option<String>> {
    let text = db
        .conn()
        .query_row(
            "SELECT transaction_desc FROM undo_transactions \
             WHERE transaction_undo_id = ? AND ( transaction_flags & 1 ) = ?",
            [undo_id, i64::from(redo)],
            |row| row.get::<_, String>(0),
        );
    match text {
        Ok(text) => Ok(Some(text)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(err) => Err(err.into()),
    }
}

fn find_generation(db: &Database, undo_id: UndoId, redo: bool) -> UndoResult<Option<RowId>> {
    Ok(db.query_i64(
        "SELECT transaction_id FROM undo_transactions \
         WHERE transaction_undo_id = ? AND ( transaction_flags & 1 ) = ?",
        &[Value::Integer(undo_id), Value::Integer(i64::from(redo))],
    )?)
}

fn load_operations(
    db: &Database,
    transaction_id: RowId,
    ascending: bool,
) -> UndoResult<Vec<(OperationKind, RowId, RowId)>> {
    let sql = format!(
        "SELECT operation_type, operation_cur_id, operation_old_id FROM undo_operations \
         WHERE operation_transaction_id = ? ORDER BY operation_seq {}",
        if ascending { "ASC" } else { "DESC" }
    );
    let mut stmt = db.conn().prepare(&sql)?;
    let rows = stmt.query_map([transaction_id], |row| {
        Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (code, cur_id, old_id) = row?;
        let kind = OperationKind::from_code(code).ok_or(UndoError::UnknownOperation(code))?;
        out.push((kind, cur_id, old_id));
    }
    Ok(out)
}

/// Discards generations `min..=max` of one partition: redo generations
/// oldest first, undo generations newest first.
fn discard_range(db: &Database, redo: bool, min: UndoId, max: UndoId) -> UndoResult<()> {
    if min > max {
        return Ok(());
    }
    let sql = format!(
        "SELECT transaction_id FROM undo_transactions WHERE transaction_undo_id BETWEEN ? AND ? \
         AND ( transaction_flags & 1 ) = ? ORDER BY transaction_undo_id {}",
        if redo { "ASC" } else { "DESC" }
    );
    let ids = db.query_ids(
        &sql,
        &[Value::Integer(min), Value::Integer(max), Value::Integer(i64::from(redo))],
    )?;
    for transaction_id in ids {
        discard_generation(db, transaction_id, redo)?;
    }
    tracing::debug!(redo, min, max, "undo generations discarded");
    Ok(())
}

fn discard_generation(db: &Database, transaction_id: RowId, redo: bool) -> UndoResult<()> {
    for (kind, cur_id, old_id) in load_operations(db, transaction_id, redo)? {
        let strategy = kind.strategy();
        if redo {
            strategy.discard_redo(db, cur_id, old_id)?;
        } else {
            strategy.discard_undo(db, cur_id, old_id)?;
        }
    }
    db.execute(
        "DELETE FROM undo_operations WHERE operation_transaction_id = ?",
        &[Value::Integer(transaction_id)],
    )?;
    db.execute(
        "DELETE FROM undo_transactions WHERE transaction_id = ?",
        &[Value::Integer(transaction_id)],
    )?;
    Ok(())
}

fn rebase(db: &Database, counters: UndoCounters, offset: UndoId) -> UndoResult<UndoCounters> {
    if offset == 0 {
        return Ok(counters);
    }
    db.execute(
        "UPDATE undo_transactions SET transaction_undo_id = transaction_undo_id - ?",
        &[Value::Integer(offset)],
    )?;
    tracing::debug!(offset, "undo ids rebased");
    Ok(UndoCounters {
        min_undo_id: counters.min_undo_id - offset,
        undo_id: counters.undo_id - offset,
        max_undo_id: counters.max_undo_id - offset,
    })
}
