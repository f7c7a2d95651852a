//! Recorded operation kinds and their undo/redo/discard strategies.

use rusqlite::types::Value;

use crate::db::{
    Database, DbResult,
    tables::{
        AUTHORS, BOOK_AUTHORS, BOOK_CATEGORIES, BOOK_ISBNS, BOOK_TAGS, BOOKS, CATEGORIES, HIDDEN,
        ISBNS, SERIES, TAGS, TableDescription, VIEWS,
    },
};
use crate::types::RowId;

/// Kind of an elementary recorded mutation.
///
/// The integer codes are persisted in the operations table and must not be
/// renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    AddBook = 0,
    DeleteBook = 1,
    ChangeBook = 2,
    AddAuthor = 3,
    DeleteAuthor = 4,
    AddBookAuthor = 5,
    DeleteBookAuthor = 6,
    AddCategory = 7,
    DeleteCategory = 8,
    AddBookCategory = 9,
    DeleteBookCategory = 10,
    AddTag = 11,
    DeleteTag = 12,
    ChangeTag = 13,
    AddBookTag = 14,
    DeleteBookTag = 15,
    AddIsbn = 16,
    DeleteIsbn = 17,
    AddBookIsbn = 18,
    DeleteBookIsbn = 19,
    AddView = 20,
    DeleteView = 21,
    ChangeView = 22,
    AddSeries = 23,
    DeleteSeries = 24,
    ChangeSeries = 25,
}

impl OperationKind {
    const ALL: [OperationKind; 26] = [
        OperationKind::AddBook,
        OperationKind::DeleteBook,
        OperationKind::ChangeBook,
        OperationKind::AddAuthor,
        OperationKind::DeleteAuthor,
        OperationKind::AddBookAuthor,
        OperationKind::DeleteBookAuthor,
        OperationKind::AddCategory,
        OperationKind::DeleteCategory,
        OperationKind::AddBookCategory,
        OperationKind::DeleteBookCategory,
        OperationKind::AddTag,
        OperationKind::DeleteTag,
        OperationKind::ChangeTag,
        OperationKind::AddBookTag,
        OperationKind::DeleteBookTag,
        OperationKind::AddIsbn,
        OperationKind::DeleteIsbn,
        OperationKind::AddBookIsbn,
        OperationKind::DeleteBookIsbn,
        OperationKind::AddView,
        OperationKind::DeleteView,
        OperationKind::ChangeView,
        OperationKind::AddSeries,
        OperationKind::DeleteSeries,
        OperationKind::ChangeSeries,
    ];

    pub fn code(self) -> i64 {
        self as i64
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.code() == code)
    }

    pub fn strategy(self) -> OperationStrategy {
        use OperationKind::*;
        use OperationStrategy as S;
        match self {
            AddBook => S::Add(&BOOKS),
            DeleteBook => S::Delete(&BOOKS),
            ChangeBook => S::Change(&BOOKS),
            AddAuthor => S::Add(&AUTHORS),
            DeleteAuthor => S::Delete(&AUTHORS),
            AddBookAuthor => S::AddLink(&BOOK_AUTHORS),
            DeleteBookAuthor => S::DeleteLink(&BOOK_AUTHORS),
            AddCategory => S::Add(&CATEGORIES),
            DeleteCategory => S::Delete(&CATEGORIES),
            AddBookCategory => S::AddLink(&BOOK_CATEGORIES),
            DeleteBookCategory => S::DeleteLink(&BOOK_CATEGORIES),
            AddTag => S::Add(&TAGS),
            DeleteTag => S::Delete(&TAGS),
            ChangeTag => S::Change(&TAGS),
            AddBookTag => S::AddLink(&BOOK_TAGS),
            DeleteBookTag => S::DeleteLink(&BOOK_TAGS),
            AddIsbn => S::Add(&ISBNS),
            DeleteIsbn => S::Delete(&ISBNS),
            AddBookIsbn => S::AddLink(&BOOK_ISBNS),
            DeleteBookIsbn => S::DeleteLink(&BOOK_ISBNS),
            AddView => S::Add(&VIEWS),
            DeleteView => S::Delete(&VIEWS),
            ChangeView => S::Change(&VIEWS),
            AddSeries => S::Add(&SERIES),
            DeleteSeries => S::Delete(&SERIES),
            ChangeSeries => S::Change(&SERIES),
        }
    }
}

/// Undo, redo and discard behavior over one table.
///
/// For row strategies `cur_id` is the row id and `old_id` is the shadow row
/// of a change. For link strategies they are the left and right ids.
#[derive(Debug, Clone, Copy)]
pub enum OperationStrategy {
    Add(&'static TableDescription),
    Delete(&'static TableDescription),
    Change(&'static TableDescription),
    AddLink(&'static TableDescription),
    DeleteLink(&'static TableDescription),
}

impl OperationStrategy {
    pub fn table(&self) -> &'static TableDescription {
        match *self {
            Self::Add(t)
            | Self::Delete(t)
            | Self::Change(t)
            | Self::AddLink(t)
            | Self::DeleteLink(t) => t,
        }
    }

    pub fn undo(&self, db: &Database, cur_id: RowId, old_id: RowId) -> DbResult<()> {
        match *self {
            Self::Add(t) => set_hidden(db, t, cur_id),
            Self::Delete(t) => clear_hidden(db, t, cur_id),
            Self::Change(t) => swap(db, t, cur_id, old_id),
            Self::AddLink(t) => delete_link(db, t, cur_id, old_id),
            Self::DeleteLink(t) => insert_link(db, t, cur_id, old_id),
        }
    }

    pub fn redo(&self, db: &Database, cur_id: RowId, old_id: RowId) -> DbResult<()> {
        match *self {
            Self::Add(t) => clear_hidden(db, t, cur_id),
            Self::Delete(t) => set_hidden(db, t, cur_id),
            Self::Change(t) => swap(db, t, cur_id, old_id),
            Self::AddLink(t) => insert_link(db, t, cur_id, old_id),
            Self::DeleteLink(t) => delete_link(db, t, cur_id, old_id),
        }
    }

    /// Forgets an operation that can no longer be undone.
    pub fn discard_undo(&self, db: &Database, cur_id: RowId, old_id: RowId) -> DbResult<()> {
        match *self {
            Self::Add(_) | Self::AddLink(_) | Self::DeleteLink(_) => Ok(()),
            Self::Delete(t) => delete_row(db, t, cur_id),
            Self::Change(t) => delete_row(db, t, old_id),
        }
    }

    /// Forgets an undone operation that can no longer be redone.
    pub fn discard_redo(&self, db: &Database, cur_id: RowId, old_id: RowId) -> DbResult<()> {
        match *self {
            Self::Delete(_) | Self::AddLink(_) | Self::DeleteLink(_) => Ok(()),
            Self::Add(t) => delete_row(db, t, cur_id),
            Self::Change(t) => delete_row(db, t, old_id),
        }
    }
}

fn flag_column(table: &TableDescription) -> &'static str {
    table.flag_column.unwrap_or("0")
}

fn set_hidden(db: &Database, table: &TableDescription, id: RowId) -> DbResult<()> {
    let flag = flag_column(table);
    db.execute(
        &format!(
            "UPDATE {} SET {flag} = {flag} | {} WHERE {} = ?",
            table.name, table.flag_value, table.id_column
        ),
        &[Value::Integer(id)],
    )?;
    Ok(())
}

fn clear_hidden(db: &Database, table: &TableDescription, id: RowId) -> DbResult<()> {
    let flag = flag_column(table);
    db.execute(
        &format!(
            "UPDATE {} SET {flag} = {flag} & ~{} WHERE {} = ?",
            table.name, table.flag_value, table.id_column
        ),
        &[Value::Integer(id)],
    )?;
    Ok(())
}

fn delete_row(db: &Database, table: &TableDescription, id: RowId) -> DbResult<()> {
    db.execute(
        &format!("DELETE FROM {} WHERE {} = ?", table.name, table.id_column),
        &[Value::Integer(id)],
    )?;
    Ok(())
}

fn insert_link(db: &Database, table: &TableDescription, left: RowId, right: RowId) -> DbResult<()> {
    let Some(link) = table.link else {
        return Ok(());
    };
    db.execute(
        &format!(
            "INSERT OR IGNORE INTO {} ({}, {}) VALUES (?, ?)",
            table.name, link.left, link.right
        ),
        &[Value::Integer(left), Value::Integer(right)],
    )?;
    Ok(())
}

fn delete_link(db: &Database, table: &TableDescription, left: RowId, right: RowId) -> DbResult<()> {
    let Some(link) = table.link else {
        return Ok(());
    };
    db.execute(
        &format!("DELETE FROM {} WHERE {} = ? AND {} = ?", table.name, link.left, link.right),
        &[Value::Integer(left), Value::Integer(right)],
    )?;
    Ok(())
}

/// Exchanges the live row `cur_id` with its shadow `old_id`.
///
/// The rows trade ids through the negative of `cur_id`, so links keep
/// pointing at `cur_id`. The new live row takes the old live row's flags and
/// the new shadow takes the same flags plus the hidden bit.
fn swap(db: &Database, table: &TableDescription, cur_id: RowId, old_id: RowId) -> DbResult<()> {
    let flag = flag_column(table);
    let id = table.id_column;
    let name = table.name;
    let live_flags = db
        .query_i64(
            &format!("SELECT {flag} FROM {name} WHERE {id} = ?"),
            &[Value::Integer(cur_id)],
        )?
        .unwrap_or(0)
        & !table.flag_value;

    db.execute(
        &format!("UPDATE {name} SET {id} = ? WHERE {id} = ?"),
        &[Value::Integer(-cur_id), Value::Integer(cur_id)],
    )?;
    db.execute(
        &format!("UPDATE {name} SET {id} = ?, {flag} = ? WHERE {id} = ?"),
        &[Value::Integer(cur_id), Value::Integer(live_flags), Value::Integer(old_id)],
    )?;
    db.execute(
        &format!("UPDATE {name} SET {id} = ?, {flag} = ? WHERE {id} = ?"),
        &[
            Value::Integer(old_id),
            Value::Integer(live_flags | HIDDEN),
            Value::Integer(-cur_id),
        ],
    )?;
    Ok(())
}

/// Inserts a hidden copy of row `id` with a fresh id and returns that id.
pub fn copy_for_undo(db: &Database, table: &TableDescription, id: RowId) -> DbResult<RowId> {
    let flag = flag_column(table);
    let columns = table.data_columns.join(", ");
    db.insert(
        &format!(
            "INSERT INTO {name} ({columns}, {flag}) \
             SELECT {columns}, {flag} | {hidden} FROM {name} WHERE {id_col} = ?",
            name = table.name,
            hidden = table.flag_value,
            id_col = table.id_column,
        ),
        &[Value::Integer(id)],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip() {
        for kind in OperationKind::ALL {
            assert_eq!(OperationKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(OperationKind::from_code(99), None);
    }

    #[test]
    fn link_kinds_use_link_tables() {
        for kind in OperationKind::ALL {
            match kind.strategy() {
                OperationStrategy::AddLink(t) | OperationStrategy::DeleteLink(t) => {
                    assert!(t.link.is_some())
                }
                other => assert!(other.table().flag_column.is_some()),
            }
        }
    }

    #[test]
    fn change_swap_is_its_own_inverse() {
        let db = Database::open_in_memory().expect("db");
        let cur = db
            .insert(
                "INSERT INTO tags (tags_name, tags_desc, tags_flags) VALUES ('old', '', 1)",
                &[],
            )
            .expect("insert");
        let shadow = copy_for_undo(&db, &TAGS, cur).expect("copy");
        db.execute("UPDATE tags SET tags_name = 'new' WHERE tags_id = ?", &[Value::Integer(cur)])
            .expect("update");

        let name = |db: &Database| -> String {
            db.conn()
                .query_row("SELECT tags_name FROM tags WHERE tags_id = ?", [cur], |r| r.get(0))
                .expect("name")
        };
        let flags = |db: &Database, id: RowId| -> i64 {
            db.conn()
                .query_row("SELECT tags_flags FROM tags WHERE tags_id = ?", [id], |r| r.get(0))
                .expect("flags")
        };

        let change = OperationStrategy::Change(&TAGS);
        change.undo(&db, cur, shadow).expect("undo");
        assert_eq!(name(&db), "old");
        assert_eq!(flags(&db, cur), 1);
        assert_eq!(flags(&db, shadow), 1 | HIDDEN);

        change.redo(&db, cur, shadow).expect("redo");
        assert_eq!(name(&db), "new");
        assert_eq!(flags(&db, cur), 1);

        change.discard_undo(&db, cur, shadow).expect("discard");
        let count: i64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM tags", [], |r| r.get(0))
            .expect("count");
        assert_eq!(count, 1);
    }
}
