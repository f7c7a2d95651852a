//! Book rows: add, replace, update, delete and query.

use hashbrown::HashSet;
use rusqlite::{Row, params_from_iter, types::Value};

use crate::db::tables::{ALL_BOOK_COLUMNS, BOOKS, BOOKS_ID_COLUMN, SELECTED};
use crate::filter::{
    CompiledFilter, Filter, compile, compile_select,
    ids::{IdCondition, IdSet, where_for_ids},
};
use crate::types::{BookId, RowId};
use crate::undo::OperationKind;

use super::{
    Catalog, CatalogResult, now_ms,
    model::{BookAndAuthors, BookDraft, BookRecord},
};

impl Catalog {
    /// Adds a book with its authors, categories, tags and ISBNs.
    ///
    /// When a visible book has the same volume and source id, `conflict` is
    /// asked whether to replace it. A refusal returns 0; an accepted
    /// replacement returns the existing book's id.
    pub fn add_book<F>(&mut self, draft: &BookDraft, mut conflict: F) -> CatalogResult<BookId>
    where
        F: FnMut(&BookRecord) -> bool,
    {
        self.with_undo("Add book", |catalog| {
            if let Some(existing) = catalog.find_conflicting_book(draft)? {
                if !conflict(&existing) {
                    tracing::debug!(book_id = existing.id, "add book refused by conflict handler");
                    return Ok(0);
                }
                catalog.write_book(existing.id, draft)?;
                catalog.set_book_relations(existing.id, draft)?;
                return Ok(existing.id);
            }

            let now = now_ms();
            let series = catalog.draft_series(draft)?;
            let mut args = book_values(draft, series);
            args.push(Value::Integer(draft.date_added.unwrap_or(now)));
            args.push(Value::Integer(now));
            let id = catalog.insert_row(
                OperationKind::AddBook,
                "INSERT INTO books (volume_id, source_id, title, subtitle, description, \
                 page_count, book_count, rating, book_series_id, date_added, date_modified) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                &args,
            )?;
            catalog.set_book_relations(id, draft)?;
            Ok(id)
        })
    }

    /// Replaces the fields and relations of book `id`.
    ///
    /// Returns false when the book does not exist or is hidden.
    pub fn update_book(&mut self, id: BookId, draft: &BookDraft) -> CatalogResult<bool> {
        self.with_undo("Update book", |catalog| {
            if catalog.get_book(id)?.is_none() {
                return Ok(false);
            }
            catalog.write_book(id, draft)?;
            catalog.set_book_relations(id, draft)?;
            Ok(true)
        })
    }

    /// Deletes the books in `ids` that `filter` also selects, together with
    /// their links. Returns the number of books deleted.
    pub fn delete_books(&mut self, ids: IdSet, filter: Option<&Filter>) -> CatalogResult<usize> {
        let compiled = compile_select(filter, &self.locale, &[BOOKS_ID_COLUMN], true);
        let condition = IdCondition {
            column: BOOKS_ID_COLUMN,
            domain: &BOOKS,
            set: ids,
            invert: false,
        };
        let Some(expr) = where_for_ids(&BOOKS, &[condition], compiled.as_ref()) else {
            return Ok(0);
        };

        self.with_undo("Delete books", |catalog| {
            let targets = catalog.db.query_ids(
                &format!("SELECT {BOOKS_ID_COLUMN} FROM books{}", expr.clause),
                &expr.args,
            )?;
            catalog.unlink_book_lookups(&targets)?;
            let count = catalog.hide_rows(&BOOKS, OperationKind::DeleteBook, &targets)?;
            catalog.drop_unused_series()?;
            tracing::debug!(count, "books deleted");
            Ok(count)
        })
    }

    /// Returns the visible book `id`.
    pub fn get_book(&self, id: BookId) -> CatalogResult<Option<BookRecord>> {
        let sql = format!(
            "SELECT {} FROM books WHERE {BOOKS_ID_COLUMN} = ? AND {}",
            ALL_BOOK_COLUMNS.join(", "),
            BOOKS.visible_expression(false)
        );
        let mut stmt = self.db.conn().prepare(&sql)?;
        let mut rows = stmt.query_map([id], read_book)?;
        Ok(rows.next().transpose()?)
    }

    pub fn get_book_and_authors(&self, id: BookId) -> CatalogResult<Option<BookAndAuthors>> {
        let Some(book) = self.get_book(id)? else {
            return Ok(None);
        };
        Ok(Some(BookAndAuthors {
            authors: self.book_authors(id)?,
            categories: self.book_categories(id)?,
            tags: self.book_tags(id)?,
            isbns: self.book_isbns(id)?,
            series: self.book_series(id)?,
            book,
        }))
    }

    /// Ids of the visible books `filter` selects, in its order.
    pub fn book_ids(&self, filter: Option<&Filter>) -> CatalogResult<Vec<BookId>> {
        let compiled = compile_select(filter, &self.locale, &[BOOKS_ID_COLUMN], false)
            .unwrap_or_else(|| CompiledFilter {
                command: format!(
                    "SELECT {BOOKS_ID_COLUMN} FROM books WHERE {}",
                    BOOKS.visible_expression(false)
                ),
                args: Vec::new(),
            });
        let ids = self.db.query_ids(&compiled.command, &compiled.args)?;
        Ok(dedup_ids(ids, |id| *id))
    }

    /// Books `filter` selects, in its order.
    pub fn query_books(&self, filter: &Filter) -> CatalogResult<Vec<BookRecord>> {
        let compiled = compile(filter, &BOOKS, &self.locale);
        let mut stmt = self.db.conn().prepare(&compiled.command)?;
        let rows = stmt.query_map(params_from_iter(compiled.args.iter()), read_book)?;
        let mut books = Vec::new();
        for row in rows {
            books.push(row?);
        }
        Ok(dedup_ids(books, |book| book.id))
    }

    /// Sets or clears the marked flag on `ids`. Marking is not undoable.
    pub fn set_selected(&mut self, ids: &[BookId], selected: bool) -> CatalogResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let marks = vec!["?"; ids.len()].join(",");
        let update = if selected {
            format!("books_flags | {SELECTED}")
        } else {
            format!("books_flags & ~{SELECTED}")
        };
        let args: Vec<Value> = ids.iter().map(|id| Value::Integer(*id)).collect();
        Ok(self.db.execute(
            &format!(
                "UPDATE books SET books_flags = {update} \
                 WHERE {BOOKS_ID_COLUMN} IN ({marks}) AND {}",
                BOOKS.visible_expression(false)
            ),
            &args,
        )?)
    }

    /// Ids of the visible books in `ids`.
    pub(super) fn resolve_books(&self, ids: IdSet) -> CatalogResult<Vec<BookId>> {
        let condition = IdCondition {
            column: BOOKS_ID_COLUMN,
            domain: &BOOKS,
            set: ids,
            invert: false,
        };
        let Some(expr) = where_for_ids(&BOOKS, &[condition], None) else {
            return Ok(Vec::new());
        };
        Ok(self.db.query_ids(
            &format!("SELECT {BOOKS_ID_COLUMN} FROM books{}", expr.clause),
            &expr.args,
        )?)
    }

    fn find_conflicting_book(&self, draft: &BookDraft) -> CatalogResult<Option<BookRecord>> {
        let (Some(volume), Some(source)) =
            (draft.volume_id.as_deref(), draft.source_id.as_deref())
        else {
            return Ok(None);
        };
        if volume.is_empty() || source.is_empty() {
            return Ok(None);
        }
        let id = self.db.query_i64(
            &format!(
                "SELECT {BOOKS_ID_COLUMN} FROM books WHERE volume_id = ? AND source_id = ? AND {} \
                 ORDER BY {BOOKS_ID_COLUMN} LIMIT 1",
                BOOKS.visible_expression(false)
            ),
            &[Value::Text(volume.to_string()), Value::Text(source.to_string())],
        )?;
        match id {
            Some(id) => self.get_book(id),
            None => Ok(None),
        }
    }

    /// Overwrites the row of book `id`, keeping a shadow for undo.
    fn write_book(&mut self, id: BookId, draft: &BookDraft) -> CatalogResult<bool> {
        let series = self.draft_series(draft)?;
        let mut args = book_values(draft, series);
        args.push(draft.date_added.map_or(Value::Null, Value::Integer));
        args.push(Value::Integer(now_ms()));
        args.push(Value::Integer(id));
        let written = self.update_row(&BOOKS, OperationKind::ChangeBook, id, |db| {
            Ok(db.execute(
                "UPDATE books SET volume_id = ?, source_id = ?, title = ?, subtitle = ?, \
                 description = ?, page_count = ?, book_count = ?, rating = ?, \
                 book_series_id = ?, date_added = coalesce(?, date_added), date_modified = ? \
                 WHERE books_id = ?",
                &args,
            )?)
        })?;
        self.drop_unused_series()?;
        Ok(written)
    }

    /// Row id of the draft's series, adding it when needed. 0 for none.
    fn draft_series(&mut self, draft: &BookDraft) -> CatalogResult<RowId> {
        match &draft.series {
            Some(series) => self.find_or_add_series(series),
            None => Ok(0),
        }
    }

    fn set_book_relations(&mut self, id: BookId, draft: &BookDraft) -> CatalogResult<()> {
        self.set_book_authors(id, &draft.authors)?;
        self.set_book_categories(id, &draft.categories)?;
        self.set_book_tags(id, &draft.tags)?;
        self.set_book_isbns(id, &draft.isbns)
    }
}

fn book_values(draft: &BookDraft, series: RowId) -> Vec<Value> {
    let text = |s: &Option<String>| s.clone().map_or(Value::Null, Value::Text);
    vec![
        text(&draft.volume_id),
        text(&draft.source_id),
        Value::Text(draft.title.clone()),
        Value::Text(draft.subtitle.clone()),
        Value::Text(draft.description.clone()),
        Value::Integer(draft.page_count),
        Value::Integer(draft.book_count),
        Value::Real(draft.rating),
        Value::Integer(series),
    ]
}

/// Reads a row selected with [`ALL_BOOK_COLUMNS`].
fn read_book(row: &Row<'_>) -> rusqlite::Result<BookRecord> {
    Ok(BookRecord {
        id: row.get(0)?,
        volume_id: row.get(1)?,
        source_id: row.get(2)?,
        title: row.get(3)?,
        subtitle: row.get(4)?,
        description: row.get(5)?,
        page_count: row.get(6)?,
        book_count: row.get(7)?,
        rating: row.get(8)?,
        date_added: row.get(9)?,
        date_modified: row.get(10)?,
        flags: row.get(11)?,
        series: row.get(12)?,
    })
}

/// Drops repeats that joins for ordering produce, keeping the first.
fn dedup_ids<T>(items: Vec<T>, id: impl Fn(&T) -> BookId) -> Vec<T> {
    let mut seen = HashSet::with_capacity(items.len());
    items.into_iter().filter(|item| seen.insert(id(item))).collect()
}
