//! Tag maintenance: add, rename, merge, delete and book tagging.

use rusqlite::{Row, types::Value};

use crate::db::tables::{BOOK_TAGS, BOOK_TAGS_BOOK_ID_COLUMN, BOOK_TAGS_TAG_ID_COLUMN, BOOKS, TAGS};
use crate::filter::ids::{IdCondition, IdSet, where_for_ids};
use crate::types::{BookId, RowId};
use crate::undo::OperationKind;

use super::{Catalog, CatalogResult, model::TagRecord};

const TAG_COLUMNS: &str = "tags_id, tags_name, tags_desc, tags_flags";

impl Catalog {
    /// Adds a tag, or renames tag `tag.id` when it is not zero.
    ///
    /// When another visible tag already has the name, `conflict` decides.
    /// A refusal returns 0. Accepting for a new tag updates the existing
    /// tag's description. Accepting for a rename merges the two tags: the
    /// one linked to more books survives, takes the new name and every link
    /// of the other, and the other is deleted. Returns the surviving id.
    pub fn add_tag<F>(&mut self, tag: &TagRecord, mut conflict: F) -> CatalogResult<RowId>
    where
        F: FnMut(&TagRecord) -> bool,
    {
        let name = tag.name.trim();
        if name.is_empty() {
            return Ok(0);
        }

        self.with_undo("Add tag", |catalog| {
            let existing = catalog
                .find_tag_by_name(name)?
                .filter(|existing| existing.id != tag.id);

            match (existing, tag.id) {
                (None, 0) => catalog.insert_row(
                    OperationKind::AddTag,
                    "INSERT INTO tags (tags_name, tags_desc) VALUES (?, ?)",
                    &[Value::Text(name.to_string()), Value::Text(tag.desc.clone())],
                ),
                (None, id) => {
                    let renamed = catalog.write_tag(id, name, &tag.desc)?;
                    Ok(if renamed { id } else { 0 })
                }
                (Some(existing), _) if !conflict(&existing) => Ok(0),
                (Some(existing), 0) => {
                    catalog.write_tag(existing.id, &existing.name, &tag.desc)?;
                    Ok(existing.id)
                }
                (Some(existing), id) => catalog.merge_tags(id, existing.id, name, &tag.desc),
            }
        })
    }

    /// Deletes tags and their book links. Returns the number of tags deleted.
    pub fn delete_tags(&mut self, ids: &[RowId]) -> CatalogResult<usize> {
        self.with_undo("Delete tags", |catalog| {
            for &id in ids {
                catalog.unlink_where(
                    &BOOK_TAGS,
                    OperationKind::DeleteBookTag,
                    &format!("{BOOK_TAGS_TAG_ID_COLUMN} = ?"),
                    &[Value::Integer(id)],
                )?;
            }
            catalog.hide_rows(&TAGS, OperationKind::DeleteTag, ids)
        })
    }

    /// Finds a visible tag by name, ignoring case and surrounding space.
    pub fn find_tag_by_name(&self, name: &str) -> CatalogResult<Option<TagRecord>> {
        let sql = format!(
            "SELECT {TAG_COLUMNS} FROM tags WHERE tags_name = ? AND {} ORDER BY tags_id LIMIT 1",
            TAGS.visible_expression(false)
        );
        let mut stmt = self.db.conn().prepare(&sql)?;
        let mut rows = stmt.query_map([name.trim()], read_tag)?;
        Ok(rows.next().transpose()?)
    }

    pub fn get_tag(&self, id: RowId) -> CatalogResult<Option<TagRecord>> {
        let sql = format!(
            "SELECT {TAG_COLUMNS} FROM tags WHERE tags_id = ? AND {}",
            TAGS.visible_expression(false)
        );
        let mut stmt = self.db.conn().prepare(&sql)?;
        let mut rows = stmt.query_map([id], read_tag)?;
        Ok(rows.next().transpose()?)
    }

    /// Every visible tag, by name.
    pub fn tags(&self) -> CatalogResult<Vec<TagRecord>> {
        let sql = format!(
            "SELECT {TAG_COLUMNS} FROM tags WHERE {} ORDER BY tags_name",
            TAGS.visible_expression(false)
        );
        let mut stmt = self.db.conn().prepare(&sql)?;
        let rows = stmt.query_map([], read_tag)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn book_tags(&self, book_id: BookId) -> CatalogResult<Vec<TagRecord>> {
        let sql = format!(
            "SELECT {TAG_COLUMNS} FROM tags \
             JOIN book_tags ON {BOOK_TAGS_TAG_ID_COLUMN} = tags_id \
             WHERE {BOOK_TAGS_BOOK_ID_COLUMN} = ? AND {} ORDER BY book_tags_id",
            TAGS.visible_expression(false)
        );
        let mut stmt = self.db.conn().prepare(&sql)?;
        let rows = stmt.query_map([book_id], read_tag)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Number of visible books linked to tag `id`.
    pub fn tag_book_count(&self, id: RowId) -> CatalogResult<i64> {
        Ok(self
            .db
            .query_i64(
                &format!(
                    "SELECT count(*) FROM book_tags \
                     JOIN books ON books_id = {BOOK_TAGS_BOOK_ID_COLUMN} \
                     WHERE {BOOK_TAGS_TAG_ID_COLUMN} = ? AND {}",
                    BOOKS.visible_expression(false)
                ),
                &[Value::Integer(id)],
            )?
            .unwrap_or(0))
    }

    /// Links every book in `books` to every tag in `tag_ids`. Returns the
    /// number of new links.
    pub fn tag_books(&mut self, books: IdSet, tag_ids: &[RowId]) -> CatalogResult<usize> {
        self.with_undo("Tag books", |catalog| {
            let book_ids = catalog.resolve_books(books)?;
            let mut added = 0;
            for &book in &book_ids {
                for &tag in tag_ids {
                    if catalog.link(&BOOK_TAGS, OperationKind::AddBookTag, book, tag)? {
                        added += 1;
                    }
                }
            }
            Ok(added)
        })
    }

    /// Removes the links between `books` and `tags`. Returns the number of
    /// links removed.
    pub fn untag_books(&mut self, books: IdSet, tags: IdSet) -> CatalogResult<usize> {
        let conditions = [
            IdCondition {
                column: BOOK_TAGS_BOOK_ID_COLUMN,
                domain: &BOOKS,
                set: books,
                invert: false,
            },
            IdCondition {
                column: BOOK_TAGS_TAG_ID_COLUMN,
                domain: &TAGS,
                set: tags,
                invert: false,
            },
        ];
        let Some(expr) = where_for_ids(&BOOK_TAGS, &conditions, None) else {
            return Ok(0);
        };
        let Some(clause) = expr.clause.strip_prefix(" WHERE ") else {
            return Ok(0);
        };
        let clause = clause.to_string();
        self.with_undo("Untag books", |catalog| {
            catalog.unlink_where(&BOOK_TAGS, OperationKind::DeleteBookTag, &clause, &expr.args)
        })
    }

    fn write_tag(&mut self, id: RowId, name: &str, desc: &str) -> CatalogResult<bool> {
        let args = [
            Value::Text(name.to_string()),
            Value::Text(desc.to_string()),
            Value::Integer(id),
        ];
        let visible = TAGS.visible_expression(false);
        self.update_row(&TAGS, OperationKind::ChangeTag, id, |db| {
            Ok(db.execute(
                &format!(
                    "UPDATE tags SET tags_name = ?, tags_desc = ? WHERE tags_id = ? AND {visible}"
                ),
                &args,
            )?)
        })
    }

    /// Folds tags `renamed` and `existing` into one named `name`.
    fn merge_tags(
        &mut self,
        renamed: RowId,
        existing: RowId,
        name: &str,
        desc: &str,
    ) -> CatalogResult<RowId> {
        let (keep, drop) = if self.tag_book_count(renamed)? > self.tag_book_count(existing)? {
            (renamed, existing)
        } else {
            (existing, renamed)
        };
        tracing::debug!(keep, drop, "merging tags");

        let books = self.db.query_ids(
            &format!(
                "SELECT {BOOK_TAGS_BOOK_ID_COLUMN} FROM book_tags \
                 WHERE {BOOK_TAGS_TAG_ID_COLUMN} = ?"
            ),
            &[Value::Integer(drop)],
        )?;
        self.unlink_where(
            &BOOK_TAGS,
            OperationKind::DeleteBookTag,
            &format!("{BOOK_TAGS_TAG_ID_COLUMN} = ?"),
            &[Value::Integer(drop)],
        )?;
        for book in books {
            self.link(&BOOK_TAGS, OperationKind::AddBookTag, book, keep)?;
        }
        self.hide_rows(&TAGS, OperationKind::DeleteTag, &[drop])?;
        self.write_tag(keep, name, desc)?;
        Ok(keep)
    }
}

fn read_tag(row: &Row<'_>) -> rusqlite::Result<TagRecord> {
    Ok(TagRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        desc: row.get(2)?,
        flags: row.get(3)?,
    })
}
