//! Find-or-add for authors, categories, tags and ISBNs, and their book links.

use rusqlite::types::Value;

use crate::db::tables::{
    AUTHORS, BOOK_AUTHORS, BOOK_CATEGORIES, BOOK_ISBNS, BOOK_TAGS, BOOKS, CATEGORIES, ISBNS, TAGS,
    TableDescription,
};
use crate::types::{BookId, RowId};
use crate::undo::OperationKind;

use super::{
    Catalog, CatalogResult,
    model::{AuthorName, AuthorRecord, CategoryRecord, IsbnRecord},
};

/// One lookup table with its link table and operation kinds.
struct Lookup {
    table: &'static TableDescription,
    link: &'static TableDescription,
    /// Undo description when a row is added on its own.
    description: &'static str,
    add: OperationKind,
    /// Kind recorded when a row no book links to is dropped. Tags outlive
    /// their books and have none.
    drop_unused: Option<OperationKind>,
    add_link: OperationKind,
    delete_link: OperationKind,
}

static AUTHOR_LOOKUP: Lookup = Lookup {
    table: &AUTHORS,
    link: &BOOK_AUTHORS,
    description: "Add author",
    add: OperationKind::AddAuthor,
    drop_unused: Some(OperationKind::DeleteAuthor),
    add_link: OperationKind::AddBookAuthor,
    delete_link: OperationKind::DeleteBookAuthor,
};
static CATEGORY_LOOKUP: Lookup = Lookup {
    table: &CATEGORIES,
    link: &BOOK_CATEGORIES,
    description: "Add category",
    add: OperationKind::AddCategory,
    drop_unused: Some(OperationKind::DeleteCategory),
    add_link: OperationKind::AddBookCategory,
    delete_link: OperationKind::DeleteBookCategory,
};
static ISBN_LOOKUP: Lookup = Lookup {
    table: &ISBNS,
    link: &BOOK_ISBNS,
    description: "Add ISBN",
    add: OperationKind::AddIsbn,
    drop_unused: Some(OperationKind::DeleteIsbn),
    add_link: OperationKind::AddBookIsbn,
    delete_link: OperationKind::DeleteBookIsbn,
};
static TAG_LOOKUP: Lookup = Lookup {
    table: &TAGS,
    link: &BOOK_TAGS,
    description: "Add tag",
    add: OperationKind::AddTag,
    drop_unused: None,
    add_link: OperationKind::AddBookTag,
    delete_link: OperationKind::DeleteBookTag,
};

impl Catalog {
    /// Returns the id of the visible author with this name, adding one when
    /// none exists. Names compare without case.
    pub fn find_or_add_author(&mut self, name: &AuthorName) -> CatalogResult<RowId> {
        let last = name.last_name.trim();
        let remaining = name.remaining.trim();
        self.find_or_add(
            &AUTHOR_LOOKUP,
            "last_name = ? AND remaining = ?",
            "INSERT INTO authors (last_name, remaining) VALUES (?, ?)",
            &[Value::Text(last.to_string()), Value::Text(remaining.to_string())],
        )
    }

    pub fn find_or_add_category(&mut self, category: &str) -> CatalogResult<RowId> {
        self.find_or_add(
            &CATEGORY_LOOKUP,
            "category = ?",
            "INSERT INTO categories (category) VALUES (?)",
            &[Value::Text(category.trim().to_string())],
        )
    }

    pub fn find_or_add_isbn(&mut self, isbn: &str) -> CatalogResult<RowId> {
        self.find_or_add(
            &ISBN_LOOKUP,
            "isbn = ?",
            "INSERT INTO isbns (isbn) VALUES (?)",
            &[Value::Text(isbn.trim().to_string())],
        )
    }

    pub fn find_or_add_tag(&mut self, name: &str) -> CatalogResult<RowId> {
        self.find_or_add(
            &TAG_LOOKUP,
            "tags_name = ?",
            "INSERT INTO tags (tags_name) VALUES (?)",
            &[Value::Text(name.trim().to_string())],
        )
    }

    /// Replaces the authors linked to `book_id`.
    pub fn set_book_authors(
        &mut self,
        book_id: BookId,
        authors: &[AuthorName],
    ) -> CatalogResult<()> {
        self.with_undo("Set authors", |catalog| {
            let mut ids = Vec::with_capacity(authors.len());
            for author in authors.iter().filter(|a| !a.last_name.trim().is_empty()) {
                ids.push(catalog.find_or_add_author(author)?);
            }
            catalog.relink(&AUTHOR_LOOKUP, book_id, &ids)
        })
    }

    pub fn set_book_categories(
        &mut self,
        book_id: BookId,
        categories: &[String],
    ) -> CatalogResult<()> {
        self.with_undo("Set categories", |catalog| {
            let mut ids = Vec::with_capacity(categories.len());
            for category in categories.iter().filter(|c| !c.trim().is_empty()) {
                ids.push(catalog.find_or_add_category(category)?);
            }
            catalog.relink(&CATEGORY_LOOKUP, book_id, &ids)
        })
    }

    pub fn set_book_isbns(&mut self, book_id: BookId, isbns: &[String]) -> CatalogResult<()> {
        self.with_undo("Set ISBNs", |catalog| {
            let mut ids = Vec::with_capacity(isbns.len());
            for isbn in isbns.iter().filter(|i| !i.trim().is_empty()) {
                ids.push(catalog.find_or_add_isbn(isbn)?);
            }
            catalog.relink(&ISBN_LOOKUP, book_id, &ids)
        })
    }

    pub fn set_book_tags(&mut self, book_id: BookId, tags: &[String]) -> CatalogResult<()> {
        self.with_undo("Set tags", |catalog| {
            let mut ids = Vec::with_capacity(tags.len());
            for tag in tags.iter().filter(|t| !t.trim().is_empty()) {
                ids.push(catalog.find_or_add_tag(tag)?);
            }
            catalog.relink(&TAG_LOOKUP, book_id, &ids)
        })
    }

    pub fn book_authors(&self, book_id: BookId) -> CatalogResult<Vec<AuthorRecord>> {
        let mut stmt = self.db.conn().prepare(
            "SELECT authors_id, last_name, remaining FROM authors \
             JOIN book_authors ON book_authors_author_id = authors_id \
             WHERE book_authors_book_id = ? AND ( ( authors_flags & 2 ) = 0 ) \
             ORDER BY book_authors_id",
        )?;
        let rows = stmt.query_map([book_id], |row| {
            Ok(AuthorRecord {
                id: row.get(0)?,
                last_name: row.get(1)?,
                remaining: row.get(2)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn book_categories(&self, book_id: BookId) -> CatalogResult<Vec<CategoryRecord>> {
        let mut stmt = self.db.conn().prepare(
            "SELECT categories_id, category FROM categories \
             JOIN book_categories ON book_categories_category_id = categories_id \
             WHERE book_categories_book_id = ? AND ( ( categories_flags & 2 ) = 0 ) \
             ORDER BY book_categories_id",
        )?;
        let rows = stmt.query_map([book_id], |row| {
            Ok(CategoryRecord {
                id: row.get(0)?,
                category: row.get(1)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn book_isbns(&self, book_id: BookId) -> CatalogResult<Vec<IsbnRecord>> {
        let mut stmt = self.db.conn().prepare(
            "SELECT isbns_id, isbn FROM isbns \
             JOIN book_isbns ON book_isbns_isbn_id = isbns_id \
             WHERE book_isbns_book_id = ? AND ( ( isbns_flags & 2 ) = 0 ) \
             ORDER BY book_isbns_id",
        )?;
        let rows = stmt.query_map([book_id], |row| {
            Ok(IsbnRecord {
                id: row.get(0)?,
                isbn: row.get(1)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Removes every link from `book_ids` into the lookup tables, then drops
    /// the authors, categories and ISBNs no other visible book links to.
    pub(crate) fn unlink_book_lookups(&mut self, book_ids: &[BookId]) -> CatalogResult<()> {
        for lookup in [&AUTHOR_LOOKUP, &CATEGORY_LOOKUP, &TAG_LOOKUP, &ISBN_LOOKUP] {
            let Some(columns) = lookup.link.link else {
                continue;
            };
            let mut linked = Vec::new();
            for &book_id in book_ids {
                let book = [Value::Integer(book_id)];
                let clause = format!("{} = ?", columns.left);
                linked.extend(self.db.query_ids(
                    &format!("SELECT {} FROM {} WHERE {clause}", columns.right, lookup.link.name),
                    &book,
                )?);
                self.unlink_where(lookup.link, lookup.delete_link, &clause, &book)?;
            }
            self.drop_unused(lookup, &linked)?;
        }
        Ok(())
    }

    fn find_or_add(
        &mut self,
        lookup: &Lookup,
        matches: &str,
        insert: &str,
        args: &[Value],
    ) -> CatalogResult<RowId> {
        let table = lookup.table;
        let existing = self.db.query_i64(
            &format!(
                "SELECT {} FROM {} WHERE {matches} AND {} ORDER BY {} LIMIT 1",
                table.id_column,
                table.name,
                table.visible_expression(false),
                table.id_column
            ),
            args,
        )?;
        if let Some(id) = existing {
            return Ok(id);
        }
        self.with_undo(lookup.description, |catalog| {
            catalog.insert_row(lookup.add, insert, args)
        })
    }

    /// Makes the links from `book_id` into `lookup` exactly `ids`.
    fn relink(&mut self, lookup: &Lookup, book_id: BookId, ids: &[RowId]) -> CatalogResult<()> {
        let Some(columns) = lookup.link.link else {
            return Ok(());
        };
        let current = self.db.query_ids(
            &format!(
                "SELECT {} FROM {} WHERE {} = ?",
                columns.right, lookup.link.name, columns.left
            ),
            &[Value::Integer(book_id)],
        )?;
        let dropped: Vec<RowId> = current.into_iter().filter(|id| !ids.contains(id)).collect();
        for &id in &dropped {
            self.unlink_where(
                lookup.link,
                lookup.delete_link,
                &format!("{} = ? AND {} = ?", columns.left, columns.right),
                &[Value::Integer(book_id), Value::Integer(id)],
            )?;
        }
        for &id in ids {
            self.link(lookup.link, lookup.add_link, book_id, id)?;
        }
        self.drop_unused(lookup, &dropped)?;
        Ok(())
    }

    /// Hides the rows among `candidates` that no visible book links to.
    fn drop_unused(&mut self, lookup: &Lookup, candidates: &[RowId]) -> CatalogResult<usize> {
        let (Some(kind), Some(columns)) = (lookup.drop_unused, lookup.link.link) else {
            return Ok(0);
        };
        let in_use = format!(
            "SELECT 1 FROM {link} JOIN books ON books_id = {left} \
             WHERE {right} = ? AND {visible} LIMIT 1",
            link = lookup.link.name,
            left = columns.left,
            right = columns.right,
            visible = BOOKS.visible_expression(false),
        );
        let mut unused = Vec::new();
        for &id in candidates {
            if unused.contains(&id) {
                continue;
            }
            if self.db.query_i64(&in_use, &[Value::Integer(id)])?.is_none() {
                unused.push(id);
            }
        }
        if unused.is_empty() {
            return Ok(0);
        }
        tracing::debug!(table = lookup.table.name, count = unused.len(), "dropping unused rows");
        self.hide_rows(lookup.table, kind, &unused)
    }
}
