//! Series rows referenced from books.

use rusqlite::{Row, types::Value};

use crate::db::tables::{BOOKS, SERIES};
use crate::types::{BookId, RowId};
use crate::undo::OperationKind;

use super::{Catalog, CatalogResult, model::SeriesRecord};

const SERIES_COLUMNS: &str = "series_id, series_series_id, series_title";

impl Catalog {
    /// Returns the id of the visible series with `series.series_id`, adding
    /// one when none exists. A different title replaces the stored one.
    ///
    /// Returns 0 for an empty series id.
    pub fn find_or_add_series(&mut self, series: &SeriesRecord) -> CatalogResult<RowId> {
        let key = series.series_id.trim();
        if key.is_empty() {
            return Ok(0);
        }
        let title = series.title.trim();

        self.with_undo("Add series", |catalog| {
            let Some(existing) = catalog.find_series(key)? else {
                return catalog.insert_row(
                    OperationKind::AddSeries,
                    "INSERT INTO series (series_series_id, series_title) VALUES (?, ?)",
                    &[Value::Text(key.to_string()), Value::Text(title.to_string())],
                );
            };
            if existing.title == title {
                return Ok(existing.id);
            }
            let args = [Value::Text(title.to_string()), Value::Integer(existing.id)];
            let changed =
                catalog.update_row(&SERIES, OperationKind::ChangeSeries, existing.id, |db| {
                    Ok(db.execute("UPDATE series SET series_title = ? WHERE series_id = ?", &args)?)
                })?;
            Ok(if changed { existing.id } else { 0 })
        })
    }

    /// Finds the visible series with the external id `series_id`.
    pub fn find_series(&self, series_id: &str) -> CatalogResult<Option<SeriesRecord>> {
        self.query_series(
            &format!(
                "SELECT {SERIES_COLUMNS} FROM series WHERE series_series_id = ? AND {} \
                 ORDER BY series_id LIMIT 1",
                SERIES.visible_expression(false)
            ),
            &[Value::Text(series_id.to_string())],
        )
        .map(|mut found| found.pop())
    }

    pub fn get_series(&self, id: RowId) -> CatalogResult<Option<SeriesRecord>> {
        self.query_series(
            &format!(
                "SELECT {SERIES_COLUMNS} FROM series WHERE series_id = ? AND {}",
                SERIES.visible_expression(false)
            ),
            &[Value::Integer(id)],
        )
        .map(|mut found| found.pop())
    }

    /// Every visible series, by title.
    pub fn all_series(&self) -> CatalogResult<Vec<SeriesRecord>> {
        self.query_series(
            &format!(
                "SELECT {SERIES_COLUMNS} FROM series WHERE {} ORDER BY series_title, series_id",
                SERIES.visible_expression(false)
            ),
            &[],
        )
    }

    /// Series of the visible book `book_id`.
    pub fn book_series(&self, book_id: BookId) -> CatalogResult<Option<SeriesRecord>> {
        self.query_series(
            &format!(
                "SELECT {SERIES_COLUMNS} FROM series JOIN books ON book_series_id = series_id \
                 WHERE books_id = ? AND {} AND {}",
                BOOKS.visible_expression(false),
                SERIES.visible_expression(false)
            ),
            &[Value::Integer(book_id)],
        )
        .map(|mut found| found.pop())
    }

    /// Hides every visible series that no visible book refers to.
    pub(super) fn drop_unused_series(&mut self) -> CatalogResult<usize> {
        let unused = self.db.query_ids(
            &format!(
                "SELECT series_id FROM series WHERE {} AND NOT EXISTS \
                 ( SELECT NULL FROM books WHERE book_series_id = series_id AND {} )",
                SERIES.visible_expression(false),
                BOOKS.visible_expression(false)
            ),
            &[],
        )?;
        if unused.is_empty() {
            return Ok(0);
        }
        tracing::debug!(count = unused.len(), "dropping unused series");
        self.hide_rows(&SERIES, OperationKind::DeleteSeries, &unused)
    }

    fn query_series(&self, sql: &str, args: &[Value]) -> CatalogResult<Vec<SeriesRecord>> {
        let mut stmt = self.db.conn().prepare(sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(args.iter()), read_series)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }
}

fn read_series(row: &Row<'_>) -> rusqlite::Result<SeriesRecord> {
    Ok(SeriesRecord {
        id: row.get(0)?,
        series_id: row.get(1)?,
        title: row.get(2)?,
    })
}
