//! Saved views: named filters persisted as their JSON envelope.

use rusqlite::{Row, types::Value};

use crate::db::tables::VIEWS;
use crate::filter::Filter;
use crate::types::RowId;
use crate::undo::OperationKind;

use super::{Catalog, CatalogResult, model::ViewRecord};

impl Catalog {
    /// Saves a view, or renames view `view.id` when it is not zero.
    ///
    /// When another visible view already has the name, `conflict` decides.
    /// A refusal returns 0. Accepting replaces the other view's filter and
    /// description; for a rename the other view is deleted instead.
    pub fn add_view<F>(&mut self, view: &ViewRecord, mut conflict: F) -> CatalogResult<RowId>
    where
        F: FnMut(&ViewRecord) -> bool,
    {
        let name = view.name.trim();
        if name.is_empty() {
            return Ok(0);
        }
        let encoded = view.filter.as_ref().map(Filter::encode).transpose()?;

        self.with_undo("Save view", |catalog| {
            let existing = catalog.find_view(name)?.filter(|existing| existing.id != view.id);
            match (existing, view.id) {
                (None, 0) => catalog.insert_row(
                    OperationKind::AddView,
                    "INSERT INTO views (views_name, views_desc, views_filter) VALUES (?, ?, ?)",
                    &[
                        Value::Text(name.to_string()),
                        Value::Text(view.desc.clone()),
                        encoded.clone().map_or(Value::Null, Value::Text),
                    ],
                ),
                (Some(existing), _) if !conflict(&existing) => Ok(0),
                (Some(existing), 0) => {
                    let filter = encoded.as_deref();
                    catalog.write_view(existing.id, &existing.name, &view.desc, filter)?;
                    Ok(existing.id)
                }
                (existing, id) => {
                    if let Some(existing) = existing {
                        catalog.hide_rows(&VIEWS, OperationKind::DeleteView, &[existing.id])?;
                    }
                    let written = catalog.write_view(id, name, &view.desc, encoded.as_deref())?;
                    Ok(if written { id } else { 0 })
                }
            }
        })
    }

    /// Finds a visible view by name and decodes its filter.
    pub fn find_view(&self, name: &str) -> CatalogResult<Option<ViewRecord>> {
        let sql = format!(
            "SELECT views_id, views_name, views_desc, views_filter FROM views \
             WHERE views_name = ? AND {} ORDER BY views_id LIMIT 1",
            VIEWS.visible_expression(false)
        );
        let mut stmt = self.db.conn().prepare(&sql)?;
        let mut rows = stmt.query_map([name.trim()], read_view)?;
        let Some((id, name, desc, filter)) = rows.next().transpose()? else {
            return Ok(None);
        };
        let filter = match filter {
            Some(text) => Filter::decode(&text)?,
            None => None,
        };
        Ok(Some(ViewRecord {
            id,
            name,
            desc,
            filter,
        }))
    }

    /// Deletes the view named `name`. Returns false when there is none.
    pub fn delete_view(&mut self, name: &str) -> CatalogResult<bool> {
        let Some(view) = self.find_view(name)? else {
            return Ok(false);
        };
        self.with_undo("Delete view", |catalog| {
            Ok(catalog.hide_rows(&VIEWS, OperationKind::DeleteView, &[view.id])? > 0)
        })
    }

    /// Names of every visible view, sorted.
    pub fn view_names(&self) -> CatalogResult<Vec<String>> {
        let mut stmt = self.db.conn().prepare(&format!(
            "SELECT views_name FROM views WHERE {} ORDER BY views_name",
            VIEWS.visible_expression(false)
        ))?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn write_view(
        &mut self,
        id: RowId,
        name: &str,
        desc: &str,
        filter: Option<&str>,
    ) -> CatalogResult<bool> {
        let args = [
            Value::Text(name.to_string()),
            Value::Text(desc.to_string()),
            filter.map_or(Value::Null, |f| Value::Text(f.to_string())),
            Value::Integer(id),
        ];
        let visible = VIEWS.visible_expression(false);
        self.update_row(&VIEWS, OperationKind::ChangeView, id, |db| {
            Ok(db.execute(
                &format!(
                    "UPDATE views SET views_name = ?, views_desc = ?, views_filter = ? \
                     WHERE views_id = ? AND {visible}"
                ),
                &args,
            )?)
        })
    }
}

fn read_view(row: &Row<'_>) -> rusqlite::Result<(RowId, String, String, Option<String>)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}
