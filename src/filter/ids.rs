//! WHERE fragments selecting rows by id list, its inverse, or the marked rows.

use rusqlite::types::Value;

use crate::db::tables::TableDescription;
use crate::types::RowId;

use super::CompiledFilter;

/// Rows an [`IdCondition`] refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdSet {
    /// Rows whose selected flag is set in the condition's domain table.
    Marked,
    Ids(Vec<RowId>),
}

/// One column restricted to an id set.
#[derive(Debug, Clone)]
pub struct IdCondition {
    /// Column compared with the ids.
    pub column: &'static str,
    /// Table the ids belong to; supplies the marked sub-query.
    pub domain: &'static TableDescription,
    pub set: IdSet,
    /// Select the complement of `set`.
    pub invert: bool,
}

impl IdCondition {
    pub fn ids(column: &'static str, domain: &'static TableDescription, ids: Vec<RowId>) -> Self {
        Self {
            column,
            domain,
            set: IdSet::Ids(ids),
            invert: false,
        }
    }

    pub fn marked(column: &'static str, domain: &'static TableDescription) -> Self {
        Self {
            column,
            domain,
            set: IdSet::Marked,
            invert: false,
        }
    }

    pub fn inverted(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }
}

/// A WHERE clause (with its leading ` WHERE `, or empty) and its arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereExpression {
    pub clause: String,
    pub args: Vec<Value>,
}

impl WhereExpression {
    fn push_condition(&mut self, condition: &str) {
        self.clause
            .push_str(if self.clause.is_empty() { " WHERE " } else { " AND " });
        self.clause.push_str(condition);
    }
}

/// Builds the WHERE clause for `table` rows matching every condition.
///
/// Returns `None` when a non-inverted condition has an empty id list, which
/// selects nothing. An inverted empty list adds no restriction. A compiled
/// `filter` restricts the first condition's column (or the table id) to the
/// ids the filter selects. Hidden rows of `table` are always excluded.
pub fn where_for_ids(
    table: &'static TableDescription,
    conditions: &[IdCondition],
    filter: Option<&CompiledFilter>,
) -> Option<WhereExpression> {
    let mut out = WhereExpression::default();

    for condition in conditions {
        match &condition.set {
            IdSet::Marked => {
                let sub = condition.domain.selected_id_subquery(condition.invert);
                out.push_condition(&format!("{} IN ( {sub} )", condition.column));
            }
            IdSet::Ids(ids) if ids.is_empty() => {
                if !condition.invert {
                    return None;
                }
            }
            IdSet::Ids(ids) => {
                let marks = vec!["?"; ids.len()].join(",");
                out.push_condition(&format!(
                    "{} {}IN ({marks})",
                    condition.column,
                    if condition.invert { "NOT " } else { "" },
                ));
                out.args.extend(ids.iter().map(|id| Value::Integer(*id)));
            }
        }
    }

    if let Some(filter) = filter {
        let column = conditions.first().map_or(table.id_column, |c| c.column);
        out.push_condition(&format!("( {column} IN ( {} ) )", filter.command));
        out.args.extend(filter.args.iter().cloned());
    }

    let visible = table.visible_expression(false);
    if !visible.is_empty() {
        out.push_condition(&visible);
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tables::{
        BOOK_TAGS, BOOK_TAGS_BOOK_ID_COLUMN, BOOK_TAGS_TAG_ID_COLUMN, BOOKS, TAGS,
    };

    #[test]
    fn empty_ids_select_nothing_unless_inverted() {
        let empty = IdCondition::ids("books_id", &BOOKS, vec![]);
        assert!(where_for_ids(&BOOKS, &[empty.clone()], None).is_none());
        let everything = where_for_ids(&BOOKS, &[empty.inverted(true)], None).expect("where");
        assert_eq!(everything.clause, " WHERE ( ( books_flags & 2 ) = 0 )");
        assert!(everything.args.is_empty());
    }

    #[test]
    fn id_lists_bind_in_order() {
        let cond = IdCondition::ids("books_id", &BOOKS, vec![3, 1]).inverted(true);
        let expr = where_for_ids(&BOOKS, &[cond], None).expect("where");
        assert_eq!(
            expr.clause,
            " WHERE books_id NOT IN (?,?) AND ( ( books_flags & 2 ) = 0 )"
        );
        assert_eq!(expr.args, vec![Value::Integer(3), Value::Integer(1)]);
    }

    #[test]
    fn link_rows_combine_two_domains() {
        let expr = where_for_ids(
            &BOOK_TAGS,
            &[
                IdCondition::marked(BOOK_TAGS_BOOK_ID_COLUMN, &BOOKS),
                IdCondition::ids(BOOK_TAGS_TAG_ID_COLUMN, &TAGS, vec![9]),
            ],
            Some(&CompiledFilter {
                command: "SELECT books_id FROM books".to_string(),
                args: vec![],
            }),
        )
        .expect("where");
        assert_eq!(
            expr.clause,
            " WHERE book_tags_book_id IN \
             ( SELECT books_id FROM books WHERE ( ( books_flags & 1 ) != 0 ) ) \
             AND book_tags_tag_id IN (?) \
             AND ( book_tags_book_id IN ( SELECT books_id FROM books ) )"
        );
        assert_eq!(expr.args, vec![Value::Integer(9)]);
    }
}
