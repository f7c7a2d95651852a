//! Query builder driven by column and predicate strategies.

use hashbrown::HashSet;
use rusqlite::types::Value;

use crate::db::tables::{ALL_BOOK_COLUMNS, BOOKS, TableDescription};

use super::{CompiledFilter, Filter, FilterField, Order, OrderField, date::DateLocale};

/// Accumulates the pieces of one parameterized SELECT.
///
/// `add_select`, `add_join` and `add_order_column` are idempotent. Filter
/// fields go through `begin_filter_field`, `add_filter_expression`,
/// `wrap_filter_expression` and `end_filter_field`; a field that never ends
/// is dropped with its bound arguments by the next `begin_filter_field`.
pub struct QueryBuilder<'a> {
    table: &'static TableDescription,
    locale: &'a DateLocale,
    selects: Vec<String>,
    seen_selects: HashSet<String>,
    joins: Vec<String>,
    seen_joins: HashSet<String>,
    orders: Vec<String>,
    seen_orders: HashSet<String>,
    where_expr: String,
    field_expr: String,
    args: Vec<Value>,
    arg_rollback: usize,
}

impl<'a> QueryBuilder<'a> {
    /// Creates a builder whose WHERE starts with `table`'s visible rows.
    pub fn new(table: &'static TableDescription, locale: &'a DateLocale) -> Self {
        Self {
            table,
            locale,
            selects: Vec::new(),
            seen_selects: HashSet::new(),
            joins: Vec::new(),
            seen_joins: HashSet::new(),
            orders: Vec::new(),
            seen_orders: HashSet::new(),
            where_expr: table.visible_expression(false),
            field_expr: String::new(),
            args: Vec::new(),
            arg_rollback: 0,
        }
    }

    pub fn table(&self) -> &'static TableDescription {
        self.table
    }

    pub fn locale(&self) -> &'a DateLocale {
        self.locale
    }

    pub fn add_select(&mut self, name: &str) {
        if self.seen_selects.insert(name.to_string()) {
            self.selects.push(name.to_string());
        }
    }

    /// Adds `LEFT JOIN table ON left = right`. Only the first join for a
    /// table is kept.
    pub fn add_join(&mut self, table: &str, left: &str, right: &str) {
        if self.seen_joins.insert(table.to_string()) {
            self.joins.push(format!("LEFT JOIN {table} ON {left} = {right}"));
        }
    }

    /// Adds an ORDER BY term. Only the first direction for a name is kept.
    pub fn add_order_column(&mut self, name: &str, order: Order) {
        if self.seen_orders.insert(name.to_string()) {
            self.orders.push(format!("{name} {}", order.sql()));
        }
    }

    pub fn begin_filter_field(&mut self) {
        self.args.truncate(self.arg_rollback);
        self.field_expr.clear();
    }

    /// ORs `expression` into the current field.
    pub fn add_filter_expression(&mut self, expression: &str) {
        if !self.field_expr.is_empty() {
            self.field_expr.push_str(" OR ");
        }
        self.field_expr.push_str("( ");
        self.field_expr.push_str(expression);
        self.field_expr.push_str(" )");
    }

    /// Binds arguments for the current field.
    pub fn push_args(&mut self, args: impl IntoIterator<Item = Value>) {
        self.args.extend(args);
    }

    /// Surrounds the current field expression, if it has one.
    pub fn wrap_filter_expression(&mut self, prefix: &str, suffix: &str) {
        if !self.field_expr.is_empty() {
            self.field_expr.insert_str(0, prefix);
            self.field_expr.push_str(suffix);
        }
    }

    /// ANDs the current field into WHERE and commits its arguments.
    pub fn end_filter_field(&mut self) {
        if self.field_expr.is_empty() {
            return;
        }
        if !self.where_expr.is_empty() {
            self.where_expr.push_str(" AND ");
        }
        self.where_expr.push_str("( ");
        self.where_expr.push_str(&self.field_expr);
        self.where_expr.push_str(" )");
        self.field_expr.clear();
        self.arg_rollback = self.args.len();
    }

    pub fn build_order(&mut self, fields: &[OrderField]) {
        for field in fields {
            field.column.add_order(self, field.order);
        }
    }

    pub fn build_filter(&mut self, fields: &[FilterField]) {
        for field in fields {
            self.begin_filter_field();
            field.column.add_expression(self, field.predicate, &field.values);
            self.end_filter_field();
        }
    }

    /// Committed arguments, in placeholder order.
    pub fn args(&self) -> &[Value] {
        &self.args[..self.arg_rollback]
    }

    /// Renders the command over the builder's root table.
    pub fn command(&self) -> String {
        let select = if self.selects.is_empty() {
            "*".to_string()
        } else {
            self.selects.join(", ")
        };
        let mut sql = format!("SELECT {select} FROM {}", self.table.name);
        if !self.joins.is_empty() {
            sql.push(' ');
            sql.push_str(&self.joins.join(" "));
        }
        if !self.where_expr.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.where_expr);
        }
        if !self.orders.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.orders.join(", "));
        }
        sql
    }

    pub fn finish(mut self) -> CompiledFilter {
        self.args.truncate(self.arg_rollback);
        CompiledFilter {
            command: self.command(),
            args: self.args,
        }
    }
}

/// Compiles `filter` into a query selecting every book column from `table`.
pub fn compile(
    filter: &Filter,
    table: &'static TableDescription,
    locale: &DateLocale,
) -> CompiledFilter {
    let mut builder = QueryBuilder::new(table, locale);
    for column in ALL_BOOK_COLUMNS {
        builder.add_select(column);
    }
    builder.build_order(&filter.order_list);
    builder.build_filter(&filter.filter_list);
    builder.finish()
}

/// Compiles `filter` into a books query selecting `select`.
///
/// Returns `None` when the result would be every visible book in storage
/// order: an empty or `*` projection with no filter fields and no ordering.
pub fn compile_select(
    filter: Option<&Filter>,
    locale: &DateLocale,
    select: &[&str],
    exclude_order: bool,
) -> Option<CompiledFilter> {
    let select_all = select.is_empty() || (select.len() == 1 && select[0] == "*");
    let unrestricted = match filter {
        None => true,
        Some(f) => f.filter_list.is_empty() && (exclude_order || f.order_list.is_empty()),
    };
    if select_all && unrestricted {
        return None;
    }

    let mut builder = QueryBuilder::new(&BOOKS, locale);
    if select.is_empty() {
        builder.add_select("*");
    }
    for name in select {
        builder.add_select(name);
    }
    if let Some(filter) = filter {
        if !exclude_order {
            builder.build_order(&filter.order_list);
        }
        builder.build_filter(&filter.filter_list);
    }
    Some(builder.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tables::{BOOKS_FLAGS_COLUMN, TAGS, TITLE_COLUMN};
    use crate::filter::Column;

    fn visible() -> String {
        BOOKS.visible_expression(false)
    }

    #[test]
    fn repeated_additions_are_ignored() {
        let locale = DateLocale::en_us();
        let mut once = QueryBuilder::new(&BOOKS, &locale);
        once.add_select(TITLE_COLUMN);
        once.add_join("book_tags", "books_id", "book_tags_book_id");
        once.add_order_column(TITLE_COLUMN, Order::Ascending);

        let mut twice = QueryBuilder::new(&BOOKS, &locale);
        for _ in 0..2 {
            twice.add_select(TITLE_COLUMN);
            twice.add_join("book_tags", "books_id", "book_tags_book_id");
            twice.add_order_column(TITLE_COLUMN, Order::Ascending);
        }
        twice.add_order_column(TITLE_COLUMN, Order::Descending);
        assert_eq!(once.command(), twice.command());
    }

    #[test]
    fn abandoned_field_rolls_back_arguments() {
        let locale = DateLocale::en_us();
        let mut builder = QueryBuilder::new(&BOOKS, &locale);
        builder.begin_filter_field();
        builder.add_filter_expression("title LIKE ? ESCAPE '\\'");
        builder.push_args([Value::Text("a".into())]);
        builder.end_filter_field();
        let before = (builder.command(), builder.args().to_vec());

        builder.begin_filter_field();
        builder.push_args([Value::Integer(7)]);
        builder.begin_filter_field();
        builder.end_filter_field();
        assert_eq!((builder.command(), builder.args().to_vec()), before);
    }

    #[test]
    fn wrap_skips_empty_field() {
        let locale = DateLocale::en_us();
        let mut builder = QueryBuilder::new(&BOOKS, &locale);
        builder.begin_filter_field();
        builder.wrap_filter_expression("NOT ( ", " )");
        builder.end_filter_field();
        assert_eq!(builder.command(), format!("SELECT * FROM books WHERE {}", visible()));
    }

    #[test]
    fn fields_are_anded_and_expressions_ored() {
        let locale = DateLocale::en_us();
        let mut builder = QueryBuilder::new(&TAGS, &locale);
        builder.add_select("tags_id");
        builder.begin_filter_field();
        builder.add_filter_expression("a");
        builder.add_filter_expression("b");
        builder.wrap_filter_expression("NOT ( ", " )");
        builder.end_filter_field();
        assert_eq!(
            builder.command(),
            "SELECT tags_id FROM tags \
             WHERE ( ( tags_flags & 2 ) = 0 ) AND ( NOT ( ( a ) OR ( b ) ) )"
        );
        assert!(!builder.command().contains(BOOKS_FLAGS_COLUMN));
    }

    #[test]
    fn unrestricted_select_compiles_to_none() {
        let locale = DateLocale::en_us();
        assert!(compile_select(None, &locale, &[], false).is_none());
        let ordered = Filter::new(vec![OrderField::new(Column::Title, Order::Ascending)], vec![]);
        assert!(compile_select(Some(&ordered), &locale, &["*"], true).is_none());
        assert!(compile_select(Some(&ordered), &locale, &["*"], false).is_some());
        assert!(compile_select(None, &locale, &["books_id"], false).is_some());
    }
}
