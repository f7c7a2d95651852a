//! Declarative book filters and their compilation to parameterized SQL.
//!
//! A [`Filter`] is an ordered list of [`OrderField`]s and an ordered list of
//! [`FilterField`]s. Values inside a field are OR-ed; fields are AND-ed.
//! [`compiler::compile`] turns a filter into a [`CompiledFilter`].

/// Column registry.
pub mod column;
/// Query builder and compile entry points.
pub mod compiler;
/// Date bucket parsing.
pub mod date;
/// Id-set WHERE expressions.
pub mod ids;
/// Predicate registry and value conversion.
pub mod predicate;

use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

pub use column::Column;
pub use compiler::{QueryBuilder, compile, compile_select};
pub use date::DateLocale;
pub use predicate::Predicate;

/// Current version written into the persisted envelope.
pub const FILTER_VERSION: i64 = 0;

const VERSION_KEY: &str = "VERSION";
const FILTER_KEY: &str = "FILTER";

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Order {
    Ascending,
    Descending,
}

impl Order {
    pub fn sql(self) -> &'static str {
        match self {
            Order::Ascending => "ASC",
            Order::Descending => "DESC",
        }
    }
}

/// One ORDER BY entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderField {
    pub column: Column,
    pub order: Order,
    /// Whether lists group rows under separators for this column.
    pub headers: bool,
}

impl OrderField {
    pub fn new(column: Column, order: Order) -> Self {
        Self {
            column,
            order,
            headers: false,
        }
    }

    pub fn with_headers(mut self, headers: bool) -> Self {
        self.headers = headers;
        self
    }

    pub fn is_same_query(&self, other: &OrderField) -> bool {
        self == other
    }
}

/// One restriction: `column predicate any-of values`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterField {
    pub column: Column,
    pub predicate: Predicate,
    pub values: Vec<String>,
}

impl FilterField {
    pub fn new<I, S>(column: Column, predicate: Predicate, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            column,
            predicate,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_same_query(&self, other: &FilterField) -> bool {
        self.column == other.column
            && self.predicate == other.predicate
            && self.values == other.values
    }
}

/// Which marked state a filter restricts books to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionType {
    Either,
    Selected,
    Unselected,
    /// Both marked and unmarked are required, so nothing matches.
    None,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Filter {
    #[serde(rename = "orderList")]
    pub order_list: Vec<OrderField>,
    #[serde(rename = "filterList")]
    pub filter_list: Vec<FilterField>,
}

impl Filter {
    pub fn new(order_list: Vec<OrderField>, filter_list: Vec<FilterField>) -> Self {
        Self {
            order_list,
            filter_list,
        }
    }

    /// True when both filters compile to the same query.
    pub fn is_same_query(&self, other: &Filter) -> bool {
        self.order_list.len() == other.order_list.len()
            && self.filter_list.len() == other.filter_list.len()
            && self
                .order_list
                .iter()
                .zip(&other.order_list)
                .all(|(a, b)| a.is_same_query(b))
            && self
                .filter_list
                .iter()
                .zip(&other.filter_list)
                .all(|(a, b)| a.is_same_query(b))
    }

    pub fn selection_type(&self) -> SelectionType {
        let mut selected = 0u8;
        for field in &self.filter_list {
            if field.column == Column::Selected {
                selected |= if field.predicate == Predicate::OneOf { 1 } else { 2 };
            }
        }
        match selected {
            0 => SelectionType::Either,
            1 => SelectionType::Selected,
            2 => SelectionType::Unselected,
            _ => SelectionType::None,
        }
    }

    /// Writes the versioned envelope `{"VERSION": .., "FILTER": ..}`.
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(&FilterEnvelope {
            version: FILTER_VERSION,
            filter: self,
        })
    }

    /// Reads a versioned envelope.
    ///
    /// A missing or unknown version, or a missing filter, decodes to `None`.
    pub fn decode(text: &str) -> serde_json::Result<Option<Filter>> {
        let json: serde_json::Value = serde_json::from_str(text)?;
        let Some(version) = json.get(VERSION_KEY).and_then(serde_json::Value::as_i64) else {
            return Ok(None);
        };
        let Some(filter) = json.get(FILTER_KEY) else {
            return Ok(None);
        };
        match version {
            0 => serde_json::from_value(filter.clone()).map(Some),
            _ => Ok(None),
        }
    }
}

/// Returns `filter` rewritten so its marked-state fields request `wanted`.
pub fn filter_for_selection_type(filter: Option<&Filter>, wanted: SelectionType) -> Option<Filter> {
    let current = filter.map_or(SelectionType::Either, Filter::selection_type);
    if current == wanted {
        return filter.cloned();
    }

    let mut base: Vec<FilterField> = filter
        .map(|f| {
            f.filter_list
                .iter()
                .filter(|field| field.column != Column::Selected)
                .cloned()
                .collect()
        })
        .unwrap_or_default();
    match wanted {
        SelectionType::Selected => {
            base.push(FilterField::new(Column::Selected, Predicate::OneOf, ["0"]))
        }
        SelectionType::Unselected => {
            base.push(FilterField::new(Column::Selected, Predicate::NotOneOf, ["0"]))
        }
        SelectionType::Either | SelectionType::None => {}
    }
    Some(Filter::new(
        filter.map(|f| f.order_list.clone()).unwrap_or_default(),
        base,
    ))
}

#[derive(Serialize)]
struct FilterEnvelope<'a> {
    #[serde(rename = "VERSION")]
    version: i64,
    #[serde(rename = "FILTER")]
    filter: &'a Filter,
}

/// A command with positional `?` arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFilter {
    pub command: String,
    pub args: Vec<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_uses_upper_case_keys() {
        let filter = Filter::new(
            vec![OrderField::new(Column::Title, Order::Descending).with_headers(true)],
            vec![FilterField::new(Column::Tags, Predicate::NotOneOf, ["fiction"])],
        );
        let text = filter.encode().expect("encode");
        assert_eq!(
            text,
            concat!(
                r#"{"VERSION":0,"FILTER":{"orderList":[{"column":"TITLE","order":"Descending","#,
                r#""headers":true}],"filterList":[{"column":"TAGS","predicate":"NOT_ONE_OF","#,
                r#""values":["fiction"]}]}}"#,
            )
        );
        assert_eq!(Filter::decode(&text).expect("decode"), Some(filter));
    }

    #[test]
    fn unknown_version_decodes_to_none() {
        let text = r#"{"VERSION":7,"FILTER":{"orderList":[],"filterList":[]}}"#;
        assert_eq!(Filter::decode(text).expect("decode"), None);
        assert_eq!(Filter::decode(r#"{"FILTER":{}}"#).expect("decode"), None);
        assert!(Filter::decode("not json").is_err());
    }

    #[test]
    fn selection_type_tracks_selected_fields() {
        let either = Filter::default();
        assert_eq!(either.selection_type(), SelectionType::Either);
        let selected =
            filter_for_selection_type(Some(&either), SelectionType::Selected).expect("filter");
        assert_eq!(selected.selection_type(), SelectionType::Selected);
        let unselected =
            filter_for_selection_type(Some(&selected), SelectionType::Unselected).expect("filter");
        assert_eq!(unselected.selection_type(), SelectionType::Unselected);
        assert_eq!(unselected.filter_list.len(), 1);
    }
}
