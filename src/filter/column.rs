//! Column registry: SQL names, accepted predicates and ordering per column.

use chrono::{FixedOffset, TimeZone};
use serde::{Deserialize, Serialize};

use crate::catalog::model::BookAndAuthors;
use crate::db::tables::{
    AUTHORS, AUTHORS_ID_COLUMN, AUTHORS_TABLE, BOOKS_ID_COLUMN, BOOK_AUTHORS,
    BOOK_AUTHORS_AUTHOR_ID_COLUMN, BOOK_AUTHORS_BOOK_ID_COLUMN, BOOK_AUTHORS_TABLE, BOOK_CATEGORIES,
    BOOK_CATEGORIES_BOOK_ID_COLUMN, BOOK_CATEGORIES_CATEGORY_ID_COLUMN, BOOK_CATEGORIES_TABLE,
    BOOK_COUNT_COLUMN, BOOK_ISBNS, BOOK_ISBNS_BOOK_ID_COLUMN, BOOK_ISBNS_ISBN_ID_COLUMN,
    BOOK_ISBNS_TABLE, BOOK_SERIES_COLUMN, BOOK_TAGS, BOOK_TAGS_BOOK_ID_COLUMN, BOOK_TAGS_TABLE,
    BOOK_TAGS_TAG_ID_COLUMN, CATEGORIES, CATEGORIES_ID_COLUMN, CATEGORIES_TABLE, CATEGORY_COLUMN,
    DATE_ADDED_COLUMN, DATE_MODIFIED_COLUMN, DESCRIPTION_COLUMN, ISBNS, ISBNS_ID_COLUMN,
    ISBNS_TABLE, ISBN_COLUMN, LAST_NAME_COLUMN, PAGE_COUNT_COLUMN, RATING_COLUMN, REMAINING_COLUMN,
    SELECTED, SERIES, SERIES_ID_COLUMN, SERIES_TABLE, SERIES_TITLE_COLUMN, SUBTITLE_COLUMN, TAGS,
    TAGS_ID_COLUMN, TAGS_NAME_COLUMN, TAGS_TABLE, TITLE_COLUMN, TableDescription,
};

use super::{
    CompiledFilter, Order,
    compiler::QueryBuilder,
    date::DateLocale,
    predicate::{Predicate, ValueDomain},
};

/// Logical field of a book that filters and orderings refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Column {
    LastName,
    FirstName,
    Any,
    Title,
    Subtitle,
    Description,
    Tags,
    Categories,
    Source,
    SourceId,
    Isbn,
    PageCount,
    BookCount,
    Rating,
    DateAdded,
    DateModified,
    /// The user's "marked" flag on the book row.
    Selected,
    Series,
}

/// `LEFT JOIN table ON left = right`.
#[derive(Debug, Clone, Copy)]
pub struct JoinSpec {
    pub table: &'static str,
    pub left: &'static str,
    pub right: &'static str,
}

/// Lookup reached from books through a link table.
#[derive(Debug)]
pub struct SubQuery {
    /// Table holding the filtered values.
    pub lookup: &'static TableDescription,
    /// Link table between books and `lookup`.
    pub link: &'static TableDescription,
    /// Joins needed to order by lookup columns.
    pub joins: &'static [JoinSpec],
}

/// Lookup row referenced by an id column of the root table.
#[derive(Debug)]
pub struct Reference {
    pub lookup: &'static TableDescription,
    /// Root table column holding the lookup row id.
    pub column: &'static str,
    pub join: JoinSpec,
}

/// How a column reaches its data.
#[derive(Debug)]
pub enum ColumnSource {
    /// Expression over the root table.
    Plain,
    /// `EXISTS` over a link table.
    SubQuery(SubQuery),
    /// `IN` over a lookup table.
    Reference(Reference),
    /// Fans out over every other column.
    Any,
    /// Bit of the root table's flag column.
    Flag(i64),
}

/// Static strategy record for a [`Column`].
#[derive(Debug)]
pub struct ColumnDescriptor {
    /// SQL expressions compared by filters.
    pub filter_names: &'static [&'static str],
    /// SQL expressions used for ORDER BY.
    pub order_names: &'static [&'static str],
    pub predicates: &'static [Predicate],
    pub domain: ValueDomain,
    pub source: ColumnSource,
}

const TEXT_PREDICATES: &[Predicate] = &[
    Predicate::Glob,
    Predicate::OneOf,
    Predicate::NotOneOf,
    Predicate::NotGlob,
];
const GLOB_PREDICATES: &[Predicate] = &[Predicate::Glob, Predicate::NotGlob];
const COUNT_PREDICATES: &[Predicate] = &[
    Predicate::OneOf,
    Predicate::NotOneOf,
    Predicate::Glob,
    Predicate::NotGlob,
    Predicate::Gt,
    Predicate::Ge,
    Predicate::Lt,
    Predicate::Le,
];
const RANGE_PREDICATES: &[Predicate] = &[
    Predicate::OneOf,
    Predicate::NotOneOf,
    Predicate::Gt,
    Predicate::Ge,
    Predicate::Lt,
    Predicate::Le,
];
const FLAG_PREDICATES: &[Predicate] = &[Predicate::OneOf, Predicate::NotOneOf];

const AUTHOR_JOINS: &[JoinSpec] = &[
    JoinSpec {
        table: BOOK_AUTHORS_TABLE,
        left: BOOKS_ID_COLUMN,
        right: BOOK_AUTHORS_BOOK_ID_COLUMN,
    },
    JoinSpec {
        table: AUTHORS_TABLE,
        left: BOOK_AUTHORS_AUTHOR_ID_COLUMN,
        right: AUTHORS_ID_COLUMN,
    },
];
const TAG_JOINS: &[JoinSpec] = &[
    JoinSpec {
        table: BOOK_TAGS_TABLE,
        left: BOOKS_ID_COLUMN,
        right: BOOK_TAGS_BOOK_ID_COLUMN,
    },
    JoinSpec {
        table: TAGS_TABLE,
        left: BOOK_TAGS_TAG_ID_COLUMN,
        right: TAGS_ID_COLUMN,
    },
];
const CATEGORY_JOINS: &[JoinSpec] = &[
    JoinSpec {
        table: BOOK_CATEGORIES_TABLE,
        left: BOOKS_ID_COLUMN,
        right: BOOK_CATEGORIES_BOOK_ID_COLUMN,
    },
    JoinSpec {
        table: CATEGORIES_TABLE,
        left: BOOK_CATEGORIES_CATEGORY_ID_COLUMN,
        right: CATEGORIES_ID_COLUMN,
    },
];
const ISBN_JOINS: &[JoinSpec] = &[
    JoinSpec {
        table: BOOK_ISBNS_TABLE,
        left: BOOKS_ID_COLUMN,
        right: BOOK_ISBNS_BOOK_ID_COLUMN,
    },
    JoinSpec {
        table: ISBNS_TABLE,
        left: BOOK_ISBNS_ISBN_ID_COLUMN,
        right: ISBNS_ID_COLUMN,
    },
];

static LAST_FIRST: ColumnDescriptor = ColumnDescriptor {
    filter_names: &[],
    order_names: &[LAST_NAME_COLUMN, REMAINING_COLUMN],
    predicates: &[],
    domain: ValueDomain::Text,
    source: ColumnSource::SubQuery(SubQuery {
        lookup: &AUTHORS,
        link: &BOOK_AUTHORS,
        joins: AUTHOR_JOINS,
    }),
};
static FIRST_LAST: ColumnDescriptor = ColumnDescriptor {
    filter_names: &["( remaining || ' ' || last_name )"],
    order_names: &[REMAINING_COLUMN, LAST_NAME_COLUMN],
    predicates: TEXT_PREDICATES,
    domain: ValueDomain::Text,
    source: ColumnSource::SubQuery(SubQuery {
        lookup: &AUTHORS,
        link: &BOOK_AUTHORS,
        joins: AUTHOR_JOINS,
    }),
};
static ANY: ColumnDescriptor = ColumnDescriptor {
    filter_names: &[],
    order_names: &[],
    predicates: GLOB_PREDICATES,
    domain: ValueDomain::Text,
    source: ColumnSource::Any,
};
static TITLE: ColumnDescriptor = ColumnDescriptor {
    filter_names: &[TITLE_COLUMN],
    order_names: &[TITLE_COLUMN],
    predicates: TEXT_PREDICATES,
    domain: ValueDomain::Text,
    source: ColumnSource::Plain,
};
static SUBTITLE: ColumnDescriptor = ColumnDescriptor {
    filter_names: &[SUBTITLE_COLUMN],
    order_names: &[SUBTITLE_COLUMN],
    predicates: TEXT_PREDICATES,
    domain: ValueDomain::Text,
    source: ColumnSource::Plain,
};
static DESCRIPTION: ColumnDescriptor = ColumnDescriptor {
    filter_names: &[DESCRIPTION_COLUMN],
    order_names: &[DESCRIPTION_COLUMN],
    predicates: GLOB_PREDICATES,
    domain: ValueDomain::Text,
    source: ColumnSource::Plain,
};
static TAG_NAMES: ColumnDescriptor = ColumnDescriptor {
    filter_names: &[TAGS_NAME_COLUMN],
    order_names: &[TAGS_NAME_COLUMN],
    predicates: TEXT_PREDICATES,
    domain: ValueDomain::Text,
    source: ColumnSource::SubQuery(SubQuery {
        lookup: &TAGS,
        link: &BOOK_TAGS,
        joins: TAG_JOINS,
    }),
};
static CATEGORY_NAMES: ColumnDescriptor = ColumnDescriptor {
    filter_names: &[CATEGORY_COLUMN],
    order_names: &[CATEGORY_COLUMN],
    predicates: TEXT_PREDICATES,
    domain: ValueDomain::Text,
    source: ColumnSource::SubQuery(SubQuery {
        lookup: &CATEGORIES,
        link: &BOOK_CATEGORIES,
        joins: CATEGORY_JOINS,
    }),
};
static SOURCE: ColumnDescriptor = ColumnDescriptor {
    filter_names: &["ifnull(source_id, '')"],
    order_names: &["ifnull(source_id, '')"],
    predicates: TEXT_PREDICATES,
    domain: ValueDomain::Text,
    source: ColumnSource::Plain,
};
static SOURCE_ID: ColumnDescriptor = ColumnDescriptor {
    filter_names: &["ifnull(volume_id, '')"],
    order_names: &["ifnull(volume_id, '')"],
    predicates: TEXT_PREDICATES,
    domain: ValueDomain::Text,
    source: ColumnSource::Plain,
};
static ISBN_NUMBERS: ColumnDescriptor = ColumnDescriptor {
    filter_names: &[ISBN_COLUMN],
    order_names: &[ISBN_COLUMN],
    predicates: TEXT_PREDICATES,
    domain: ValueDomain::Text,
    source: ColumnSource::SubQuery(SubQuery {
        lookup: &ISBNS,
        link: &BOOK_ISBNS,
        joins: ISBN_JOINS,
    }),
};
static PAGE_COUNT: ColumnDescriptor = ColumnDescriptor {
    filter_names: &[PAGE_COUNT_COLUMN],
    order_names: &[PAGE_COUNT_COLUMN],
    predicates: COUNT_PREDICATES,
    domain: ValueDomain::Integer,
    source: ColumnSource::Plain,
};
static BOOK_COUNT: ColumnDescriptor = ColumnDescriptor {
    filter_names: &[BOOK_COUNT_COLUMN],
    order_names: &[BOOK_COUNT_COLUMN],
    predicates: COUNT_PREDICATES,
    domain: ValueDomain::Integer,
    source: ColumnSource::Plain,
};
static RATING: ColumnDescriptor = ColumnDescriptor {
    filter_names: &[RATING_COLUMN],
    order_names: &[RATING_COLUMN],
    predicates: RANGE_PREDICATES,
    domain: ValueDomain::Real,
    source: ColumnSource::Plain,
};
static DATE_ADDED: ColumnDescriptor = ColumnDescriptor {
    filter_names: &[DATE_ADDED_COLUMN],
    order_names: &[DATE_ADDED_COLUMN],
    predicates: RANGE_PREDICATES,
    domain: ValueDomain::Date,
    source: ColumnSource::Plain,
};
static DATE_MODIFIED: ColumnDescriptor = ColumnDescriptor {
    filter_names: &[DATE_MODIFIED_COLUMN],
    order_names: &[DATE_MODIFIED_COLUMN],
    predicates: RANGE_PREDICATES,
    domain: ValueDomain::Date,
    source: ColumnSource::Plain,
};
static SELECTED_FLAG: ColumnDescriptor = ColumnDescriptor {
    filter_names: &[],
    order_names: &[],
    predicates: FLAG_PREDICATES,
    domain: ValueDomain::Integer,
    source: ColumnSource::Flag(SELECTED),
};

static SERIES_TITLES: ColumnDescriptor = ColumnDescriptor {
    filter_names: &[SERIES_TITLE_COLUMN],
    order_names: &[SERIES_TITLE_COLUMN],
    predicates: TEXT_PREDICATES,
    domain: ValueDomain::Text,
    source: ColumnSource::Reference(Reference {
        lookup: &SERIES,
        column: BOOK_SERIES_COLUMN,
        join: JoinSpec {
            table: SERIES_TABLE,
            left: BOOK_SERIES_COLUMN,
            right: SERIES_ID_COLUMN,
        },
    }),
};

impl Column {
    pub const ALL: [Column; 18] = [
        Column::LastName,
        Column::FirstName,
        Column::Any,
        Column::Title,
        Column::Subtitle,
        Column::Description,
        Column::Tags,
        Column::Categories,
        Column::Source,
        Column::SourceId,
        Column::Isbn,
        Column::PageCount,
        Column::BookCount,
        Column::Rating,
        Column::DateAdded,
        Column::DateModified,
        Column::Selected,
        Column::Series,
    ];

    pub fn descriptor(self) -> &'static ColumnDescriptor {
        match self {
            Column::LastName => &LAST_FIRST,
            Column::FirstName => &FIRST_LAST,
            Column::Any => &ANY,
            Column::Title => &TITLE,
            Column::Subtitle => &SUBTITLE,
            Column::Description => &DESCRIPTION,
            Column::Tags => &TAG_NAMES,
            Column::Categories => &CATEGORY_NAMES,
            Column::Source => &SOURCE,
            Column::SourceId => &SOURCE_ID,
            Column::Isbn => &ISBN_NUMBERS,
            Column::PageCount => &PAGE_COUNT,
            Column::BookCount => &BOOK_COUNT,
            Column::Rating => &RATING,
            Column::DateAdded => &DATE_ADDED,
            Column::DateModified => &DATE_MODIFIED,
            Column::Selected => &SELECTED_FLAG,
            Column::Series => &SERIES_TITLES,
        }
    }

    pub fn accepts(self, predicate: Predicate) -> bool {
        self.descriptor().predicates.contains(&predicate)
    }

    /// Adds ORDER BY terms for this column, with any joins and selects the
    /// sort needs.
    pub fn add_order(self, builder: &mut QueryBuilder<'_>, order: Order) {
        let desc = self.descriptor();
        match &desc.source {
            ColumnSource::SubQuery(sub) => {
                for join in sub.joins {
                    builder.add_join(join.table, join.left, join.right);
                }
                add_joined_order(builder, desc, order);
            }
            ColumnSource::Reference(reference) => {
                let join = reference.join;
                builder.add_join(join.table, join.left, join.right);
                add_joined_order(builder, desc, order);
            }
            _ => {
                for name in desc.order_names {
                    builder.add_order_column(name, order);
                }
            }
        }
    }

    /// Adds this column's expression for `predicate` over `values` to the
    /// builder's current filter field.
    ///
    /// Returns false when the predicate is not accepted or no value
    /// converted; the field then has nothing from this column.
    pub fn add_expression(
        self,
        builder: &mut QueryBuilder<'_>,
        predicate: Predicate,
        values: &[String],
    ) -> bool {
        let desc = self.descriptor();
        if !desc.predicates.contains(&predicate) {
            return false;
        }

        match &desc.source {
            ColumnSource::Plain => {
                let has_values = process_values(builder, desc, predicate.positive(), values);
                if has_values && predicate.negate() {
                    builder.wrap_filter_expression("NOT ( ", " )");
                }
                has_values
            }
            ColumnSource::Flag(bit) => {
                let Some(flag) = builder.table().flag_column else {
                    return false;
                };
                if values.is_empty() {
                    return false;
                }
                builder.add_filter_expression(&format!("( {flag} & {bit} ) != 0"));
                if predicate.negate() {
                    builder.wrap_filter_expression("NOT ( ", " )");
                }
                true
            }
            ColumnSource::SubQuery(sub) => {
                let Some(link) = sub.link.link else {
                    return false;
                };
                let Some(nested) = lookup_ids(builder, desc, sub.lookup, predicate, values) else {
                    return false;
                };
                builder.add_filter_expression(&format!(
                    "{}EXISTS ( SELECT NULL FROM {} WHERE {} = {} AND {} IN ( {} ) )",
                    if predicate.negate() { "NOT " } else { "" },
                    sub.link.name,
                    builder.table().id_column,
                    link.left,
                    link.right,
                    nested.command,
                ));
                builder.push_args(nested.args);
                true
            }
            ColumnSource::Reference(reference) => {
                let Some(nested) = lookup_ids(builder, desc, reference.lookup, predicate, values)
                else {
                    return false;
                };
                builder.add_filter_expression(&format!(
                    "{}{} IN ( {} )",
                    if predicate.negate() { "NOT " } else { "" },
                    reference.column,
                    nested.command,
                ));
                builder.push_args(nested.args);
                true
            }
            ColumnSource::Any => {
                let positive = predicate.positive();
                let mut has_values = false;
                for column in Column::ALL {
                    if column != Column::Any {
                        has_values |= column.add_expression(builder, positive, values);
                    }
                }
                if has_values && predicate.negate() {
                    builder.wrap_filter_expression("NOT ( ", " )");
                }
                has_values
            }
        }
    }

    /// Value of this column for in-memory grouping.
    pub fn value(self, book: &BookAndAuthors, locale: &DateLocale) -> String {
        match self {
            Column::LastName => format!("{}, {}", book.sort_last(), book.sort_first()),
            Column::FirstName => format!("{} {}", book.sort_first(), book.sort_last()),
            Column::Any | Column::Selected => String::new(),
            Column::Title => book.book.title.clone(),
            Column::Subtitle => book.book.subtitle.clone(),
            Column::Description => book.book.description.clone(),
            Column::Tags => join_names(book.tags.iter().map(|t| t.name.as_str())),
            Column::Categories => join_names(book.categories.iter().map(|c| c.category.as_str())),
            Column::Source => book.book.source_id.clone().unwrap_or_default(),
            Column::SourceId => book.book.volume_id.clone().unwrap_or_default(),
            Column::Isbn => join_names(book.isbns.iter().map(|i| i.isbn.as_str())),
            Column::PageCount => book.book.page_count.to_string(),
            Column::BookCount => book.book.book_count.to_string(),
            Column::Rating => book.book.rating.to_string(),
            Column::DateAdded => format_date(book.book.date_added, locale),
            Column::DateModified => format_date(book.book.date_modified, locale),
            Column::Series => book.sort_series().to_string(),
        }
    }

    /// Value shown for this column, listing every author rather than the
    /// sort author.
    pub fn display_value(self, book: &BookAndAuthors, locale: &DateLocale) -> String {
        match self {
            Column::LastName => book
                .authors
                .iter()
                .map(|a| format!("{}, {}", a.last_name, a.remaining))
                .collect::<Vec<_>>()
                .join(", "),
            Column::FirstName => book
                .authors
                .iter()
                .map(|a| format!("{} {}", a.remaining, a.last_name))
                .collect::<Vec<_>>()
                .join(", "),
            _ => self.value(book, locale),
        }
    }

    /// True when a group separator belongs between `book` and `other`
    /// in a list ordered by this column.
    pub fn should_add_separator(
        self,
        book: &BookAndAuthors,
        other: &BookAndAuthors,
        locale: &DateLocale,
    ) -> bool {
        match self {
            Column::Any | Column::Selected => false,
            Column::LastName | Column::FirstName => {
                book.sort_last() != other.sort_last() || book.sort_first() != other.sort_first()
            }
            _ => self.value(book, locale) != self.value(other, locale),
        }
    }
}

fn add_joined_order(builder: &mut QueryBuilder<'_>, desc: &ColumnDescriptor, order: Order) {
    for name in desc.order_names {
        builder.add_select(name);
        builder.add_order_column(name, order);
    }
}

/// Compiles the ids of `lookup` rows whose values match, or `None` when no
/// value converted.
fn lookup_ids(
    builder: &QueryBuilder<'_>,
    desc: &ColumnDescriptor,
    lookup: &'static TableDescription,
    predicate: Predicate,
    values: &[String],
) -> Option<CompiledFilter> {
    let mut nested = QueryBuilder::new(lookup, builder.locale());
    nested.add_select(lookup.id_column);
    nested.begin_filter_field();
    let has_values = process_values(&mut nested, desc, predicate.positive(), values);
    nested.end_filter_field();
    has_values.then(|| nested.finish())
}

fn process_values(
    builder: &mut QueryBuilder<'_>,
    desc: &ColumnDescriptor,
    predicate: Predicate,
    values: &[String],
) -> bool {
    let mut has_values = false;
    for raw in values {
        let Some(args) = predicate.convert(desc.domain, raw, builder.locale()) else {
            continue;
        };
        has_values = true;
        for name in desc.filter_names {
            builder.add_filter_expression(&predicate.sub_expression(name, desc.domain));
            builder.push_args(args.iter().cloned());
        }
    }
    has_values
}

fn join_names<'s>(names: impl Iterator<Item = &'s str>) -> String {
    names.collect::<Vec<_>>().join(", ")
}

fn format_date(ms: i64, locale: &DateLocale) -> String {
    let Some(offset) = locale
        .utc_offset_minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
    else {
        return String::new();
    };
    match offset.timestamp_millis_opt(ms).single() {
        Some(at) => at.format(&locale.short_date).to_string(),
        None => String::new(),
    }
}
