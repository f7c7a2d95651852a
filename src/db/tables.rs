//! Static descriptions of every table the catalog and undo engine touch.

/// Flag bit marking a row as selected ("marked") by the user.
pub const SELECTED: i64 = 1;
/// Flag bit marking a row as soft-deleted.
pub const HIDDEN: i64 = 2;

pub const BOOKS_TABLE: &str = "books";
pub const BOOKS_ID_COLUMN: &str = "books_id";
pub const VOLUME_ID_COLUMN: &str = "volume_id";
pub const SOURCE_ID_COLUMN: &str = "source_id";
pub const TITLE_COLUMN: &str = "title";
pub const SUBTITLE_COLUMN: &str = "subtitle";
pub const DESCRIPTION_COLUMN: &str = "description";
pub const PAGE_COUNT_COLUMN: &str = "page_count";
pub const BOOK_COUNT_COLUMN: &str = "book_count";
pub const RATING_COLUMN: &str = "rating";
pub const DATE_ADDED_COLUMN: &str = "date_added";
pub const DATE_MODIFIED_COLUMN: &str = "date_modified";
pub const BOOKS_FLAGS_COLUMN: &str = "books_flags";
pub const BOOK_SERIES_COLUMN: &str = "book_series_id";

pub const AUTHORS_TABLE: &str = "authors";
pub const AUTHORS_ID_COLUMN: &str = "authors_id";
pub const LAST_NAME_COLUMN: &str = "last_name";
pub const REMAINING_COLUMN: &str = "remaining";
pub const AUTHORS_FLAGS_COLUMN: &str = "authors_flags";

pub const BOOK_AUTHORS_TABLE: &str = "book_authors";
pub const BOOK_AUTHORS_ID_COLUMN: &str = "book_authors_id";
pub const BOOK_AUTHORS_BOOK_ID_COLUMN: &str = "book_authors_book_id";
pub const BOOK_AUTHORS_AUTHOR_ID_COLUMN: &str = "book_authors_author_id";

pub const CATEGORIES_TABLE: &str = "categories";
pub const CATEGORIES_ID_COLUMN: &str = "categories_id";
pub const CATEGORY_COLUMN: &str = "category";
pub const CATEGORIES_FLAGS_COLUMN: &str = "categories_flags";

pub const BOOK_CATEGORIES_TABLE: &str = "book_categories";
pub const BOOK_CATEGORIES_ID_COLUMN: &str = "book_categories_id";
pub const BOOK_CATEGORIES_BOOK_ID_COLUMN: &str = "book_categories_book_id";
pub const BOOK_CATEGORIES_CATEGORY_ID_COLUMN: &str = "book_categories_category_id";

pub const TAGS_TABLE: &str = "tags";
pub const TAGS_ID_COLUMN: &str = "tags_id";
pub const TAGS_NAME_COLUMN: &str = "tags_name";
pub const TAGS_DESC_COLUMN: &str = "tags_desc";
pub const TAGS_FLAGS_COLUMN: &str = "tags_flags";

pub const BOOK_TAGS_TABLE: &str = "book_tags";
pub const BOOK_TAGS_ID_COLUMN: &str = "book_tags_id";
pub const BOOK_TAGS_BOOK_ID_COLUMN: &str = "book_tags_book_id";
pub const BOOK_TAGS_TAG_ID_COLUMN: &str = "book_tags_tag_id";

pub const ISBNS_TABLE: &str = "isbns";
pub const ISBNS_ID_COLUMN: &str = "isbns_id";
pub const ISBN_COLUMN: &str = "isbn";
pub const ISBNS_FLAGS_COLUMN: &str = "isbns_flags";

pub const BOOK_ISBNS_TABLE: &str = "book_isbns";
pub const BOOK_ISBNS_ID_COLUMN: &str = "book_isbns_id";
pub const BOOK_ISBNS_BOOK_ID_COLUMN: &str = "book_isbns_book_id";
pub const BOOK_ISBNS_ISBN_ID_COLUMN: &str = "book_isbns_isbn_id";

pub const SERIES_TABLE: &str = "series";
pub const SERIES_ID_COLUMN: &str = "series_id";
pub const SERIES_SERIES_ID_COLUMN: &str = "series_series_id";
pub const SERIES_TITLE_COLUMN: &str = "series_title";
pub const SERIES_FLAGS_COLUMN: &str = "series_flags";

pub const VIEWS_TABLE: &str = "views";
pub const VIEWS_ID_COLUMN: &str = "views_id";
pub const VIEWS_NAME_COLUMN: &str = "views_name";
pub const VIEWS_DESC_COLUMN: &str = "views_desc";
pub const VIEWS_FILTER_COLUMN: &str = "views_filter";
pub const VIEWS_FLAGS_COLUMN: &str = "views_flags";

/// Column pair of a many-to-many link table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkColumns {
    /// Column holding the owning (book) id.
    pub left: &'static str,
    /// Column holding the linked lookup id.
    pub right: &'static str,
}

/// Descriptor for a table in the catalog database.
///
/// Entity tables carry a flag column with the [`HIDDEN`] bit used for soft
/// deletes. Link tables carry [`LinkColumns`] instead and are deleted
/// physically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableDescription {
    /// Table name.
    pub name: &'static str,
    /// Auto-incrementing row id column.
    pub id_column: &'static str,
    /// Flags column, when the table supports soft deletes.
    pub flag_column: Option<&'static str>,
    /// Value of the hidden bit in `flag_column`.
    pub flag_value: i64,
    /// Data columns copied when a shadow row is made for a change.
    pub data_columns: &'static [&'static str],
    /// Link columns, when this is a link table.
    pub link: Option<LinkColumns>,
}

impl TableDescription {
    /// Returns the expression that keeps visible rows, or hidden rows when
    /// `hidden` is true. Empty for tables without a flag column.
    pub fn visible_expression(&self, hidden: bool) -> String {
        match self.flag_column {
            Some(flag) => format!(
                "( ( {flag} & {} ) {} 0 )",
                self.flag_value,
                if hidden { "!=" } else { "=" }
            ),
            None => String::new(),
        }
    }

    /// Returns the sub-query selecting ids of marked rows, or unmarked rows
    /// when `invert` is true.
    pub fn selected_id_subquery(&self, invert: bool) -> String {
        let flag = self.flag_column.unwrap_or("0");
        format!(
            "SELECT {} FROM {} WHERE ( ( {flag} & {SELECTED} ) {} 0 )",
            self.id_column,
            self.name,
            if invert { "=" } else { "!=" }
        )
    }
}

pub static BOOKS: TableDescription = TableDescription {
    name: BOOKS_TABLE,
    id_column: BOOKS_ID_COLUMN,
    flag_column: Some(BOOKS_FLAGS_COLUMN),
    flag_value: HIDDEN,
    data_columns: &[
        VOLUME_ID_COLUMN,
        SOURCE_ID_COLUMN,
        TITLE_COLUMN,
        SUBTITLE_COLUMN,
        DESCRIPTION_COLUMN,
        PAGE_COUNT_COLUMN,
        BOOK_COUNT_COLUMN,
        RATING_COLUMN,
        DATE_ADDED_COLUMN,
        DATE_MODIFIED_COLUMN,
        BOOK_SERIES_COLUMN,
    ],
    link: None,
};

pub static AUTHORS: TableDescription = TableDescription {
    name: AUTHORS_TABLE,
    id_column: AUTHORS_ID_COLUMN,
    flag_column: Some(AUTHORS_FLAGS_COLUMN),
    flag_value: HIDDEN,
    data_columns: &[LAST_NAME_COLUMN, REMAINING_COLUMN],
    link: None,
};

pub static CATEGORIES: TableDescription = TableDescription {
    name: CATEGORIES_TABLE,
    id_column: CATEGORIES_ID_COLUMN,
    flag_column: Some(CATEGORIES_FLAGS_COLUMN),
    flag_value: HIDDEN,
    data_columns: &[CATEGORY_COLUMN],
    link: None,
};

pub static TAGS: TableDescription = TableDescription {
    name: TAGS_TABLE,
    id_column: TAGS_ID_COLUMN,
    flag_column: Some(TAGS_FLAGS_COLUMN),
    flag_value: HIDDEN,
    data_columns: &[TAGS_NAME_COLUMN, TAGS_DESC_COLUMN],
    link: None,
};

pub static ISBNS: TableDescription = TableDescription {
    name: ISBNS_TABLE,
    id_column: ISBNS_ID_COLUMN,
    flag_column: Some(ISBNS_FLAGS_COLUMN),
    flag_value: HIDDEN,
    data_columns: &[ISBN_COLUMN],
    link: None,
};

pub static SERIES: TableDescription = TableDescription {
    name: SERIES_TABLE,
    id_column: SERIES_ID_COLUMN,
    flag_column: Some(SERIES_FLAGS_COLUMN),
    flag_value: HIDDEN,
    data_columns: &[SERIES_SERIES_ID_COLUMN, SERIES_TITLE_COLUMN],
    link: None,
};

pub static VIEWS: TableDescription = TableDescription {
    name: VIEWS_TABLE,
    id_column: VIEWS_ID_COLUMN,
    flag_column: Some(VIEWS_FLAGS_COLUMN),
    flag_value: HIDDEN,
    data_columns: &[VIEWS_NAME_COLUMN, VIEWS_DESC_COLUMN, VIEWS_FILTER_COLUMN],
    link: None,
};

pub static BOOK_AUTHORS: TableDescription = TableDescription {
    name: BOOK_AUTHORS_TABLE,
    id_column: BOOK_AUTHORS_ID_COLUMN,
    flag_column: None,
    flag_value: 0,
    data_columns: &[],
    link: Some(LinkColumns {
        left: BOOK_AUTHORS_BOOK_ID_COLUMN,
        right: BOOK_AUTHORS_AUTHOR_ID_COLUMN,
    }),
};

pub static BOOK_CATEGORIES: TableDescription = TableDescription {
    name: BOOK_CATEGORIES_TABLE,
    id_column: BOOK_CATEGORIES_ID_COLUMN,
    flag_column: None,
    flag_value: 0,
    data_columns: &[],
    link: Some(LinkColumns {
        left: BOOK_CATEGORIES_BOOK_ID_COLUMN,
        right: BOOK_CATEGORIES_CATEGORY_ID_COLUMN,
    }),
};

pub static BOOK_TAGS: TableDescription = TableDescription {
    name: BOOK_TAGS_TABLE,
    id_column: BOOK_TAGS_ID_COLUMN,
    flag_column: None,
    flag_value: 0,
    data_columns: &[],
    link: Some(LinkColumns {
        left: BOOK_TAGS_BOOK_ID_COLUMN,
        right: BOOK_TAGS_TAG_ID_COLUMN,
    }),
};

pub static BOOK_ISBNS: TableDescription = TableDescription {
    name: BOOK_ISBNS_TABLE,
    id_column: BOOK_ISBNS_ID_COLUMN,
    flag_column: None,
    flag_value: 0,
    data_columns: &[],
    link: Some(LinkColumns {
        left: BOOK_ISBNS_BOOK_ID_COLUMN,
        right: BOOK_ISBNS_ISBN_ID_COLUMN,
    }),
};

/// Every book column selected by a full book query.
pub const ALL_BOOK_COLUMNS: &[&str] = &[
    BOOKS_ID_COLUMN,
    VOLUME_ID_COLUMN,
    SOURCE_ID_COLUMN,
    TITLE_COLUMN,
    SUBTITLE_COLUMN,
    DESCRIPTION_COLUMN,
    PAGE_COUNT_COLUMN,
    BOOK_COUNT_COLUMN,
    RATING_COLUMN,
    DATE_ADDED_COLUMN,
    DATE_MODIFIED_COLUMN,
    BOOKS_FLAGS_COLUMN,
    BOOK_SERIES_COLUMN,
];
