//! Catalog records and drafts.

use crate::filter::Filter;
use crate::types::{BookId, RowId, TimestampMs};

/// A row of the books table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BookRecord {
    pub id: BookId,
    /// Id of the book in its external source.
    pub volume_id: Option<String>,
    /// Name of the external source.
    pub source_id: Option<String>,
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub page_count: i64,
    pub book_count: i64,
    pub rating: f64,
    pub date_added: TimestampMs,
    pub date_modified: TimestampMs,
    pub flags: i64,
    /// Row id of the book's series, or 0 for none.
    pub series: RowId,
}

/// Author name split into the sort name and the rest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct AuthorName {
    pub last_name: String,
    pub remaining: String,
}

impl AuthorName {
    pub fn new(last_name: impl Into<String>, remaining: impl Into<String>) -> Self {
        Self {
            last_name: last_name.into(),
            remaining: remaining.into(),
        }
    }

    /// Splits `"Last, First"` at the comma, or `"First Middle Last"` at the
    /// last space.
    pub fn parse(name: &str) -> Self {
        let name = name.trim();
        if let Some((last, rest)) = name.split_once(',') {
            return Self::new(last.trim(), rest.trim());
        }
        match name.rsplit_once(' ') {
            Some((rest, last)) => Self::new(last.trim(), rest.trim()),
            None => Self::new(name, ""),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorRecord {
    pub id: RowId,
    pub last_name: String,
    pub remaining: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRecord {
    pub id: RowId,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsbnRecord {
    pub id: RowId,
    pub isbn: String,
}

/// A row of the series table. `series_id` is the external id that
/// identifies the series; an `id` of zero means a new row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SeriesRecord {
    pub id: RowId,
    pub series_id: String,
    pub title: String,
}

impl SeriesRecord {
    pub fn new(series_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: 0,
            series_id: series_id.into(),
            title: title.into(),
        }
    }
}

/// A row of the tags table. An `id` of zero means a new tag.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TagRecord {
    pub id: RowId,
    pub name: String,
    pub desc: String,
    pub flags: i64,
}

impl TagRecord {
    pub fn new(name: impl Into<String>, desc: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            desc: desc.into(),
            flags: 0,
        }
    }
}

/// A saved filter with a name.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ViewRecord {
    pub id: RowId,
    pub name: String,
    pub desc: String,
    pub filter: Option<Filter>,
}

impl ViewRecord {
    pub fn new(name: impl Into<String>, filter: Option<Filter>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            desc: String::new(),
            filter,
        }
    }
}

/// Input for adding or replacing a book and its relations.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BookDraft {
    pub volume_id: Option<String>,
    pub source_id: Option<String>,
    pub title: String,
    pub subtitle: String,
    pub description: String,
    pub page_count: i64,
    pub book_count: i64,
    pub rating: f64,
    /// Defaults to the current time when adding.
    pub date_added: Option<TimestampMs>,
    pub authors: Vec<AuthorName>,
    pub categories: Vec<String>,
    pub tags: Vec<String>,
    pub isbns: Vec<String>,
    pub series: Option<SeriesRecord>,
}

impl BookDraft {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            book_count: 1,
            ..Self::default()
        }
    }

    pub fn by(mut self, author: &str) -> Self {
        self.authors.push(AuthorName::parse(author));
        self
    }

    pub fn tagged(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn in_category(mut self, category: impl Into<String>) -> Self {
        self.categories.push(category.into());
        self
    }

    pub fn with_isbn(mut self, isbn: impl Into<String>) -> Self {
        self.isbns.push(isbn.into());
        self
    }

    pub fn in_series(mut self, series_id: impl Into<String>, title: impl Into<String>) -> Self {
        self.series = Some(SeriesRecord::new(series_id, title));
        self
    }
}

/// A book with every related lookup row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BookAndAuthors {
    pub book: BookRecord,
    pub authors: Vec<AuthorRecord>,
    pub categories: Vec<CategoryRecord>,
    pub tags: Vec<TagRecord>,
    pub isbns: Vec<IsbnRecord>,
    pub series: Option<SeriesRecord>,
}

impl BookAndAuthors {
    /// Last name of the first author.
    pub fn sort_last(&self) -> &str {
        self.authors.first().map_or("", |a| a.last_name.as_str())
    }

    pub fn sort_first(&self) -> &str {
        self.authors.first().map_or("", |a| a.remaining.as_str())
    }

    /// Title of the series, or empty.
    pub fn sort_series(&self) -> &str {
        self.series.as_ref().map_or("", |s| s.title.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn author_names_split_both_ways() {
        assert_eq!(AuthorName::parse("Cathy Lin"), AuthorName::new("Lin", "Cathy"));
        assert_eq!(
            AuthorName::parse("Le Guin, Ursula K."),
            AuthorName::new("Le Guin", "Ursula K.")
        );
        assert_eq!(AuthorName::parse("Homer"), AuthorName::new("Homer", ""));
    }
}
