//! Runtime event stream payloads.

use crate::types::BookId;

/// Events emitted from the single-writer catalog loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogEvent {
    /// A book was added, or replaced an existing one.
    BookAdded {
        /// Added book id.
        id: BookId,
    },
    /// An existing book was updated.
    BookUpdated {
        /// Updated book id.
        id: BookId,
    },
    /// Books were deleted.
    BooksDeleted {
        /// Number of books deleted.
        count: usize,
    },
    /// One undo step was applied.
    UndoApplied,
    /// One redo step was applied.
    RedoApplied,
}
