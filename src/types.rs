//! Shared primitive ids.

/// Row id of any catalog table. Zero means "not performed".
pub type RowId = i64;
/// Id of a row in the books table.
pub type BookId = RowId;
/// Undo generation number.
pub type UndoId = i64;
/// Milliseconds since the Unix epoch.
pub type TimestampMs = i64;
