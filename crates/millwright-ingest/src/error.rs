//! Error types for the reconciliation pipeline and its store backends.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the event store.
///
/// These are call-fatal: a failed lookup or bulk write aborts the whole
/// `process_batch` call. Per-operation write conflicts are not errors and are
/// reported through [`crate::store::BulkWriteReport`] instead.
#[derive(Error, Debug)]
pub enum Error {
    /// SQLite error from the persistent store backend.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A stored timestamp column holds a value outside the representable range.
    #[error("invalid stored timestamp: {0}")]
    InvalidTimestamp(i64),

    /// Store backend failure not covered by a more specific variant.
    #[error("store error: {0}")]
    Store(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_timestamp_display() {
        let err = Error::InvalidTimestamp(i64::MIN);
        assert!(err.to_string().contains("invalid stored timestamp"));
    }

    #[test]
    fn test_from_rusqlite_error() {
        let err: Error = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, Error::Sqlite(_)));
        assert!(err.to_string().contains("SQLite error"));
    }
}
