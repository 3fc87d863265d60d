use thiserror::Error;

use crate::value::Value;

/// Errors raised by [`SqliteDict`](crate::SqliteDict) operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Point lookup or point delete on a key with no row.
    #[error("key not found: {0}")]
    NotFound(Value),

    /// A bulk update source could not be read as key/value pairs.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// `pop_item` on an empty store.
    #[error("store is empty")]
    Exhausted,

    /// The store was closed; no further operations are possible.
    #[error("store is closed")]
    Closed,

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
