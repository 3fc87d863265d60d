//! A dictionary-like key/value mapping backed by SQLite.
//!
//! # Intention
//!
//! - Let callers treat a SQLite file, or an in-memory database, as an
//!   ordinary associative container.
//! - Translate every container operation into SQL against one table,
//!   `data (key PRIMARY KEY, value)`.
//!
//! # Architectural Boundaries
//!
//! - One connection, one table. No schema evolution, no secondary indexes.
//! - Keys and values are opaque scalars; no typed or structured values.
//! - Synchronous and single-threaded. Each call commits before returning.
//!
//! ```no_run
//! use dbdict::{Mapping, SqliteDict};
//!
//! # fn main() -> dbdict::Result<()> {
//! let mut dict = SqliteDict::open("settings.db")?;
//! dict.set("theme", "dark")?;
//! assert_eq!(dict.get("theme")?.as_str(), Some("dark"));
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod input;
pub mod iter;
pub mod mapping;
pub mod sqlite;
pub mod value;

pub use error::{Error, Result};
pub use input::{KeySet, Update, UpdateSource};
pub use iter::{Batched, Items, Keys, Values, FETCH_SIZE};
pub use mapping::Mapping;
pub use sqlite::{Location, SqliteConfig, SqliteDict, DEFAULT_MAX_KEYS_PER_STATEMENT, MEMORY};
pub use value::Value;
