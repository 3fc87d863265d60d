use std::fmt;
use std::path::{Path, PathBuf};

use log::{debug, trace};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::input::{KeySet, Update};
use crate::iter::{Batched, Items, Keys, Values};
use crate::mapping::Mapping;
use crate::value::Value;

/// Location string that selects an in-memory store.
pub const MEMORY: &str = ":memory:";

/// Default cap on keys bound into one `IN (...)` predicate.
pub const DEFAULT_MAX_KEYS_PER_STATEMENT: usize = 500;

const CREATE_TABLE: &str = "CREATE TABLE data (key PRIMARY KEY, value)";
const DROP_TABLE: &str = "DROP TABLE data";
const SELECT_VALUE: &str = "SELECT value FROM data WHERE key = ?1";
const SELECT_EXISTS: &str = "SELECT 1 FROM data WHERE key = ?1";
const SELECT_FIRST: &str = "SELECT key, value FROM data LIMIT 1";
const SELECT_COUNT: &str = "SELECT count(*) FROM data";
const UPSERT: &str = "INSERT OR REPLACE INTO data (key, value) VALUES (?1, ?2)";
const DELETE: &str = "DELETE FROM data WHERE key = ?1";
const REINDEX: &str = "REINDEX sqlite_autoindex_data_1";
const VACUUM: &str = "VACUUM";

/// Where the store keeps its table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Location {
    /// Ephemeral store, discarded on close.
    Memory,
    /// Database file on disk.
    Path(PathBuf),
}

impl Location {
    pub fn is_memory(&self) -> bool {
        matches!(self, Location::Memory)
    }

    /// Whether opening this location must create the `data` table.
    fn needs_table(&self) -> bool {
        match self {
            Location::Memory => true,
            Location::Path(path) => !path.is_file(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Memory => f.write_str(MEMORY),
            Location::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

impl From<&str> for Location {
    fn from(s: &str) -> Self {
        if s == MEMORY {
            Location::Memory
        } else {
            Location::Path(PathBuf::from(s))
        }
    }
}

impl From<String> for Location {
    fn from(s: String) -> Self {
        Location::from(s.as_str())
    }
}

impl From<Location> for String {
    fn from(location: Location) -> Self {
        location.to_string()
    }
}

impl From<PathBuf> for Location {
    fn from(path: PathBuf) -> Self {
        Location::Path(path)
    }
}

impl From<&Path> for Location {
    fn from(path: &Path) -> Self {
        Location::Path(path.to_path_buf())
    }
}

/// SQLite dictionary configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqliteConfig {
    /// Database file, or `":memory:"`
    pub location: Location,
    /// Cap on keys bound into a single `IN (...)` predicate; larger key sets
    /// are split across statements.
    #[serde(default = "default_max_keys")]
    pub max_keys_per_statement: usize,
}

fn default_max_keys() -> usize {
    DEFAULT_MAX_KEYS_PER_STATEMENT
}

impl SqliteConfig {
    pub fn new(location: impl Into<Location>) -> Self {
        Self {
            location: location.into(),
            max_keys_per_statement: DEFAULT_MAX_KEYS_PER_STATEMENT,
        }
    }

    pub fn with_max_keys_per_statement(mut self, max: usize) -> Self {
        self.max_keys_per_statement = max;
        self
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self::new(Location::Memory)
    }
}

/// SQL statement with positional parameters.
#[derive(Debug, Clone, PartialEq)]
struct SqlQuery<'k> {
    statement: String,
    params: &'k [Value],
}

impl<'k> SqlQuery<'k> {
    /// `<prefix> WHERE key IN (?1, ..., ?n)` with every key bound, never
    /// spliced into the statement text.
    fn key_in(prefix: &str, keys: &'k [Value]) -> Self {
        let placeholders = (1..=keys.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            statement: format!("{prefix} WHERE key IN ({placeholders})"),
            params: keys,
        }
    }
}

/// A key/value mapping stored in a single SQLite table.
///
/// Each operation is one or a few SQL statements, committed before the call
/// returns. Nothing is cached: every read goes to SQLite.
pub struct SqliteDict {
    config: SqliteConfig,
    connection: Option<Connection>,
}

impl SqliteDict {
    /// Open the store at `location`, creating the table if the location is
    /// in memory or the file does not exist yet.
    pub fn open(location: impl Into<Location>) -> Result<Self> {
        Self::with_config(SqliteConfig::new(location))
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::open(Location::Memory)
    }

    pub fn with_config(config: SqliteConfig) -> Result<Self> {
        debug!("opening sqlite dict at {}", config.location);
        let needs_table = config.location.needs_table();
        let connection = match &config.location {
            Location::Memory => Connection::open_in_memory()?,
            Location::Path(path) => Connection::open(path)?,
        };
        if needs_table {
            debug!("creating data table at {}", config.location);
            connection.execute(CREATE_TABLE, [])?;
        }
        Ok(Self {
            config,
            connection: Some(connection),
        })
    }

    pub fn location(&self) -> &Location {
        &self.config.location
    }

    pub fn is_closed(&self) -> bool {
        self.connection.is_none()
    }

    fn conn(&self) -> Result<&Connection> {
        self.connection.as_ref().ok_or(Error::Closed)
    }

    fn conn_mut(&mut self) -> Result<&mut Connection> {
        self.connection.as_mut().ok_or(Error::Closed)
    }

    fn chunk_size(&self) -> usize {
        self.config.max_keys_per_statement.max(1)
    }

    /// Pairs for whichever of `keys` exist. Missing keys are skipped.
    ///
    /// Key sets above `max_keys_per_statement` are queried in several
    /// statements and the results concatenated. Result order is unspecified.
    /// [`KeySet`] drops repeated keys, so each existing pair appears once.
    pub fn get_many(&self, keys: impl Into<KeySet>) -> Result<Vec<(Value, Value)>> {
        let keys = keys.into();
        let conn = self.conn()?;
        let mut found: Vec<(Value, Value)> = Vec::new();
        for chunk in keys.as_slice().chunks(self.chunk_size()) {
            let query = SqlQuery::key_in("SELECT key, value FROM data", chunk);
            let mut stmt = conn.prepare(&query.statement)?;
            let rows = stmt.query_map(params_from_iter(query.params), |row| {
                Ok((row.get::<_, Value>(0)?, row.get::<_, Value>(1)?))
            })?;
            for row in rows {
                found.push(row?);
            }
        }
        trace!("get_many matched {} of {} keys", found.len(), keys.len());
        Ok(found)
    }

    /// Delete whichever of `keys` exist. Missing keys are skipped.
    ///
    /// All chunks run in one transaction.
    pub fn remove_many(&mut self, keys: impl Into<KeySet>) -> Result<()> {
        let keys = keys.into();
        let chunk_size = self.chunk_size();
        let tx = self.conn_mut()?.transaction()?;
        let mut removed = 0;
        for chunk in keys.as_slice().chunks(chunk_size) {
            let query = SqlQuery::key_in("DELETE FROM data", chunk);
            removed += tx.execute(&query.statement, params_from_iter(query.params))?;
        }
        tx.commit()?;
        trace!("remove_many deleted {} of {} keys", removed, keys.len());
        Ok(())
    }

    /// Rebuild the primary-key index. Data is unchanged; cost grows with the
    /// number of rows. Worth running when lookups slow down after many
    /// inserts and deletes.
    pub fn reindex(&self) -> Result<()> {
        debug!("reindexing {}", self.config.location);
        self.conn()?.execute(REINDEX, [])?;
        Ok(())
    }

    /// Return space freed by deletes to the filesystem.
    ///
    /// Does nothing for in-memory stores. On files this rewrites the whole
    /// database, which can take a while and needs up to twice the file size
    /// in temporary space.
    pub fn vacuum(&self) -> Result<()> {
        let conn = self.conn()?;
        if self.config.location.is_memory() {
            trace!("vacuum skipped for in-memory store");
            return Ok(());
        }
        debug!("vacuuming {}", self.config.location);
        conn.execute_batch(VACUUM)?;
        Ok(())
    }

    /// Close the connection. Later operations fail with [`Error::Closed`].
    ///
    /// If SQLite refuses to close, the store stays open and the error is
    /// returned. Closing twice fails with [`Error::Closed`].
    pub fn close(&mut self) -> Result<()> {
        let connection = self.connection.take().ok_or(Error::Closed)?;
        debug!("closing sqlite dict at {}", self.config.location);
        if let Err((connection, e)) = connection.close() {
            self.connection = Some(connection);
            return Err(e.into());
        }
        Ok(())
    }
}

impl fmt::Debug for SqliteDict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteDict")
            .field("location", &self.config.location)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Mapping for SqliteDict {
    type Keys<'a> = Keys<'a>;
    type Values<'a> = Values<'a>;
    type Items<'a> = Items<'a>;

    fn get(&self, key: impl Into<Value>) -> Result<Value> {
        let key: Value = key.into();
        let mut stmt = self.conn()?.prepare_cached(SELECT_VALUE)?;
        let value = stmt.query_row([&key], |row| row.get(0)).optional()?;
        value.ok_or(Error::NotFound(key))
    }

    fn set(&mut self, key: impl Into<Value>, value: impl Into<Value>) -> Result<()> {
        let (key, value): (Value, Value) = (key.into(), value.into());
        let mut stmt = self.conn()?.prepare_cached(UPSERT)?;
        stmt.execute(params![key, value])?;
        Ok(())
    }

    fn delete(&mut self, key: impl Into<Value>) -> Result<()> {
        let key: Value = key.into();
        let mut stmt = self.conn()?.prepare_cached(DELETE)?;
        if stmt.execute([&key])? == 0 {
            return Err(Error::NotFound(key));
        }
        Ok(())
    }

    fn contains(&self, key: impl Into<Value>) -> Result<bool> {
        let key: Value = key.into();
        let mut stmt = self.conn()?.prepare_cached(SELECT_EXISTS)?;
        Ok(stmt.exists([&key])?)
    }

    fn size(&self) -> Result<usize> {
        let count: i64 = self.conn()?.query_row(SELECT_COUNT, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn keys(&self) -> Result<Keys<'_>> {
        Ok(Batched::keys(self.conn()?))
    }

    fn values(&self) -> Result<Values<'_>> {
        Ok(Batched::values(self.conn()?))
    }

    fn items(&self) -> Result<Items<'_>> {
        Ok(Batched::items(self.conn()?))
    }

    /// Apply every pair in one transaction: all pairs land or none do.
    fn update<'a>(&mut self, update: impl Into<Update<'a>>) -> Result<()> {
        let pairs = update.into().into_pairs()?;
        let tx = self.conn_mut()?.transaction()?;
        {
            let mut stmt = tx.prepare_cached(UPSERT)?;
            for (key, value) in &pairs {
                stmt.execute(params![key, value])?;
            }
        }
        tx.commit()?;
        trace!("update applied {} pairs", pairs.len());
        Ok(())
    }

    /// Drop and recreate the table, then vacuum.
    ///
    /// Much heavier than deleting rows one by one: the vacuum rewrites the
    /// database file and hands the freed pages back to the filesystem.
    fn clear(&mut self) -> Result<()> {
        debug!("clearing {}", self.config.location);
        let tx = self.conn_mut()?.transaction()?;
        tx.execute(DROP_TABLE, [])?;
        tx.execute(CREATE_TABLE, [])?;
        tx.commit()?;
        self.vacuum()
    }

    /// Remove and return whichever row SQLite scans first. No order is
    /// implied. The select and the delete share one transaction.
    fn pop_item(&mut self) -> Result<(Value, Value)> {
        let tx = self.conn_mut()?.transaction()?;
        let (key, value): (Value, Value) = tx
            .query_row(SELECT_FIRST, [], |row| Ok((row.get(0)?, row.get(1)?)))
            .optional()?
            .ok_or(Error::Exhausted)?;
        tx.execute(DELETE, [&key])?;
        tx.commit()?;
        Ok((key, value))
    }
}
