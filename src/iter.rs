use std::collections::VecDeque;

use log::trace;
use rusqlite::{params, Connection, Row};

use crate::error::Result;
use crate::value::Value;

/// Rows pulled from SQLite per read-ahead batch.
pub const FETCH_SIZE: usize = 256;

const SELECT_KEYS: &str =
    "SELECT rowid, key FROM data WHERE rowid > ?1 ORDER BY rowid LIMIT ?2";
const SELECT_VALUES: &str =
    "SELECT rowid, value FROM data WHERE rowid > ?1 ORDER BY rowid LIMIT ?2";
const SELECT_ITEMS: &str =
    "SELECT rowid, key, value FROM data WHERE rowid > ?1 ORDER BY rowid LIMIT ?2";

/// Pull-based iterator over the `data` table.
///
/// Rows arrive in batches of [`FETCH_SIZE`]. Between batches the iterator
/// keeps only the position of the last row read, so memory stays bounded by
/// one batch. The scan order is the table's storage order and carries no
/// meaning for callers.
///
/// The iterator borrows the store, so the same store cannot be mutated while
/// it is alive. Writes made through another connection to the same file
/// between two batches may or may not be observed.
///
/// The iterator is one-shot: after the last row, or after an error, it
/// yields `None` forever.
pub struct Batched<'c, T> {
    conn: &'c Connection,
    sql: &'static str,
    extract: fn(&Row<'_>) -> rusqlite::Result<T>,
    buffer: VecDeque<T>,
    last_rowid: i64,
    done: bool,
}

pub type Keys<'c> = Batched<'c, Value>;
pub type Values<'c> = Batched<'c, Value>;
pub type Items<'c> = Batched<'c, (Value, Value)>;

impl<'c, T> Batched<'c, T> {
    fn new(
        conn: &'c Connection,
        sql: &'static str,
        extract: fn(&Row<'_>) -> rusqlite::Result<T>,
    ) -> Self {
        Self {
            conn,
            sql,
            extract,
            buffer: VecDeque::with_capacity(FETCH_SIZE),
            last_rowid: i64::MIN,
            done: false,
        }
    }

    fn fill(&mut self) -> Result<()> {
        let conn = self.conn;
        let mut stmt = conn.prepare_cached(self.sql)?;
        let mut rows = stmt.query(params![self.last_rowid, FETCH_SIZE as i64])?;
        let mut fetched = 0;
        while let Some(row) = rows.next()? {
            self.last_rowid = row.get(0)?;
            self.buffer.push_back((self.extract)(row)?);
            fetched += 1;
        }
        trace!("fetched batch of {} rows up to rowid {}", fetched, self.last_rowid);
        if fetched < FETCH_SIZE {
            self.done = true;
        }
        Ok(())
    }
}

impl<'c> Batched<'c, Value> {
    pub(crate) fn keys(conn: &'c Connection) -> Self {
        Self::new(conn, SELECT_KEYS, |row| row.get(1))
    }

    pub(crate) fn values(conn: &'c Connection) -> Self {
        Self::new(conn, SELECT_VALUES, |row| row.get(1))
    }
}

impl<'c> Batched<'c, (Value, Value)> {
    pub(crate) fn items(conn: &'c Connection) -> Self {
        Self::new(conn, SELECT_ITEMS, |row| Ok((row.get(1)?, row.get(2)?)))
    }
}

impl<T> Iterator for Batched<'_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buffer.is_empty() && !self.done {
            if let Err(e) = self.fill() {
                self.done = true;
                self.buffer.clear();
                return Some(Err(e));
            }
        }
        self.buffer.pop_front().map(Ok)
    }
}

impl<T> std::iter::FusedIterator for Batched<'_, T> {}
