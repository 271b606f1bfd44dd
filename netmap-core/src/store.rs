use crate::error::{NetworkMapError, Result};
use crate::keys;
use crate::model::{Node, NodeKind};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

const PAGE_SIZE: i64 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Ordered byte-key/byte-value store for one (job, run) pair.
///
/// Keys compare bytewise. The connection lives behind a mutex so the store
/// can be shared between query threads and closed exactly once.
pub struct GraphStore {
    name: String,
    dir: PathBuf,
    conn: Mutex<Option<Connection>>,
}

impl GraphStore {
    /// Opens (creating if absent) the store `name` inside `dir`.
    pub fn open(dir: &Path, name: &str) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let conn = Connection::open(dir.join(format!("{}.db", name)))?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;  -- 64MB cache
            PRAGMA temp_store = MEMORY;

            CREATE TABLE IF NOT EXISTS records (
                key BLOB PRIMARY KEY,
                value BLOB NOT NULL
            ) WITHOUT ROWID;
            ",
        )?;

        debug!("Opened store {} in {}", name, dir.display());
        Ok(Self {
            name: name.to_string(),
            dir: dir.to_path_buf(),
            conn: Mutex::new(Some(conn)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> Result<T>) -> Result<T> {
        let mut guard = self.lock();
        match guard.as_mut() {
            Some(conn) => f(conn),
            None => Err(NetworkMapError::Closed(self.name.clone())),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.lock().is_none()
    }

    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO records (key, value) VALUES (?1, ?2)",
                params![key, value],
            )?;
            Ok(())
        })
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.with_conn(|conn| {
            let value = conn
                .query_row(
                    "SELECT value FROM records WHERE key = ?1",
                    params![key],
                    |row| row.get::<_, Vec<u8>>(0),
                )
                .optional()?;
            Ok(value)
        })
    }

    /// Returns whether a record was removed.
    pub fn delete(&self, key: &[u8]) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM records WHERE key = ?1", params![key])?;
            Ok(removed > 0)
        })
    }

    /// Writes every pair in one transaction. Any failure rolls the whole
    /// batch back and is returned.
    pub fn bulk_insert<I>(&self, records: I) -> Result<usize>
    where
        I: IntoIterator<Item = (Vec<u8>, Vec<u8>)>,
    {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let mut count = 0;
            {
                let mut stmt =
                    tx.prepare("INSERT OR REPLACE INTO records (key, value) VALUES (?1, ?2)")?;
                for (key, value) in records {
                    stmt.execute(params![key, value])?;
                    count += 1;
                }
            }
            tx.commit()?;
            Ok(count)
        })
    }

    /// Lazily iterates nodes of `kind` starting at the first key `>= start`
    /// (forward) or the last key `< start` (backward).
    pub fn range_iter(&self, start: &[u8], direction: Direction, kind: NodeKind) -> RecordIterator<'_> {
        RecordIterator {
            store: self,
            direction,
            kind,
            cursor: start.to_vec(),
            first_page: true,
            prefix: None,
            buffer: VecDeque::new(),
            done: false,
        }
    }

    /// Flushes and releases the connection. Closing twice is a no-op.
    pub fn close(&self) -> Result<()> {
        let mut guard = self.lock();
        if let Some(conn) = guard.take() {
            conn.close().map_err(|(_, e)| e)?;
            debug!("Closed store {}", self.name);
        }
        Ok(())
    }

    // Typed helpers over the byte API

    pub fn put_value<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.put(key.as_bytes(), &bytes)
    }

    pub fn get_value<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_node(&self, job: i64, node: &Node) -> Result<()> {
        self.put_value(&keys::node_key(job, node.id), node)
    }

    pub fn get_node(&self, job: i64, id: i64) -> Result<Option<Node>> {
        self.get_value(&keys::node_key(job, id))
    }

    pub fn put_ids(&self, job: i64, name: &str, ids: &[i64]) -> Result<()> {
        self.put_value(&keys::named_key(job, name), &ids)
    }

    /// A missing list reads as empty.
    pub fn get_ids(&self, job: i64, name: &str) -> Result<Vec<i64>> {
        Ok(self
            .get_value::<Vec<i64>>(&keys::named_key(job, name))?
            .unwrap_or_default())
    }
}

impl Drop for GraphStore {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to close store {}: {}", self.name, e);
        }
    }
}

/// Cursor over a key range, materialising one node per step.
///
/// Pages of records are fetched on demand. Values that are not nodes (id
/// lists, counters, the build marker) and nodes of other kinds are skipped; a
/// node value that fails to decode is yielded as an error in its place.
pub struct RecordIterator<'a> {
    store: &'a GraphStore,
    direction: Direction,
    kind: NodeKind,
    cursor: Vec<u8>,
    first_page: bool,
    prefix: Option<Vec<u8>>,
    buffer: VecDeque<Result<Node>>,
    done: bool,
}

impl RecordIterator<'_> {
    /// Ends the iteration at the first key outside `prefix`.
    pub fn within(mut self, prefix: &[u8]) -> Self {
        self.prefix = Some(prefix.to_vec());
        self
    }

    fn next_page(&mut self) -> Result<()> {
        let sql = match (self.direction, self.first_page) {
            (Direction::Forward, true) => {
                "SELECT key, value FROM records WHERE key >= ?1 ORDER BY key ASC LIMIT ?2"
            }
            (Direction::Forward, false) => {
                "SELECT key, value FROM records WHERE key > ?1 ORDER BY key ASC LIMIT ?2"
            }
            (Direction::Backward, _) => {
                "SELECT key, value FROM records WHERE key < ?1 ORDER BY key DESC LIMIT ?2"
            }
        };
        let cursor = self.cursor.clone();

        let rows = self.store.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(sql)?;
            let rows = stmt
                .query_map(params![cursor, PAGE_SIZE], |row| {
                    Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, Vec<u8>>(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;

        self.first_page = false;
        if (rows.len() as i64) < PAGE_SIZE {
            self.done = true;
        }

        for (key, value) in rows {
            if self.prefix.as_ref().is_some_and(|p| !key.starts_with(p)) {
                self.done = true;
                break;
            }
            match decode_node(&value) {
                Ok(Some(node)) if node.kind == self.kind => self.buffer.push_back(Ok(node)),
                Ok(_) => {}
                Err(e) => self.buffer.push_back(Err(e)),
            }
            self.cursor = key;
        }
        Ok(())
    }
}

/// `None` for values that are not node objects. Objects carrying a `kind`
/// field must decode as a [`Node`].
fn decode_node(value: &[u8]) -> Result<Option<Node>> {
    let value: serde_json::Value = serde_json::from_slice(value)?;
    let is_node = matches!(&value, serde_json::Value::Object(fields) if fields.contains_key("kind"));
    if !is_node {
        return Ok(None);
    }
    Ok(Some(serde_json::from_value(value)?))
}

impl Iterator for RecordIterator<'_> {
    type Item = Result<Node>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Some(item);
            }
            if self.done {
                return None;
            }
            if let Err(e) = self.next_page() {
                self.done = true;
                return Some(Err(e));
            }
        }
    }
}
